//! Conquest Multiplayer Server
//!
//! Hosts many concurrent sessions of the province conquest game.
//! Each session is locked independently; a background ticker decays garrisons and reaps idle games.

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod ticker;
pub mod transport;

pub use config::{ConfigError, ServerConfig};
pub use error::ServiceError;
pub use protocol::*;
pub use registry::{SessionHandle, SessionRegistry};
pub use service::{ActionResult, Created, GameService, Joined, TickSummary};
pub use ticker::spawn_ticker;
pub use transport::{dispatch, serve, TransportError};

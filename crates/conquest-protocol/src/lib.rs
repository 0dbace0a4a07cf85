//! Shared protocol types for the Conquest session engine.
//!
//! Everything here is plain serializable data: identifiers, building and status enums, the
//! read-only session snapshot handed to presentation layers, stable error codes, and codec
//! helpers. The authoritative rules live in `conquest-core`.

mod error;
mod ids;
mod snapshot;
mod types;
pub mod wire;

pub use error::{ErrorCode, ErrorKind, ErrorPayload};
pub use ids::{PlayerId, RegionId, SessionId};
pub use snapshot::{PlayerView, RegionView, SessionSnapshot};
pub use types::{BuildingKind, Buildings, ParseBuildingError, Position, SessionStatus};

mod combat;
pub mod economy;
mod loader;
mod map;
mod rng;
mod rules;
mod session;

pub use crate::combat::*;
pub use crate::loader::{load_map, MapError, MapSource};
pub use crate::map::*;
pub use crate::rng::*;
pub use crate::rules::*;
pub use crate::session::*;

pub use conquest_protocol as protocol;

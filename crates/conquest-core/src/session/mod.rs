//! One match: roster, region ownership, turn order and the action state machine.

mod error;
mod player;
mod state;

pub use error::ActionError;
pub use player::{color_for, Player, PLAYER_COLORS};
pub use state::{AttackReport, BuildReport, RegionState, SessionState};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Buildings, PlayerId, Position, RegionId, SessionId, SessionStatus};

/// Full read-only view of one session, sent to every observer after each change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub players: BTreeMap<PlayerId, PlayerView>,
    pub regions: BTreeMap<RegionId, RegionView>,
    pub current_player: Option<PlayerId>,
    /// 1-based turn counter (increments on every turn hand-off).
    pub turn_number: u32,
    #[serde(default)]
    pub turn_order: Vec<PlayerId>,
    #[serde(default)]
    pub winner: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub color: String,
    pub coins: u32,
    /// Sum of garrisons over owned regions (display only).
    pub soldiers: u32,
    pub regions: Vec<RegionId>,
    pub connected: bool,
    pub is_host: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionView {
    pub name: String,
    pub position: Position,
    pub owner: Option<PlayerId>,
    pub soldiers: u32,
    pub buildings: Buildings,
}

impl SessionSnapshot {
    /// Number of regions currently owned by `player`.
    pub fn owned_count(&self, player: PlayerId) -> usize {
        self.regions
            .values()
            .filter(|r| r.owner == Some(player))
            .count()
    }
}

use conquest_protocol::{PlayerId, RegionId};

/// Player colors by join order; the ninth player wraps around to red.
pub const PLAYER_COLORS: [&str; 8] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF", "#FFA500", "#800080",
];

pub fn color_for(join_index: usize) -> &'static str {
    PLAYER_COLORS[join_index % PLAYER_COLORS.len()]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub coins: u32,
    /// Owned regions in acquisition order. Mirrors `RegionState::owner`.
    pub regions: Vec<RegionId>,
    pub is_host: bool,
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, coins: u32, is_host: bool) -> Self {
        Self {
            id,
            name: name.into(),
            color: color_for(usize::from(id.0)).to_string(),
            coins,
            regions: Vec::new(),
            is_host,
            connected: true,
        }
    }

    pub fn owns(&self, region: &RegionId) -> bool {
        self.regions.contains(region)
    }

    pub(crate) fn gain_region(&mut self, region: RegionId) {
        if !self.owns(&region) {
            self.regions.push(region);
        }
    }

    pub(crate) fn lose_region(&mut self, region: &RegionId) {
        self.regions.retain(|r| r != region);
    }

    /// Still takes turns: connected and holding at least one region.
    pub fn is_active(&self) -> bool {
        self.connected && !self.regions.is_empty()
    }
}

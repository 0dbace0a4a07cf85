//! Tunable match rules.

use std::time::Duration;

use conquest_protocol::BuildingKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Building price table. Deployments differed on scale, so both are kept as named profiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostProfile {
    /// barracks 200, factory 500, bank 300; players start with 1000 coins.
    #[default]
    Standard,
    /// barracks 30, factory 50, bank 40; players start with 100 coins.
    Lite,
}

impl CostProfile {
    pub fn cost(self, kind: BuildingKind) -> u32 {
        match (self, kind) {
            (Self::Standard, BuildingKind::Barracks) => 200,
            (Self::Standard, BuildingKind::Factory) => 500,
            (Self::Standard, BuildingKind::Bank) => 300,
            (Self::Lite, BuildingKind::Barracks) => 30,
            (Self::Lite, BuildingKind::Factory) => 50,
            (Self::Lite, BuildingKind::Bank) => 40,
        }
    }

    pub fn starting_coins(self) -> u32 {
        match self {
            Self::Standard => 1000,
            Self::Lite => 100,
        }
    }
}

/// Rules shared by every session created by one server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Minimum players to start (>= 2)
    pub min_players: u8,
    /// Maximum players per session (<= 8)
    pub max_players: u8,
    /// Soldiers placed in each region at match start
    pub initial_garrison: u32,
    /// Battle swing coefficient `r` (0.3 = +/-30%)
    pub battle_randomness: f64,
    pub cost_profile: CostProfile,
    /// Wall-clock seconds between soldier decay ticks
    pub decay_interval_secs: u64,
    /// Share of all regions a player must exceed to win
    pub victory_share: f64,
    /// Pay income and barracks production when a player's turn begins
    pub turn_income: bool,
    /// Whether a successful build hands the turn to the next player
    pub build_ends_turn: bool,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            initial_garrison: 10,
            battle_randomness: 0.3,
            cost_profile: CostProfile::Standard,
            decay_interval_secs: 600,
            victory_share: 0.6,
            turn_income: true,
            build_ends_turn: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("player limits must satisfy 2 <= min ({min}) <= max ({max}) <= 8")]
    PlayerLimits { min: u8, max: u8 },
    #[error("battle randomness must be in [0, 1), got {0}")]
    Randomness(f64),
    #[error("victory share must be in (0, 1], got {0}")]
    VictoryShare(f64),
    #[error("decay interval must be positive")]
    DecayInterval,
}

impl GameRules {
    pub const MAX_PLAYERS_LIMIT: u8 = 8;

    pub fn decay_interval(&self) -> Duration {
        Duration::from_secs(self.decay_interval_secs)
    }

    pub fn building_cost(&self, kind: BuildingKind) -> u32 {
        self.cost_profile.cost(kind)
    }

    pub fn starting_coins(&self) -> u32 {
        self.cost_profile.starting_coins()
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        if self.min_players < 2
            || self.min_players > self.max_players
            || self.max_players > Self::MAX_PLAYERS_LIMIT
        {
            return Err(RulesError::PlayerLimits {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if !(0.0..1.0).contains(&self.battle_randomness) {
            return Err(RulesError::Randomness(self.battle_randomness));
        }
        if !(self.victory_share > 0.0 && self.victory_share <= 1.0) {
            return Err(RulesError::VictoryShare(self.victory_share));
        }
        if self.decay_interval_secs == 0 {
            return Err(RulesError::DecayInterval);
        }
        Ok(())
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structures a player can build in an owned region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Produces soldiers each turn and strengthens attacks/defense.
    Barracks,
    /// Flat income bonus plus an income multiplier.
    Factory,
    /// Flat income bonus.
    Bank,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 3] = [Self::Barracks, Self::Factory, Self::Bank];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Barracks => "barracks",
            Self::Factory => "factory",
            Self::Bank => "bank",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown building type: {0}")]
pub struct ParseBuildingError(pub String);

impl FromStr for BuildingKind {
    type Err = ParseBuildingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "barracks" => Ok(Self::Barracks),
            "factory" => Ok(Self::Factory),
            "bank" => Ok(Self::Bank),
            _ => Err(ParseBuildingError(s.to_string())),
        }
    }
}

/// Building counts in a region (or summed over a player's regions).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buildings {
    pub barracks: u32,
    pub factory: u32,
    pub bank: u32,
}

impl Buildings {
    pub fn count(&self, kind: BuildingKind) -> u32 {
        match kind {
            BuildingKind::Barracks => self.barracks,
            BuildingKind::Factory => self.factory,
            BuildingKind::Bank => self.bank,
        }
    }

    pub fn add(&mut self, kind: BuildingKind) {
        match kind {
            BuildingKind::Barracks => self.barracks += 1,
            BuildingKind::Factory => self.factory += 1,
            BuildingKind::Bank => self.bank += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.barracks + self.factory + self.bank
    }
}

impl std::ops::Add for Buildings {
    type Output = Buildings;

    fn add(self, rhs: Buildings) -> Buildings {
        Buildings {
            barracks: self.barracks + rhs.barracks,
            factory: self.factory + rhs.factory,
            bank: self.bank + rhs.bank,
        }
    }
}

impl std::iter::Sum for Buildings {
    fn sum<I: Iterator<Item = Buildings>>(iter: I) -> Self {
        iter.fold(Buildings::default(), |acc, b| acc + b)
    }
}

/// Match lifecycle. Only ever moves forward: waiting -> playing -> finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        })
    }
}

/// Map position, used by clients for rendering only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

use conquest_protocol::{ErrorCode, PlayerId, RegionId};
use thiserror::Error;

/// A rejected session action. Rejections never leave partial changes behind.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("session is full ({max} players)")]
    Full { max: u8 },
    #[error("game has already started")]
    AlreadyStarted,
    #[error("only the host can start the game")]
    NotHost,
    #[error("need at least {need} players to start, have {have}")]
    TooFewPlayers { have: usize, need: u8 },
    #[error("game is not in progress")]
    NotPlaying,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("player {0} is not in this session")]
    PlayerNotFound(PlayerId),
    #[error("unknown region: {0}")]
    InvalidRegion(RegionId),
    #[error("you do not own {0}")]
    NotOwner(RegionId),
    #[error("cannot attack your own region {0}")]
    OwnTerritory(RegionId),
    #[error("must attack with at least one soldier")]
    InvalidSoldierCount,
    #[error("not enough soldiers: {available} stationed, {requested} requested (one must stay behind)")]
    InsufficientSoldiers { available: u32, requested: u32 },
    #[error("{from} and {to} are not neighbors")]
    NotNeighbors { from: RegionId, to: RegionId },
    #[error("not enough coins: have {have}, need {need}")]
    InsufficientCoins { have: u32, need: u32 },
    #[error("unknown building type: {0}")]
    UnknownBuildingType(String),
}

impl ActionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Full { .. } => ErrorCode::Full,
            Self::AlreadyStarted => ErrorCode::AlreadyStarted,
            Self::NotHost => ErrorCode::NotHost,
            Self::TooFewPlayers { .. } => ErrorCode::TooFewPlayers,
            Self::NotPlaying => ErrorCode::NotPlaying,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
            Self::InvalidRegion(_) => ErrorCode::InvalidRegion,
            Self::NotOwner(_) => ErrorCode::NotOwner,
            Self::OwnTerritory(_) => ErrorCode::OwnTerritory,
            Self::InvalidSoldierCount => ErrorCode::InvalidSoldierCount,
            Self::InsufficientSoldiers { .. } => ErrorCode::InsufficientSoldiers,
            Self::NotNeighbors { .. } => ErrorCode::NotNeighbors,
            Self::InsufficientCoins { .. } => ErrorCode::InsufficientCoins,
            Self::UnknownBuildingType(_) => ErrorCode::UnknownBuildingType,
        }
    }
}

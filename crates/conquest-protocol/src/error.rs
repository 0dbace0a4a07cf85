use std::fmt;

use serde::{Deserialize, Serialize};

/// Error taxonomy exposed to clients. Decides retry behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown session or region. Do not retry.
    NotFound,
    /// Wrong turn/status/owner, not enough resources, bad target. State untouched.
    StateConflict,
    /// Session full, or too few players to start.
    Capacity,
    /// Session busy; retry with backoff.
    Transient,
}

/// Stable machine-checkable error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SessionNotFound,
    PlayerNotFound,
    InvalidRegion,
    Full,
    AlreadyStarted,
    NotHost,
    TooFewPlayers,
    NotPlaying,
    NotYourTurn,
    NotOwner,
    OwnTerritory,
    InvalidSoldierCount,
    InsufficientSoldiers,
    NotNeighbors,
    InsufficientCoins,
    UnknownBuildingType,
    SessionBusy,
    BadRequest,
}

impl ErrorCode {
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::SessionNotFound | Self::PlayerNotFound | Self::InvalidRegion => {
                ErrorKind::NotFound
            }
            Self::Full | Self::TooFewPlayers => ErrorKind::Capacity,
            Self::SessionBusy => ErrorKind::Transient,
            Self::AlreadyStarted
            | Self::NotHost
            | Self::NotPlaying
            | Self::NotYourTurn
            | Self::NotOwner
            | Self::OwnTerritory
            | Self::InvalidSoldierCount
            | Self::InsufficientSoldiers
            | Self::NotNeighbors
            | Self::InsufficientCoins
            | Self::UnknownBuildingType
            | Self::BadRequest => ErrorKind::StateConflict,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Client-facing failure: kind + code + display message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_kinds() {
        assert_eq!(ErrorCode::SessionNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::Full.kind(), ErrorKind::Capacity);
        assert_eq!(ErrorCode::NotNeighbors.kind(), ErrorKind::StateConflict);
        assert_eq!(ErrorCode::SessionBusy.kind(), ErrorKind::Transient);
    }

    #[test]
    fn payload_wire_format_is_snake_case() {
        let payload = ErrorPayload::new(ErrorCode::NotYourTurn, "not your turn");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "state_conflict");
        assert_eq!(json["code"], "not_your_turn");
    }
}

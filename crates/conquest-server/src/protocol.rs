//! Messages exchanged with clients.
//!
//! The TCP adapter frames them as one JSON object per line; the MessagePack helpers give a
//! compact binary framing for other transports.

use serde::{Deserialize, Serialize};

use conquest_core::BattleOdds;
use conquest_protocol::{
    ErrorCode, ErrorKind, ErrorPayload, PlayerId, RegionId, SessionId, SessionSnapshot,
};

/// Client-to-server messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Open a new session and join it as host
    CreateSession { host_name: String },
    JoinSession {
        session_id: SessionId,
        player_name: String,
    },
    /// Host only
    StartSession {
        session_id: SessionId,
        player_id: PlayerId,
    },
    Attack {
        session_id: SessionId,
        player_id: PlayerId,
        from: RegionId,
        to: RegionId,
        /// Signed so that nonsense counts reach validation instead of failing to parse
        soldiers: i64,
    },
    Build {
        session_id: SessionId,
        player_id: PlayerId,
        region: RegionId,
        building_type: String,
    },
    EndTurn {
        session_id: SessionId,
        player_id: PlayerId,
    },
    GetState { session_id: SessionId },
    /// Preview the odds of attacking `target` with `attacking` soldiers
    BattleOdds {
        session_id: SessionId,
        attacking: i64,
        target: RegionId,
        #[serde(default)]
        simulations: Option<u32>,
    },
    SuggestTargets {
        session_id: SessionId,
        player_id: PlayerId,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Receive every later event of the session on this connection
    Subscribe { session_id: SessionId },
    Disconnect {
        session_id: SessionId,
        player_id: PlayerId,
    },
    Reconnect {
        session_id: SessionId,
        player_id: PlayerId,
    },
}

/// Pushed to a session's observers after each change, once the session lock is released.
///
/// Adjacently tagged, as is [`ServerMessage`]: numeric snapshot keys do not survive serde's
/// buffered (internally tagged) decoding from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Full state after a change
    State { snapshot: SessionSnapshot },
    Battle {
        attacker: PlayerId,
        defender: Option<PlayerId>,
        from: RegionId,
        to: RegionId,
        captured: bool,
        message: String,
    },
    /// Garrisons shrank on the decay timer
    Decayed,
    GameOver { winner: Option<PlayerId> },
}

/// Server-to-client messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    Created {
        session_id: SessionId,
        player_id: PlayerId,
        snapshot: SessionSnapshot,
    },
    Joined {
        player_id: PlayerId,
        snapshot: SessionSnapshot,
    },
    State { snapshot: SessionSnapshot },
    /// Answer to an attack or build
    ActionResult {
        success: bool,
        message: String,
        snapshot: SessionSnapshot,
    },
    Odds { odds: BattleOdds },
    Targets { regions: Vec<RegionId> },
    /// Acknowledges requests that return nothing else
    Ok,
    Event {
        session_id: SessionId,
        event: SessionEvent,
    },
    Error {
        kind: ErrorKind,
        code: ErrorCode,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorPayload::new(code, message).into()
    }
}

impl From<ErrorPayload> for ServerMessage {
    fn from(payload: ErrorPayload) -> Self {
        Self::Error {
            kind: payload.kind,
            code: payload.code,
            message: payload.message,
        }
    }
}

/// Serialize a client message for network transmission
pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(msg)
}

/// Deserialize a client message from network data
pub fn deserialize_client_message(data: &[u8]) -> Result<ClientMessage, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

/// Serialize a server message for network transmission
pub fn serialize_server_message(msg: &ServerMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(msg)
}

/// Deserialize a server message from network data
pub fn deserialize_server_message(data: &[u8]) -> Result<ServerMessage, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

/// One JSON line (without the trailing newline).
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

pub fn decode_client_line(line: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(line.trim())
}

pub fn decode_server_line(line: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(line.trim())
}

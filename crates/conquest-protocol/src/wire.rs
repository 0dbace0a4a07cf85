//! Codec helpers: MessagePack for compact frames, JSON for the line protocol.

use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::SessionSnapshot;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn serialize_snapshot(snapshot: &SessionSnapshot) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(snapshot)?)
}

pub fn deserialize_snapshot(bytes: &[u8]) -> Result<SessionSnapshot, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn snapshot_to_json(snapshot: &SessionSnapshot) -> Result<String, WireError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Stable hash of a snapshot so observers can cheaply tell whether anything changed.
///
/// FNV-1a 64 over the MessagePack encoding. Map ordering is deterministic (BTreeMap).
pub fn snapshot_hash(snapshot: &SessionSnapshot) -> Result<u64, WireError> {
    let bytes = serialize_snapshot(snapshot)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

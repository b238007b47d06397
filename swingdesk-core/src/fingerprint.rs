//! Deterministic content hashes.
//!
//! Serialized through serde_json; every map in the hashed types is a
//! `BTreeMap`, so key order is stable and identical inputs hash identically.

use serde::Serialize;

use crate::error::EngineError;

/// blake3 hex digest of `value`'s JSON form.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    let json = serde_json::to_vec(value).map_err(|e| EngineError::Fingerprint(e.to_string()))?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

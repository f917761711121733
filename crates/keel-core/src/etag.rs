//! Content-derived entity tags.
//!
//! An ETag is the lowercase hex SHA-256 of the compact JSON encoding of an
//! object's data. `serde_json::Value` keeps object keys sorted, so equal
//! values always hash to the same tag regardless of insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Computes the ETag for raw bytes.
#[must_use]
pub fn compute_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Computes the ETag for a JSON document.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if the value cannot be encoded.
pub fn compute(data: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    Ok(compute_bytes(&bytes))
}

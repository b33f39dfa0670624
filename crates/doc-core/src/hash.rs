//! Stable hashes used for experiment identifiers and plan fingerprints.
//!
//! Both hashes operate on canonical JSON (sorted object keys) so they are
//! independent of map iteration order. Identifiers use SipHash-1-3 with fixed
//! zero keys; fingerprints use SHA-256. Neither may change without breaking
//! previously generated description files.

use std::hash::Hasher;

use serde::Serialize;
use sha2::{Digest, Sha256};
use siphasher::sip::SipHasher13;

use crate::errors::DocError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal SHA-256 fingerprint of a serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, DocError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

/// Computes a stable 64 bit identifier of a serializable value.
pub fn stable_id<T: Serialize>(value: &T) -> Result<u64, DocError> {
    let bytes = to_canonical_json_bytes(value)?;
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`.
///
/// Used for cache keys: callers hash a canonical serialization so that equal
/// requests map to equal keys.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

//! Stable hashing for content hashes, chunk IDs and cache fingerprints

use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Deterministic chunk ID derived from its location only.
///
/// Content is not hashed, so re-chunking identical boundaries reproduces
/// identical IDs.
pub fn chunk_id(source_id: &str, file_path: &str, start_line: usize, end_line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{start_line}-{end_line}").as_bytes());
    format!("{:x}", hasher.finalize())[..32].to_string()
}

/// Hash of a JSON value's canonical serialization.
pub fn stable_json_hash(value: &serde_json::Value) -> String {
    sha256_hex(&serde_json::to_vec(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_location_addressed() {
        let a = chunk_id("src", "a.ts", 1, 10);
        assert_eq!(a, chunk_id("src", "a.ts", 1, 10));
        assert_ne!(a, chunk_id("src", "a.ts", 1, 11));
        assert_ne!(a, chunk_id("other", "a.ts", 1, 10));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn separators_prevent_ambiguous_concatenation() {
        assert_ne!(chunk_id("ab", "c", 1, 2), chunk_id("a", "bc", 1, 2));
    }
}

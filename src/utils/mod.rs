//! Shared utilities

pub mod encoding;
pub mod hashing;
pub mod paths;
pub mod tokens;

pub use encoding::{decode_bytes, is_binary_bytes};
pub use hashing::{chunk_id, sha256_hex, stable_json_hash};
pub use paths::{join_relative, normalize_path, parent_dir, relative_path};
pub use tokens::{estimate_lines_tokens, estimate_tokens};

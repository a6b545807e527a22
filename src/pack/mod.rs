//! Token-budget packing of ranked chunks

use crate::domain::RankedChunk;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PackResult {
    pub chunks: Vec<RankedChunk>,
    pub total_tokens: usize,
    /// Ranked chunks left out, including everything after the first overflow
    pub excluded: usize,
}

/// Take chunks in rank order until the next one would exceed `budget`.
///
/// Packing stops at the first chunk that does not fit; later chunks are
/// never considered even if they are smaller. The result is always a
/// prefix of the ranked list.
pub fn pack(ranked: Vec<RankedChunk>, budget: usize) -> PackResult {
    let total = ranked.len();
    let mut chunks = Vec::new();
    let mut total_tokens = 0usize;

    for item in ranked {
        let tokens = item.chunk.token_count;
        if total_tokens + tokens > budget {
            debug!(
                chunk = %item.chunk.id,
                tokens,
                used = total_tokens,
                budget,
                "budget reached"
            );
            break;
        }
        total_tokens += tokens;
        chunks.push(item);
    }

    let excluded = total - chunks.len();
    PackResult { chunks, total_tokens, excluded }
}

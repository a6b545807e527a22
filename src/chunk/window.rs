//! Line-aligned token windows with overlap.

use crate::utils::estimate_tokens;

/// Split the 0-based line range `[start, end)` into windows of at most
/// `chunk_size` tokens, each seeded with up to `chunk_overlap` tokens of
/// trailing lines from the previous window.
///
/// The overlap seed gives way when it would push the next line past
/// `chunk_size`, so the bound holds for every window except one made of a
/// single line that is larger than `chunk_size` on its own. Returned ranges
/// are 0-based and half-open. Whitespace-only windows are dropped.
pub fn token_windows(
    lines: &[&str],
    start: usize,
    end: usize,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<(usize, usize)> {
    let end = end.min(lines.len());
    if start >= end {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let line_tokens: Vec<usize> = lines[start..end].iter().map(|l| estimate_tokens(l)).collect();
    let tokens_at = |idx: usize| line_tokens[idx - start];

    let mut windows = Vec::new();
    let mut win_start = start;
    let mut win_tokens = 0usize;
    let mut cursor = start;

    while cursor < end {
        let next = tokens_at(cursor);
        if cursor > win_start && win_tokens + next > chunk_size {
            windows.push((win_start, cursor));

            let mut seed_start = cursor;
            let mut seed_tokens = 0usize;
            while seed_start > win_start + 1 && seed_tokens + tokens_at(seed_start - 1) <= chunk_overlap {
                seed_start -= 1;
                seed_tokens += tokens_at(seed_start);
            }
            win_start = seed_start;
            win_tokens = seed_tokens;
        }
        while win_start < cursor && win_tokens + next > chunk_size {
            win_tokens -= tokens_at(win_start);
            win_start += 1;
        }
        win_tokens += next;
        cursor += 1;
    }
    windows.push((win_start, end));

    windows
        .into_iter()
        .filter(|&(s, e)| lines[s..e].iter().any(|l| !l.trim().is_empty()))
        .collect()
}

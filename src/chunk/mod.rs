//! Content chunking.
//!
//! Structural units become chunks when a parser reports boundaries; the
//! spans between them become header/footer chunks. Anything without usable
//! structure is cut into overlapping token windows.

pub mod window;

pub use window::token_windows;

use crate::domain::{Chunk, ChunkKind, CodeBoundary};
use crate::parser::{fold_methods, ParserRegistry, Placement};
use crate::utils::{chunk_id, estimate_lines_tokens, estimate_tokens};

/// Gaps between units at or below this many tokens are dropped.
pub const MIN_GAP_TOKENS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_unit_tokens: usize,
    pub use_structural_parsing: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self { chunk_size: 512, chunk_overlap: 64, max_unit_tokens: 1000, use_structural_parsing: true }
    }
}

struct ChunkBuilder<'a> {
    source_id: &'a str,
    path: &'a str,
    lines: Vec<&'a str>,
    options: ChunkOptions,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBuilder<'a> {
    /// `start`/`end` are 1-based inclusive.
    fn push(&mut self, start: usize, end: usize, kind: ChunkKind, unit_name: Option<String>, exported: Option<bool>) {
        let content = self.lines[start - 1..end].concat();
        if content.trim().is_empty() {
            return;
        }
        self.chunks.push(Chunk {
            id: chunk_id(self.source_id, self.path, start, end),
            source_id: self.source_id.to_string(),
            file_path: self.path.to_string(),
            token_count: estimate_tokens(&content),
            content,
            start_line: start,
            end_line: end,
            kind,
            unit_name,
            exported,
            embedding: Vec::new(),
        });
    }

    /// Emit `[start, end]` as one chunk, or as windows when over `limit`.
    fn push_split(
        &mut self,
        start: usize,
        end: usize,
        limit: usize,
        kind: ChunkKind,
        unit_name: Option<&str>,
        exported: Option<bool>,
    ) {
        let tokens = estimate_lines_tokens(&self.lines[start - 1..end]);
        if tokens <= limit {
            self.push(start, end, kind, unit_name.map(str::to_string), exported);
            return;
        }

        let windows =
            token_windows(&self.lines, start - 1, end, self.options.chunk_size, self.options.chunk_overlap);
        let total = windows.len();
        for (part, (s, e)) in windows.into_iter().enumerate() {
            let name = unit_name.map(|n| format!("{n} (part {}/{total})", part + 1));
            self.push(s + 1, e, kind, name, exported);
        }
    }

    /// Lines strictly between two units, trimmed of blank edges.
    fn push_gap(&mut self, from: usize, to: usize, kind: ChunkKind) {
        let (mut first, mut last) = (from, to);
        while first <= last && self.lines[first - 1].trim().is_empty() {
            first += 1;
        }
        while last >= first && self.lines[last - 1].trim().is_empty() {
            last -= 1;
        }
        if first > last {
            return;
        }
        let tokens = estimate_lines_tokens(&self.lines[first - 1..last]);
        if kind == ChunkKind::Header && tokens <= MIN_GAP_TOKENS {
            return;
        }
        self.push_split(first, last, self.options.chunk_size, kind, None, None);
    }

    fn structural(mut self, boundaries: &[CodeBoundary]) -> Vec<Chunk> {
        let plan = fold_methods(boundaries, &self.lines, self.options.max_unit_tokens);

        // Last line accounted for (emitted or covered by a container).
        let mut covered = 0usize;
        // Last line emitted by a unit; units overlapping it are clipped.
        let mut unit_end = 0usize;

        for planned in &plan {
            let b = &planned.boundary;
            if b.start_line > covered + 1 {
                self.push_gap(covered + 1, b.start_line - 1, ChunkKind::Header);
            }

            match planned.placement {
                Placement::Container => {
                    covered = covered.max(b.end_line);
                }
                Placement::Unit => {
                    if b.end_line <= unit_end {
                        continue;
                    }
                    let start = b.start_line.max(unit_end + 1);
                    self.push_split(
                        start,
                        b.end_line,
                        self.options.max_unit_tokens,
                        b.kind.into(),
                        Some(&b.name),
                        Some(b.exported),
                    );
                    unit_end = b.end_line;
                    covered = covered.max(b.end_line);
                }
            }
        }

        if covered < self.lines.len() {
            self.push_gap(covered + 1, self.lines.len(), ChunkKind::Footer);
        }

        self.chunks
    }

    fn windows(mut self) -> Vec<Chunk> {
        let windows =
            token_windows(&self.lines, 0, self.lines.len(), self.options.chunk_size, self.options.chunk_overlap);
        for (s, e) in windows {
            self.push(s + 1, e, ChunkKind::Window, None, None);
        }
        self.chunks
    }
}

/// Chunk one file's content.
///
/// Structural parsing is attempted when enabled; a failed parse or one that
/// yields no chunks falls back to token windows for the whole file. Never
/// fails: empty content produces no chunks.
pub fn chunk_file(
    registry: &ParserRegistry,
    source_id: &str,
    path: &str,
    content: &str,
    options: &ChunkOptions,
) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let builder = || ChunkBuilder {
        source_id,
        path,
        lines: content.split_inclusive('\n').collect(),
        options: *options,
        chunks: Vec::new(),
    };

    if options.use_structural_parsing && registry.supports(path) {
        let outcome = registry.parse(content, path);
        if outcome.success && !outcome.boundaries.is_empty() {
            let chunks = builder().structural(&outcome.boundaries);
            if !chunks.is_empty() {
                return chunks;
            }
        }
        if let Some(error) = outcome.error {
            tracing::debug!(path, "structural parse unavailable: {error}");
        }
    }

    builder().windows()
}

//! Class/method folding.
//!
//! A class small enough to be one chunk absorbs its methods. A larger class
//! becomes a container: its methods are chunked individually and the class
//! range itself is never emitted.

use crate::domain::{BoundaryKind, CodeBoundary};
use crate::utils::estimate_lines_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Emitted as a chunk (split if oversized)
    Unit,
    /// Covers lines but emits nothing itself
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBoundary {
    pub boundary: CodeBoundary,
    pub placement: Placement,
}

/// Resolve class/method nesting into a line-ordered plan.
///
/// `lines` are the file's lines including terminators; boundary line
/// numbers are clamped to them.
pub fn fold_methods(boundaries: &[CodeBoundary], lines: &[&str], max_unit_tokens: usize) -> Vec<PlannedBoundary> {
    let line_count = lines.len();
    let mut sorted: Vec<CodeBoundary> = boundaries
        .iter()
        .filter(|b| b.start_line >= 1 && b.start_line <= line_count)
        .map(|b| CodeBoundary { end_line: b.end_line.clamp(b.start_line, line_count), ..b.clone() })
        .collect();
    sorted.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
            .then(a.name.cmp(&b.name))
    });
    sorted.dedup_by(|a, b| a.start_line == b.start_line && a.end_line == b.end_line);

    let mut plan: Vec<PlannedBoundary> = Vec::with_capacity(sorted.len());
    let mut folded_until = 0usize;

    for (idx, boundary) in sorted.iter().enumerate() {
        if boundary.end_line <= folded_until {
            continue;
        }

        if boundary.kind == BoundaryKind::Class {
            let has_members = sorted[idx + 1..]
                .iter()
                .take_while(|b| b.start_line <= boundary.end_line)
                .any(|b| b.kind == BoundaryKind::Method && boundary.contains(b));
            let tokens = estimate_lines_tokens(&lines[boundary.start_line - 1..boundary.end_line]);

            if has_members && tokens > max_unit_tokens {
                plan.push(PlannedBoundary { boundary: boundary.clone(), placement: Placement::Container });
                continue;
            }
            folded_until = boundary.end_line;
        }

        plan.push(PlannedBoundary { boundary: boundary.clone(), placement: Placement::Unit });
    }

    plan
}

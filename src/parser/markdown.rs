//! Structural parser for markdown documents.
//!
//! Produces a non-overlapping partition of the non-blank parts of a
//! document: front matter, heading sections, and fenced code blocks. A
//! section interrupted by a fence resumes after it under the same heading.

use crate::domain::{BoundaryKind, CodeBoundary};

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

struct Fence {
    marker: char,
    len: usize,
}

fn fence_open(line: &str) -> Option<(Fence, String)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    let lang = info.split_whitespace().next().unwrap_or("").to_string();
    Some((Fence { marker, len }, lang))
}

fn fence_closes(fence: &Fence, line: &str) -> bool {
    let trimmed = line.trim();
    let count = trimmed.chars().take_while(|c| *c == fence.marker).count();
    count >= fence.len && trimmed.chars().skip(count).all(char::is_whitespace)
}

fn heading_text(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    Some(if text.is_empty() { "#".repeat(level) } else { text.to_string() })
}

impl MarkdownParser {
    pub fn extract(&self, content: &str) -> Vec<CodeBoundary> {
        let lines: Vec<&str> = content.lines().collect();
        let mut out = Vec::new();
        let mut idx = 0;

        if let Some(end) = front_matter_end(&lines) {
            out.push(block("front-matter".to_string(), 1, end + 1));
            idx = end + 1;
        }

        let mut section_name = "(preamble)".to_string();
        let mut section_start = idx;
        let mut resumed = false;

        while idx < lines.len() {
            let line = lines[idx];

            if let Some(heading) = heading_text(line) {
                flush(&mut out, &lines, &section_name, section_start, idx, resumed);
                section_name = heading;
                section_start = idx;
                resumed = false;
                idx += 1;
                continue;
            }

            if let Some((fence, lang)) = fence_open(line) {
                flush(&mut out, &lines, &section_name, section_start, idx, resumed);
                let mut end = idx + 1;
                while end < lines.len() && !fence_closes(&fence, lines[end]) {
                    end += 1;
                }
                let end = end.min(lines.len() - 1);
                let name = if lang.is_empty() { "code".to_string() } else { format!("code:{lang}") };
                out.push(block(name, idx + 1, end + 1));
                idx = end + 1;
                section_start = idx;
                resumed = true;
                continue;
            }

            idx += 1;
        }
        flush(&mut out, &lines, &section_name, section_start, lines.len(), resumed);

        out
    }
}

fn block(name: String, start_line: usize, end_line: usize) -> CodeBoundary {
    CodeBoundary { kind: BoundaryKind::Block, name, start_line, end_line, exported: false }
}

/// Emit `lines[start..end]` trimmed of blank edges, if anything remains.
fn flush(out: &mut Vec<CodeBoundary>, lines: &[&str], name: &str, start: usize, end: usize, resumed: bool) {
    let mut first = start;
    let mut last = end;
    while first < last && lines[first].trim().is_empty() {
        first += 1;
    }
    while last > first && lines[last - 1].trim().is_empty() {
        last -= 1;
    }
    if first >= last {
        return;
    }
    let name = if resumed { format!("{name} (cont.)") } else { name.to_string() };
    out.push(block(name, first + 1, last));
}

fn front_matter_end(lines: &[&str]) -> Option<usize> {
    let marker = match lines.first().map(|l| l.trim_end()) {
        Some("---") => "---",
        Some("+++") => "+++",
        _ => return None,
    };
    lines.iter().enumerate().skip(1).find(|(_, l)| l.trim_end() == marker).map(|(i, _)| i)
}

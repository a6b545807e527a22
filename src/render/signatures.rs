//! Signature-only view of chunk content for `map` output.

use crate::domain::{language_for_path, Chunk, ChunkKind};
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+(?:default\s+)?)?(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|const|static|abstract|declare|public|private|protected|readonly)\s+)*(?:function|class|interface|type|enum|struct|trait|impl|fn|def|func|mod|module|namespace|union)[\s*<]",
    )
    .expect("valid regex")
});

static ARROW_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+[\w$]+\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[\w$]+)\s*(?::[^=]+)?=>")
        .expect("valid regex")
});

static METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?:(?:async|static|public|private|protected|get|set|readonly)\s+)*#?[\w$]+\s*(?:<[^>]*>)?\s*\([^)]*\)?\s*(?::[^{]+)?\{?\s*$")
        .expect("valid regex")
});

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:import\b|from\s+\S+\s+import\b|use\s|package\s|(?:const|let|var)\s+.*=\s*require\()"#)
        .expect("valid regex")
});

const CONTROL_WORDS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "else"];
const MAX_SIGNATURE_LINES: usize = 8;

fn is_signature_line(line: &str, language: &str) -> bool {
    if SIGNATURE.is_match(line) || ARROW_BINDING.is_match(line) {
        return true;
    }
    if matches!(language, "javascript" | "typescript" | "tsx") && METHOD.is_match(line) {
        let word = line.trim_start().split(|c: char| !c.is_alphanumeric() && c != '_').next().unwrap_or("");
        return !CONTROL_WORDS.contains(&word);
    }
    false
}

fn paren_depth(line: &str) -> i32 {
    line.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

fn elide_body(line: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.ends_with('{') {
        format!("{trimmed} ... }}")
    } else if trimmed.ends_with(':') {
        format!("{trimmed} ...")
    } else {
        trimmed.to_string()
    }
}

/// Reduce a chunk to its declarations with bodies elided.
///
/// Header chunks keep their import lines; markdown keeps headings. When
/// nothing declarative is found the first non-blank line stands in.
pub fn signature_view(chunk: &Chunk) -> String {
    let language = language_for_path(&chunk.file_path);
    let lines: Vec<&str> = chunk.content.lines().collect();
    let mut out: Vec<String> = Vec::new();

    if language == "markdown" {
        out.extend(lines.iter().filter(|l| l.starts_with('#')).map(|l| l.trim_end().to_string()));
    } else if chunk.kind == ChunkKind::Header {
        out.extend(lines.iter().filter(|l| IMPORT_LINE.is_match(l)).map(|l| l.trim_end().to_string()));
    }

    if out.is_empty() && language != "markdown" {
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if !is_signature_line(line, language) {
                i += 1;
                continue;
            }
            // Multi-line parameter lists are kept whole
            let mut depth = paren_depth(line);
            let mut end = i;
            while depth > 0 && end + 1 < lines.len() && end - i + 1 < MAX_SIGNATURE_LINES {
                end += 1;
                depth += paren_depth(lines[end]);
            }
            for (offset, sig_line) in lines[i..=end].iter().enumerate() {
                if i + offset == end {
                    out.push(elide_body(sig_line));
                } else {
                    out.push(sig_line.trim_end().to_string());
                }
            }
            i = end + 1;
        }
    }

    if out.is_empty() {
        if let Some(first) = lines.iter().find(|l| !l.trim().is_empty()) {
            out.push(format!("{} ...", first.trim_end()));
        }
    }
    out.join("\n")
}

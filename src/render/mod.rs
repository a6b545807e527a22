//! Output rendering (markdown, xml, json, plain)
//!
//! Every format is a pure function of the packed chunk list; `json`
//! serializes the same records the text formats are rendered from.

pub mod signatures;

pub use signatures::signature_view;

use crate::domain::{language_for_path, Chunk, OutputFormat, OutputMode};
use crate::error::Result;
use quick_xml::escape::escape;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Write as _;

/// One rendered chunk. `content` is already reduced in `map` mode.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedChunk<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub path: &'a str,
    pub language: &'static str,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<&'a str>,
    pub tokens: usize,
    pub content: Cow<'a, str>,
}

/// Structured payload behind the `json` format.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionPayload<'a> {
    pub mode: &'static str,
    pub tokens_used: usize,
    pub files: Vec<&'a str>,
    pub chunks: Vec<RenderedChunk<'a>>,
}

fn rendered<'a>(chunks: &'a [Chunk], mode: OutputMode) -> Vec<RenderedChunk<'a>> {
    chunks
        .iter()
        .map(|chunk| RenderedChunk {
            id: &chunk.id,
            source: &chunk.source_id,
            path: &chunk.file_path,
            language: language_for_path(&chunk.file_path),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            kind: chunk.kind.as_str(),
            unit_name: chunk.unit_name.as_deref(),
            tokens: chunk.token_count,
            content: match mode {
                OutputMode::Full => Cow::Borrowed(chunk.content.as_str()),
                OutputMode::Map => Cow::Owned(signature_view(chunk)),
            },
        })
        .collect()
}

/// Distinct file paths in first-appearance order.
pub fn files_included(chunks: &[Chunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert((c.source_id.as_str(), c.file_path.as_str())))
        .map(|c| c.file_path.clone())
        .collect()
}

pub fn render(chunks: &[Chunk], mode: OutputMode, format: OutputFormat) -> Result<String> {
    let items = rendered(chunks, mode);
    let output = match format {
        OutputFormat::Markdown => render_markdown(&items),
        OutputFormat::Xml => render_xml(&items, mode),
        OutputFormat::Plain => render_plain(&items),
        OutputFormat::Json => {
            let mut files: Vec<&str> = Vec::new();
            let mut seen = HashSet::new();
            for item in &items {
                if seen.insert((item.source, item.path)) {
                    files.push(item.path);
                }
            }
            let payload = SelectionPayload {
                mode: mode.as_str(),
                tokens_used: chunks.iter().map(|c| c.token_count).sum(),
                files,
                chunks: items,
            };
            serde_json::to_string_pretty(&payload)?
        }
    };
    Ok(output)
}

/// Shortest backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn line_label(item: &RenderedChunk<'_>) -> String {
    match item.unit_name {
        Some(name) => format!("lines {}-{}, {}", item.start_line, item.end_line, name),
        None => format!("lines {}-{}", item.start_line, item.end_line),
    }
}

fn render_markdown(items: &[RenderedChunk<'_>]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let fence = fence_for(&item.content);
        let lang = match item.language {
            "text" => "",
            other => other,
        };
        let _ = writeln!(out, "## {} ({})", item.path, line_label(item));
        let _ = writeln!(out);
        let _ = writeln!(out, "{fence}{lang}");
        let _ = writeln!(out, "{}", item.content.trim_end_matches('\n'));
        let _ = writeln!(out, "{fence}");
    }
    out
}

fn render_xml(items: &[RenderedChunk<'_>], mode: OutputMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<context mode=\"{}\">", mode.as_str());
    for item in items {
        let name_attr = item
            .unit_name
            .map(|name| format!(" name=\"{}\"", escape(name)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  <file path=\"{}\" lines=\"{}-{}\" kind=\"{}\"{}>",
            escape(item.path),
            item.start_line,
            item.end_line,
            item.kind,
            name_attr
        );
        let _ = writeln!(out, "{}", escape(item.content.trim_end_matches('\n')));
        let _ = writeln!(out, "  </file>");
    }
    out.push_str("</context>\n");
    out
}

fn render_plain(items: &[RenderedChunk<'_>]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "// {}:{}-{}", item.path, item.start_line, item.end_line);
        let _ = writeln!(out, "{}", item.content.trim_end_matches('\n'));
        out.push('\n');
    }
    out
}

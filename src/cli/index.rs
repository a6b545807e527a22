//! Index command implementation

use anyhow::Result;
use clap::Args;

use super::utils::{parse_csv, ProjectArgs};
use crate::engine::IndexRequest;

#[derive(Args)]
pub struct IndexArgs {
    /// Re-chunk and re-embed every file, ignoring stored hashes
    #[arg(long)]
    pub force: bool,

    /// Only index these source ids (comma-separated)
    #[arg(short, long, value_name = "IDS")]
    pub sources: Option<String>,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(project: &ProjectArgs, args: IndexArgs) -> Result<()> {
    let mut engine = project.open_engine()?;
    let request = IndexRequest { force: args.force, sources: parse_csv(&args.sources), cancel: None };
    let stats = engine.index_sources(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Indexed {} file(s), {} chunk(s)", stats.files, stats.chunks);
    println!(
        "  changed: {}  unchanged: {}  removed: {}  skipped: {}  failed: {}",
        stats.files_changed, stats.files_unchanged, stats.files_removed, stats.files_skipped, stats.files_failed
    );
    println!("  embedded: {} chunk(s) in {} ms", stats.chunks_embedded, stats.time_ms);
    if stats.files_failed > 0 {
        eprintln!("Warning: {} file(s) failed to embed and keep their previous state", stats.files_failed);
    }
    Ok(())
}

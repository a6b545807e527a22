//! Stats command implementation

use anyhow::Result;
use clap::Args;

use super::utils::ProjectArgs;

#[derive(Args)]
pub struct StatsArgs {
    /// Also list this many recent queries
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub history: usize,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(project: &ProjectArgs, args: StatsArgs) -> Result<()> {
    let engine = project.open_engine()?;
    let stats = engine.stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Index version: {}", stats.index_version);
    println!("Files: {}", stats.total_files);
    println!("Chunks: {}", stats.total_chunks);
    println!("Tokens: {}", stats.total_tokens);
    println!("Cache: {} entries, {} hits", stats.cache_entries, stats.cache_hits);
    println!("Queries: {}", stats.queries);

    if !stats.sources.is_empty() {
        println!("Sources:");
        for source in &stats.sources {
            println!(
                "  {:<16} {:>6} files {:>8} chunks  last indexed {}",
                source.id,
                source.files,
                source.chunks,
                source.last_indexed_at.as_deref().unwrap_or("never")
            );
        }
    }

    if args.history > 0 {
        println!("Recent queries:");
        for entry in engine.recent_queries(args.history)? {
            println!(
                "  {:>5} tok / {:<6} {:>3} chunks {:>5} ms{}  {}",
                entry.tokens_used,
                entry.budget,
                entry.chunks_returned,
                entry.duration_ms,
                if entry.cache_hit { " cached" } else { "       " },
                entry.query
            );
        }
    }
    Ok(())
}

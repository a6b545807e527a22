//! Select command implementation

use anyhow::Result;
use clap::Args;

use super::utils::{parse_csv, ProjectArgs};
use crate::domain::{OutputFormat, OutputMode};
use crate::engine::SelectionRequest;

#[derive(Args)]
pub struct SelectArgs {
    /// Task description or question
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Token budget (defaults to selection.default_budget)
    #[arg(short, long, value_name = "TOKENS")]
    pub budget: Option<usize>,

    /// Full chunk content or signatures only
    #[arg(short, long, value_enum, default_value_t = OutputMode::Full)]
    pub mode: OutputMode,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Only select from these source ids (comma-separated)
    #[arg(short, long, value_name = "IDS")]
    pub sources: Option<String>,

    /// Disable the same-file diversity penalty
    #[arg(long)]
    pub no_diversity: bool,

    /// Disable import-graph boosting
    #[arg(long)]
    pub no_imports: bool,
}

pub fn run(project: &ProjectArgs, args: SelectArgs) -> Result<()> {
    let engine = project.open_engine()?;
    let request = SelectionRequest {
        query: args.query,
        budget: args.budget,
        mode: args.mode,
        format: args.format,
        sources: parse_csv(&args.sources),
        diversity_penalty: args.no_diversity.then_some(false),
        include_imports: args.no_imports.then_some(false),
    };
    let result = engine.select_context(&request)?;

    print!("{}", result.context);
    eprintln!(
        "{} chunk(s) from {} file(s), {} token(s){}",
        result.chunks.len(),
        result.files_included.len(),
        result.tokens_used,
        if result.cache_hit { " (cached)" } else { "" }
    );
    Ok(())
}

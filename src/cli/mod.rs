//! Command-line interface for codectx
//!
//! Each subcommand maps onto one [`crate::ContextEngine`] operation.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod index;
mod select;
mod stats;
mod symbols;
mod utils;

/// Select the most relevant code for a task within a token budget
#[derive(Parser)]
#[command(name = "codectx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root; relative source roots and the index path resolve against it
    #[arg(short = 'C', long, global = true, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to codectx.toml / .codectx.toml / codectx.yml in the root)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index configured sources (incremental)
    Index(index::IndexArgs),

    /// Select context for a query within a token budget
    Select(select::SelectArgs),

    /// Search declared symbols by name
    Symbols(symbols::SymbolsArgs),

    /// Show callers and callees of a symbol
    Callgraph(symbols::CallgraphArgs),

    /// Show index statistics
    Stats(stats::StatsArgs),

    /// Remove every cached selection
    CacheClear,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let project = utils::ProjectArgs { root: cli.root, config: cli.config };
    match cli.command {
        Commands::Index(args) => index::run(&project, args),
        Commands::Select(args) => select::run(&project, args),
        Commands::Symbols(args) => symbols::run_symbols(&project, args),
        Commands::Callgraph(args) => symbols::run_callgraph(&project, args),
        Commands::Stats(args) => stats::run(&project, args),
        Commands::CacheClear => {
            let engine = project.open_engine()?;
            let removed = engine.clear_cache()?;
            println!("Removed {removed} cached selection(s)");
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "codectx", &mut std::io::stdout());
            Ok(())
        }
    }
}

//! Symbol search and call graph commands

use anyhow::Result;
use clap::Args;

use super::utils::ProjectArgs;
use crate::symbols::DEFAULT_SYMBOL_LIMIT;

#[derive(Args)]
pub struct SymbolsArgs {
    /// Symbol name or fragment
    #[arg(value_name = "NAME")]
    pub query: String,

    /// Require a case-sensitive exact name match
    #[arg(long)]
    pub exact: bool,

    /// Max results to display
    #[arg(short = 'n', long, value_name = "COUNT", default_value_t = DEFAULT_SYMBOL_LIMIT)]
    pub limit: usize,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CallgraphArgs {
    /// Function or method name, optionally qualified (`Type.method`)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Print the graph as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_symbols(project: &ProjectArgs, args: SymbolsArgs) -> Result<()> {
    let engine = project.open_engine()?;
    let matches = engine.search_symbols(&args.query, args.exact, Some(args.limit))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }
    if matches.is_empty() {
        println!("No symbols matching '{}'", args.query);
        return Ok(());
    }
    for m in &matches {
        println!("{}:{}  {} {}  [{}]", m.file_path, m.line, m.kind.as_str(), m.name, m.source_id);
        println!("    {}", m.signature);
    }
    Ok(())
}

pub fn run_callgraph(project: &ProjectArgs, args: CallgraphArgs) -> Result<()> {
    let engine = project.open_engine()?;
    let graph = engine.build_call_graph(&args.symbol)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }
    if graph.definitions.is_empty() {
        println!("No definition of '{}' found", graph.target);
    }
    for def in &graph.definitions {
        println!("Defined: {}:{} ({})", def.file_path, def.line, def.name);
    }

    println!("Callers ({}):", graph.callers.len());
    for caller in &graph.callers {
        println!("  {}:{}  in {}", caller.file_path, caller.line, caller.name);
    }

    println!("Callees ({}):", graph.callees.len());
    for callee in &graph.callees {
        println!("  {}  {}", callee.name, callee.file_path);
    }
    Ok(())
}

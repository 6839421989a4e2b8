//! ProfitGraph CLI — turn video transcripts into a queryable knowledge graph.
//!
//! Ingests YouTube captions, runs the agent pass over them, and maintains
//! a Neo4j knowledge graph with query, planning, and dashboard surfaces.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

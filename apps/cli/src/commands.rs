//! CLI command definitions, routing, and tracing setup.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use profitgraph_agents::{GeminiClient, SonarClient};
use profitgraph_core::dashboard::build_dashboard;
use profitgraph_core::marker;
use profitgraph_core::oracle::Oracle;
use profitgraph_core::pipeline::{
    AgentStack, IngestConfig, ProcessConfig, ProgressReporter, ingest_video, process_transcript,
    run_pipeline,
};
use profitgraph_core::planner::{PlanConfig, generate_plan};
use profitgraph_core::refine::{RefineConfig, refine_graph};
use profitgraph_graph::GraphClient;
use profitgraph_shared::{
    AppConfig, GraphCredentials, init_config, load_config, resolve_api_key, validate_api_keys,
};
use profitgraph_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ProfitGraph — video transcripts in, knowledge graph out.
#[derive(Parser)]
#[command(
    name = "profitgraph",
    version,
    about = "Turn video transcripts into a queryable knowledge graph with AI-generated strategy briefs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline for a video: ingest, agent pass, graph sync.
    Run {
        /// Video URL or ID to process.
        url: String,
    },

    /// Ingest a transcript without processing it.
    ///
    /// Prints `OUTPUT_FILE::<path>` as the final stdout line so external
    /// orchestrators can pick up the produced transcript.
    Ingest {
        /// Video URL, video ID, or a queue file with one URL per line.
        target: String,

        /// Re-fetch even if a transcript already exists.
        #[arg(long)]
        force: bool,
    },

    /// Run the agent pass over an ingested transcript.
    ///
    /// With no argument, lists pending transcripts and exits. Pass `-` to
    /// read the previous stage's output from stdin and extract the
    /// `OUTPUT_FILE::` marker.
    Process {
        /// Path to a `<video_id>_transcript.json` file, or `-` for stdin.
        transcript: Option<PathBuf>,
    },

    /// Identify typed relationships between entities in unrefined strategies.
    Refine {
        /// Maximum strategies to refine in one sweep.
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },

    /// Ask the graph a question (interactive REPL without an argument).
    Ask {
        /// One-shot question; omit for the interactive session.
        question: Option<String>,
    },

    /// Generate an implementation plan for a graph topic.
    Plan {
        /// Topic node name (e.g. an entity like "Supabase").
        topic: String,
    },

    /// Export the knowledge graph as an interactive HTML dashboard.
    Dashboard {
        /// Output file (defaults to `<output>/dashboard/profitgraph.html`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Quick graph sanity check: entry count and previews.
    Status,

    /// Apply graph constraints and indexes.
    Setup,

    /// List ingested videos and their processed state.
    List,

    /// Full-text search over stored strategy briefs.
    Search {
        /// FTS query.
        query: String,

        /// Maximum hits.
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "profitgraph=info",
        1 => "profitgraph=debug",
        _ => "profitgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { url } => cmd_run(&url).await,
        Command::Ingest { target, force } => cmd_ingest(&target, force).await,
        Command::Process { transcript } => cmd_process(transcript.as_deref()).await,
        Command::Refine { limit } => cmd_refine(limit).await,
        Command::Ask { question } => cmd_ask(question.as_deref()).await,
        Command::Plan { topic } => cmd_plan(&topic).await,
        Command::Dashboard { out } => cmd_dashboard(out).await,
        Command::Status => cmd_status().await,
        Command::Setup => cmd_setup().await,
        Command::List => cmd_list().await,
        Command::Search { query, limit } => cmd_search(&query, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Client construction
// ---------------------------------------------------------------------------

fn build_gemini(config: &AppConfig) -> Result<GeminiClient> {
    let key = resolve_api_key(&config.gemini.api_key_env)?;
    Ok(GeminiClient::new(key, config.gemini.model.clone())?)
}

fn build_plan_gemini(config: &AppConfig) -> Result<GeminiClient> {
    let key = resolve_api_key(&config.gemini.api_key_env)?;
    Ok(GeminiClient::new(key, config.gemini.plan_model.clone())?)
}

fn build_sonar(config: &AppConfig) -> Result<SonarClient> {
    let key = resolve_api_key(&config.sonar.api_key_env)?;
    Ok(SonarClient::new(key, config.sonar.model.clone())?)
}

/// Connect to the graph, or fail with config guidance.
fn connect_graph(config: &AppConfig) -> Result<GraphClient> {
    let creds = GraphCredentials::resolve(&config.graph)?;
    Ok(GraphClient::connect(&creds)?)
}

/// Graph sync is optional for processing; missing credentials degrade to a
/// warning instead of an error.
fn try_connect_graph(config: &AppConfig) -> Option<GraphClient> {
    match GraphCredentials::resolve(&config.graph) {
        Ok(creds) => match GraphClient::connect(&creds) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "graph connection failed, sync will be skipped");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "graph credentials not configured, sync will be skipped");
            None
        }
    }
}

fn build_stack(config: &AppConfig) -> Result<AgentStack> {
    Ok(AgentStack {
        gemini: build_gemini(config)?,
        sonar: build_sonar(config)?,
        graph: try_connect_graph(config),
        use_cache: true,
    })
}

async fn open_storage(output_root: &Path) -> Result<Storage> {
    let db_path = output_root.join("indexes").join("profitgraph.db");
    Ok(Storage::open(&db_path).await?)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn step(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(url: &str) -> Result<()> {
    let config = load_config()?;
    validate_api_keys(&config)?;

    let output_root = config.defaults.output_path()?;
    let storage = open_storage(&output_root).await?;
    let stack = build_stack(&config)?;

    let ingest_config = IngestConfig {
        target: url.to_string(),
        output_root,
        languages: config.defaults.caption_languages.clone(),
        force: false,
    };

    info!(url, "running full pipeline");

    let reporter = CliProgress::new();
    let result = run_pipeline(&ingest_config, &stack, &storage, &reporter).await;
    reporter.finish();
    let outcome = result?;

    println!();
    println!("  Pipeline complete!");
    println!("  Video:     {}", outcome.process.video_id);
    println!("  Brief:     {}", outcome.process.brief_path.display());
    println!("  Entities:  {}", outcome.process.entity_count);
    println!("  Research:  {} queries", outcome.process.queries_run);
    if outcome.process.graph_synced {
        println!("  Graph:     synced ({} entities)", outcome.process.entities_synced);
    } else {
        println!("  Graph:     skipped (no credentials)");
    }
    println!("  Time:      {:.1}s", outcome.process.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_ingest(target: &str, force: bool) -> Result<()> {
    let config = load_config()?;
    let output_root = config.defaults.output_path()?;
    let storage = open_storage(&output_root).await?;

    // A local file is a batch queue of URLs, one per line
    let targets = if Path::new(target).is_file() {
        let queue = profitgraph_ingest::read_batch_queue(Path::new(target))?;
        println!("Reading batch queue: {target} ({} videos)", queue.len());
        queue
    } else {
        vec![target.to_string()]
    };

    if targets.is_empty() {
        return Err(eyre!("batch queue '{target}' contains no URLs"));
    }

    let total = targets.len();
    let mut failures = 0usize;

    for (i, entry) in targets.iter().enumerate() {
        if total > 1 {
            println!("--- Processing {}/{total} ---", i + 1);
        }

        let ingest_config = IngestConfig {
            target: entry.clone(),
            output_root: output_root.clone(),
            languages: config.defaults.caption_languages.clone(),
            force,
        };

        let reporter = CliProgress::new();
        let result = ingest_video(&ingest_config, &storage, &reporter).await;
        reporter.finish();

        match result {
            Ok(outcome) => {
                if outcome.reused {
                    println!("Transcript already ingested: {}", outcome.video_id);
                }
                // Machine-readable hand-off line, kept last on stdout
                println!("{}", marker::emit(&outcome.transcript_path));
            }
            Err(e) => {
                failures += 1;
                eprintln!("Ingestion failed for '{entry}': {e}");
            }
        }
    }

    if failures == total {
        return Err(eyre!("all {total} ingestion targets failed"));
    }
    Ok(())
}

async fn cmd_process(transcript: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let output_root = config.defaults.output_path()?;
    let storage = open_storage(&output_root).await?;

    let Some(transcript_path) = transcript else {
        // No argument: list what is waiting, then exit
        let pending = storage.list_pending().await?;
        if pending.is_empty() {
            println!("No pending transcripts.");
            return Ok(());
        }
        println!("Pending transcripts:");
        for record in &pending {
            println!("  {}  {}", record.video_id, record.transcript_path);
        }
        println!();
        println!("Process one with: profitgraph process <transcript-file>");
        return Ok(());
    };

    // `-` consumes a previous stage's output and takes the marker's path
    let transcript_path = if transcript_path == Path::new("-") {
        let mut stage_output = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut stage_output)?;
        marker::require(&stage_output)?
    } else {
        transcript_path.to_path_buf()
    };

    if !transcript_path.exists() {
        return Err(eyre!(
            "transcript not found: {}",
            transcript_path.display()
        ));
    }

    validate_api_keys(&config)?;
    let stack = build_stack(&config)?;

    let process_config = ProcessConfig {
        transcript_path,
        output_root,
    };

    let reporter = CliProgress::new();
    let result = process_transcript(&process_config, &stack, &storage, &reporter).await;
    reporter.finish();
    let outcome = result?;

    println!();
    println!("  Processing complete!");
    println!("  Video:     {}", outcome.video_id);
    println!("  Brief:     {}", outcome.brief_path.display());
    println!("  Entities:  {}", outcome.entity_count);
    println!(
        "  Research:  {} queries ({} failed)",
        outcome.queries_run, outcome.queries_failed
    );
    println!(
        "  Cache:     {} hits / {} misses",
        outcome.cache_hits, outcome.cache_misses
    );
    println!(
        "  Tokens:    {} in / {} out",
        outcome.tokens_in, outcome.tokens_out
    );
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_refine(limit: u32) -> Result<()> {
    let config = load_config()?;
    let gemini = build_gemini(&config)?;
    let graph = connect_graph(&config)?;

    let reporter = CliProgress::new();
    let result = refine_graph(&RefineConfig { limit }, &gemini, &graph, &reporter).await;
    reporter.finish();
    let outcome = result?;

    if outcome.strategies_seen == 0 {
        println!("All strategies are already refined.");
    } else {
        println!(
            "Refined {}/{} strategies, {} new connections.",
            outcome.strategies_refined, outcome.strategies_seen, outcome.relationships_applied
        );
    }
    Ok(())
}

async fn cmd_ask(question: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let gemini = build_gemini(&config)?;
    let graph = connect_graph(&config)?;

    let oracle = Oracle::connect(gemini, graph).await?;

    if let Some(question) = question {
        let answer = oracle.answer(question).await?;
        println!("{}", answer.answer);
        return Ok(());
    }

    println!();
    println!("The Oracle is listening... (type 'exit' to quit)");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        // Bad generated Cypher should not end the session
        match oracle.answer(question).await {
            Ok(answer) => {
                println!();
                println!("Oracle: {}", answer.answer);
                println!();
            }
            Err(e) => println!("  {e}"),
        }
    }

    println!();
    println!("Oracle disconnected.");
    Ok(())
}

async fn cmd_plan(topic: &str) -> Result<()> {
    let config = load_config()?;
    let gemini = build_plan_gemini(&config)?;
    let graph = connect_graph(&config)?;

    let plan_config = PlanConfig {
        topic: topic.to_string(),
        output_root: config.defaults.output_path()?,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let reporter = CliProgress::new();
    reporter.phase("Generating plan");
    let result = generate_plan(&plan_config, &gemini, &graph).await;
    reporter.finish();
    let outcome = result?;

    if outcome.context_lines == 0 {
        println!("No graph context found for '{topic}'; plan generated from the topic alone.");
    }
    println!("Plan saved: {}", outcome.plan_path.display());
    Ok(())
}

async fn cmd_dashboard(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let graph = connect_graph(&config)?;

    let out_path = match out {
        Some(path) => path,
        None => config
            .defaults
            .output_path()?
            .join("dashboard")
            .join("profitgraph.html"),
    };

    let reporter = CliProgress::new();
    reporter.phase("Downloading graph");
    let result = build_dashboard(&graph, &out_path).await;
    reporter.finish();
    let outcome = result?;

    println!(
        "Dashboard ready: {} ({} nodes, {} edges)",
        outcome.path.display(),
        outcome.nodes,
        outcome.edges
    );
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let graph = connect_graph(&config)?;

    let overview = graph.strategy_overview(5).await?;
    if overview.is_empty() {
        println!("Database is empty.");
        return Ok(());
    }

    println!("Found {} entries:", overview.len());
    for (video, preview) in &overview {
        println!("  - Video: {video} | Strategy: {preview}...");
    }
    Ok(())
}

async fn cmd_setup() -> Result<()> {
    let config = load_config()?;
    let graph = connect_graph(&config)?;

    graph.apply_constraints().await?;
    println!("Constraints active. Graph is ready for batch ingestion.");
    Ok(())
}

async fn cmd_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config.defaults.output_path()?).await?;

    let videos = storage.list_videos().await?;
    if videos.is_empty() {
        println!("No videos ingested yet.");
        return Ok(());
    }

    for record in &videos {
        let state = if record.processed_at.is_some() {
            "processed"
        } else {
            "pending"
        };
        println!(
            "  {}  [{state}]  ingested {}",
            record.video_id,
            record.ingested_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn cmd_search(query: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config.defaults.output_path()?).await?;

    let hits = storage.search_briefs(query, limit).await?;
    if hits.is_empty() {
        println!("No briefs match '{query}'.");
        return Ok(());
    }

    for hit in &hits {
        println!("  {}  {}", hit.video_id, hit.filename);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

//! End-to-end pipelines: ingest → agent pass → brief → graph sync.

use std::path::PathBuf;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use profitgraph_agents::{GeminiClient, SonarClient, architect, scout, strategist};
use profitgraph_graph::GraphClient;
use profitgraph_ingest::{Ingestor, content_hash, load_transcript, save_transcript};
use profitgraph_shared::{ProfitGraphError, Result, VideoId};
use profitgraph_storage::Storage;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Step-level progress within the current phase.
    fn step(&self, current: usize, total: usize, detail: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn step(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Agent stack
// ---------------------------------------------------------------------------

/// The connected clients a processing run needs.
#[derive(Clone)]
pub struct AgentStack {
    pub gemini: GeminiClient,
    pub sonar: SonarClient,
    /// Graph sync is skipped (with a warning) when no client is configured.
    pub graph: Option<GraphClient>,
    /// Reuse cached agent responses for identical prompts.
    pub use_cache: bool,
}

/// Compute the cache key hash for an agent prompt.
pub(crate) fn prompt_hash(prompt: &str, artifact_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(artifact_type.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Ingest pipeline
// ---------------------------------------------------------------------------

/// Configuration for the ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// URL or bare video ID to ingest.
    pub target: String,
    /// Root directory for transcripts, briefs, plans, and the index.
    pub output_root: PathBuf,
    /// Caption language preferences.
    pub languages: Vec<String>,
    /// Re-fetch even when a transcript is already on disk.
    pub force: bool,
}

/// Result of the ingest pipeline.
#[derive(Debug)]
pub struct IngestOutcome {
    pub video_id: VideoId,
    pub transcript_path: PathBuf,
    /// True when an existing transcript was reused instead of fetched.
    pub reused: bool,
}

/// Resolve, fetch, clean, and persist a video transcript.
#[instrument(skip_all, fields(target = %config.target))]
pub async fn ingest_video(
    config: &IngestConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<IngestOutcome> {
    progress.phase("Resolving video ID");
    let video_id = VideoId::parse(&config.target)?;

    let transcripts_dir = config.output_root.join("transcripts");

    // Reuse an existing transcript unless forced
    if !config.force {
        if let Some(record) = storage.get_video(video_id.as_str()).await? {
            let path = PathBuf::from(&record.transcript_path);
            if path.exists() {
                info!(%video_id, "transcript already ingested, reusing");
                return Ok(IngestOutcome {
                    video_id,
                    transcript_path: path,
                    reused: true,
                });
            }
        }
    }

    progress.phase("Fetching captions");
    let ingestor = Ingestor::new(config.languages.clone())?;
    let doc = ingestor.fetch_transcript(&video_id).await?;

    progress.phase("Saving transcript");
    let transcript_path = save_transcript(&doc, &transcripts_dir)?;

    storage
        .upsert_video(
            video_id.as_str(),
            &transcript_path.to_string_lossy(),
            &content_hash(&doc.transcript_text),
            &doc.source_engine,
        )
        .await?;

    info!(%video_id, path = %transcript_path.display(), "ingest complete");

    Ok(IngestOutcome {
        video_id,
        transcript_path,
        reused: false,
    })
}

// ---------------------------------------------------------------------------
// Process pipeline
// ---------------------------------------------------------------------------

/// Configuration for the processing pipeline.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Transcript document to process.
    pub transcript_path: PathBuf,
    /// Root directory for briefs and the index.
    pub output_root: PathBuf,
}

/// Result of the processing pipeline.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub video_id: VideoId,
    pub run_id: String,
    pub brief_path: PathBuf,
    pub entity_count: usize,
    pub entities_synced: usize,
    pub queries_run: usize,
    pub queries_failed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub graph_synced: bool,
    pub elapsed: std::time::Duration,
}

/// Run the agent pass over a transcript and sync the result to the graph.
///
/// Strategist → Scout → Architect → brief on disk → graph sync. The video is
/// marked processed only after the brief exists and any configured graph
/// sync succeeded.
#[instrument(skip_all, fields(transcript = %config.transcript_path.display()))]
pub async fn process_transcript(
    config: &ProcessConfig,
    stack: &AgentStack,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<ProcessOutcome> {
    let start = Instant::now();

    progress.phase("Loading transcript");
    let doc = load_transcript(&config.transcript_path)?;
    let vid = doc.video_id.as_str();

    // The transcript may come from an external orchestrator; make sure the
    // video row exists before attaching runs to it.
    storage
        .upsert_video(
            vid,
            &config.transcript_path.to_string_lossy(),
            &content_hash(&doc.transcript_text),
            &doc.source_engine,
        )
        .await?;

    let run_id = storage.insert_run(vid).await?;
    info!(video_id = %vid, %run_id, "processing run started");

    let mut cache_hits = 0usize;
    let mut cache_misses = 0usize;
    let mut tokens_in = 0u64;
    let mut tokens_out = 0u64;

    // --- Phase 1: Strategist ---
    progress.phase("Analyzing transcript for critical risks");
    let strategist_prompt = strategist::prompt(&doc.transcript_text);
    let strategist_hash = prompt_hash(&strategist_prompt, "strategist");

    let cached = if stack.use_cache {
        storage
            .get_agent_cache(vid, "strategist", &strategist_hash, stack.gemini.model())
            .await?
    } else {
        None
    };

    let strategist_raw = match cached {
        Some(raw) => {
            cache_hits += 1;
            raw
        }
        None => {
            let call_start = Instant::now();
            match stack.gemini.generate_json(&strategist_prompt).await {
                Ok(outcome) => {
                    cache_misses += 1;
                    tokens_in += outcome.tokens_in;
                    tokens_out += outcome.tokens_out;
                    storage
                        .log_agent(
                            &run_id,
                            "Strategist",
                            strategist::PROMPT_VERSION,
                            &doc.transcript_text,
                            &outcome.text,
                            call_start.elapsed().as_millis() as u64,
                        )
                        .await?;
                    storage
                        .set_agent_cache(
                            vid,
                            "strategist",
                            &strategist_hash,
                            stack.gemini.model(),
                            &outcome.text,
                        )
                        .await?;
                    outcome.text
                }
                // A failed gap analysis degrades to an empty research plan;
                // the Architect still gets the transcript itself.
                Err(e) => {
                    warn!(error = %e, "strategist call failed, continuing without research plan");
                    String::new()
                }
            }
        }
    };
    let plan = strategist::parse_plan(&strategist_raw);

    // --- Phase 2: Scout ---
    progress.phase("Executing research plan");
    let scout_start = Instant::now();
    let report = scout::execute_plan(&stack.sonar, &plan).await?;
    tokens_in += report.tokens_in;
    tokens_out += report.tokens_out;

    if report.queries_run > 0 {
        storage
            .log_agent(
                &run_id,
                "Scout",
                scout::PROMPT_VERSION,
                &plan.research_questions.join("; "),
                &report.summary,
                scout_start.elapsed().as_millis() as u64,
            )
            .await?;
    }

    // --- Phase 3: Architect ---
    progress.phase("Synthesizing strategy and extracting entities");
    let architect_prompt = architect::prompt(&doc.transcript_text, &report.summary);
    let architect_hash = prompt_hash(&architect_prompt, "architect");

    let cached = if stack.use_cache {
        storage
            .get_agent_cache(vid, "architect", &architect_hash, stack.gemini.model())
            .await?
    } else {
        None
    };

    let architect_raw = match cached {
        Some(raw) => {
            cache_hits += 1;
            raw
        }
        None => {
            let call_start = Instant::now();
            let outcome = stack.gemini.generate_json(&architect_prompt).await?;
            cache_misses += 1;
            tokens_in += outcome.tokens_in;
            tokens_out += outcome.tokens_out;
            storage
                .log_agent(
                    &run_id,
                    "Architect",
                    architect::PROMPT_VERSION,
                    &report.summary,
                    &outcome.text,
                    call_start.elapsed().as_millis() as u64,
                )
                .await?;
            storage
                .set_agent_cache(
                    vid,
                    "architect",
                    &architect_hash,
                    stack.gemini.model(),
                    &outcome.text,
                )
                .await?;
            outcome.text
        }
    };
    let brief = architect::parse_brief(&architect_raw, &doc.video_id);

    // --- Phase 4: Write the brief ---
    progress.phase("Writing strategy brief");
    let rendered = profitgraph_artifacts::render_brief(&brief);
    let filename = profitgraph_artifacts::brief_filename(&doc.video_id, &brief.filename);

    let briefs_dir = config.output_root.join("briefs");
    std::fs::create_dir_all(&briefs_dir).map_err(|e| ProfitGraphError::io(&briefs_dir, e))?;
    let brief_path = briefs_dir.join(&filename);
    std::fs::write(&brief_path, &rendered).map_err(|e| ProfitGraphError::io(&brief_path, e))?;

    storage.upsert_brief(vid, &filename, &rendered).await?;
    info!(path = %brief_path.display(), "strategy brief saved");

    // --- Phase 5: Graph sync ---
    let mut entities_synced = 0;
    let graph_synced = match &stack.graph {
        Some(graph) => {
            progress.phase("Syncing to knowledge graph");
            graph
                .sync_strategy(&doc.video_id, &rendered, &report.summary)
                .await?;
            entities_synced = graph.sync_entities(&doc.video_id, &brief.entities).await?;
            true
        }
        None => {
            warn!("graph credentials not configured, skipping graph sync");
            false
        }
    };

    storage.mark_processed(vid).await?;

    let stats = serde_json::json!({
        "entities": brief.entities.len(),
        "entities_synced": entities_synced,
        "queries_run": report.queries_run,
        "queries_failed": report.queries_failed,
        "cache_hits": cache_hits,
        "cache_misses": cache_misses,
        "tokens_in": tokens_in,
        "tokens_out": tokens_out,
        "graph_synced": graph_synced,
    });
    storage.finish_run(&run_id, &stats.to_string()).await?;

    let outcome = ProcessOutcome {
        video_id: doc.video_id,
        run_id,
        brief_path,
        entity_count: brief.entities.len(),
        entities_synced,
        queries_run: report.queries_run,
        queries_failed: report.queries_failed,
        cache_hits,
        cache_misses,
        tokens_in,
        tokens_out,
        graph_synced,
        elapsed: start.elapsed(),
    };

    info!(
        video_id = %outcome.video_id,
        entities = outcome.entity_count,
        queries = outcome.queries_run,
        graph_synced = outcome.graph_synced,
        elapsed_ms = outcome.elapsed.as_millis(),
        "processing complete"
    );

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

/// Result of the full ingest-then-process pipeline.
#[derive(Debug)]
pub struct RunOutcome {
    pub ingest: IngestOutcome,
    pub process: ProcessOutcome,
}

/// Run the full pipeline for a URL: ingestion, an existence check on the
/// produced transcript, then the agent pass.
///
/// Ingestion failure stops the pipeline before any model call is made.
#[instrument(skip_all, fields(target = %ingest_config.target))]
pub async fn run_pipeline(
    ingest_config: &IngestConfig,
    stack: &AgentStack,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let ingest = ingest_video(ingest_config, storage, progress).await?;

    if !ingest.transcript_path.exists() {
        return Err(ProfitGraphError::validation(format!(
            "ingestion finished but transcript not found: {}",
            ingest.transcript_path.display()
        )));
    }

    let process_config = ProcessConfig {
        transcript_path: ingest.transcript_path.clone(),
        output_root: ingest_config.output_root.clone(),
    };
    let process = process_transcript(&process_config, stack, storage, progress).await?;

    Ok(RunOutcome { ingest, process })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use profitgraph_ingest::save_transcript;
    use profitgraph_shared::{CURRENT_SCHEMA_VERSION, TranscriptDoc};
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn prompt_hash_deterministic() {
        let h1 = prompt_hash("hello world", "strategist");
        let h2 = prompt_hash("hello world", "strategist");
        assert_eq!(h1, h2);
    }

    #[test]
    fn prompt_hash_differs_by_artifact() {
        let h1 = prompt_hash("hello", "strategist");
        let h2 = prompt_hash("hello", "architect");
        assert_ne!(h1, h2);
    }

    fn gemini_text(text: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text.to_string()}]}}],
            "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 50}
        })
    }

    fn graph_ok() -> serde_json::Value {
        serde_json::json!({"results": [{"columns": [], "data": []}], "errors": []})
    }

    struct TestWorld {
        storage: Storage,
        stack: AgentStack,
        config: ProcessConfig,
        output_root: PathBuf,
    }

    /// Mock every external surface: Gemini (strategist + architect), Sonar,
    /// and the graph endpoint, plus a transcript on disk.
    async fn build_world(server: &MockServer, use_cache: bool) -> TestWorld {
        // Strategist: JSON-mode prompt mentioning critical failure points
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .and(body_string_contains("Critical Failure Points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text(
                &serde_json::json!({"research_questions": ["GLM-4 API pricing?"]}),
            )))
            .mount(server)
            .await;

        // Architect: synthesis prompt
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .and(body_string_contains("Profit Synergy Brief"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text(
                &serde_json::json!({
                    "filename": "glm_cost_analysis.md",
                    "content": "# GLM Cost Analysis\nBody",
                    "marketing": {"viral_tweet": "hook", "linkedin": "points"},
                    "entities": [
                        {"type": "Model", "name": "GLM-4", "detail": "LLM"},
                        {"type": "Risk", "name": "API Cost", "detail": "High at scale"}
                    ]
                }),
            )))
            .mount(server)
            .await;

        // Scout
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "About $2/M tokens."}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 30}
            })))
            .mount(server)
            .await;

        // Graph
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graph_ok()))
            .mount(server)
            .await;

        let output_root = std::env::temp_dir().join(format!("pg-core-test-{}", Uuid::now_v7()));
        let transcripts_dir = output_root.join("transcripts");

        let doc = TranscriptDoc {
            schema_version: CURRENT_SCHEMA_VERSION,
            video_id: VideoId::parse("dQw4w9WgXcQ").unwrap(),
            transcript_text: "we are using JLM for inference".into(),
            source_engine: "captions/en (auto)".into(),
            ingested_at: Utc::now(),
        };
        let transcript_path = save_transcript(&doc, &transcripts_dir).unwrap();

        let storage = Storage::open(&output_root.join("indexes").join("profitgraph.db"))
            .await
            .unwrap();

        let stack = AgentStack {
            gemini: GeminiClient::new("k", "gemini-2.0-flash-exp")
                .unwrap()
                .with_origin(&server.uri())
                .unwrap(),
            sonar: SonarClient::new("k", "sonar")
                .unwrap()
                .with_origin(&server.uri())
                .unwrap(),
            graph: Some(
                GraphClient::connect(&profitgraph_shared::GraphCredentials {
                    uri: server.uri(),
                    user: "neo4j".into(),
                    password: "secret".into(),
                    database: "neo4j".into(),
                })
                .unwrap(),
            ),
            use_cache,
        };

        TestWorld {
            storage,
            stack,
            config: ProcessConfig {
                transcript_path,
                output_root: output_root.clone(),
            },
            output_root,
        }
    }

    #[tokio::test]
    async fn process_transcript_end_to_end() {
        let server = MockServer::start().await;
        let world = build_world(&server, false).await;

        let outcome =
            process_transcript(&world.config, &world.stack, &world.storage, &SilentProgress)
                .await
                .expect("process");

        assert_eq!(outcome.video_id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(outcome.entity_count, 2);
        assert_eq!(outcome.entities_synced, 2);
        assert_eq!(outcome.queries_run, 1);
        assert!(outcome.graph_synced);

        // Brief written with the video-id prefix and marketing section
        assert!(
            outcome
                .brief_path
                .ends_with("dQw4w9WgXcQ_glm_cost_analysis.md")
        );
        let rendered = std::fs::read_to_string(&outcome.brief_path).unwrap();
        assert!(rendered.contains("# GLM Cost Analysis"));
        assert!(rendered.contains("## Marketing Assets"));

        // Video marked processed
        let record = world
            .storage
            .get_video("dQw4w9WgXcQ")
            .await
            .unwrap()
            .unwrap();
        assert!(record.processed_at.is_some());

        // Telemetry captured the agents
        let log = world
            .storage
            .agent_log_for_run(&outcome.run_id)
            .await
            .unwrap();
        let agents: Vec<&str> = log.iter().map(|(a, _, _)| a.as_str()).collect();
        assert!(agents.contains(&"Strategist"));
        assert!(agents.contains(&"Scout"));
        assert!(agents.contains(&"Architect"));

        let _ = std::fs::remove_dir_all(&world.output_root);
    }

    #[tokio::test]
    async fn second_run_hits_cache() {
        let server = MockServer::start().await;
        let world = build_world(&server, true).await;

        let first =
            process_transcript(&world.config, &world.stack, &world.storage, &SilentProgress)
                .await
                .expect("first run");
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first.cache_misses, 2);

        let second =
            process_transcript(&world.config, &world.stack, &world.storage, &SilentProgress)
                .await
                .expect("second run");
        assert_eq!(second.cache_hits, 2);
        assert_eq!(second.cache_misses, 0);

        let _ = std::fs::remove_dir_all(&world.output_root);
    }

    #[tokio::test]
    async fn process_without_graph_still_completes() {
        let server = MockServer::start().await;
        let mut world = build_world(&server, false).await;
        world.stack.graph = None;

        let outcome =
            process_transcript(&world.config, &world.stack, &world.storage, &SilentProgress)
                .await
                .expect("process");

        assert!(!outcome.graph_synced);
        assert_eq!(outcome.entities_synced, 0);

        let record = world
            .storage
            .get_video("dQw4w9WgXcQ")
            .await
            .unwrap()
            .unwrap();
        assert!(record.processed_at.is_some());

        let _ = std::fs::remove_dir_all(&world.output_root);
    }

    #[tokio::test]
    async fn missing_transcript_is_a_validation_error() {
        let server = MockServer::start().await;
        let world = build_world(&server, false).await;

        let config = ProcessConfig {
            transcript_path: world.output_root.join("missing_transcript.json"),
            output_root: world.output_root.clone(),
        };

        let result =
            process_transcript(&config, &world.stack, &world.storage, &SilentProgress).await;
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&world.output_root);
    }
}

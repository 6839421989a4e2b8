//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database for the ProfitGraph local
//! index: ingested videos and their processed state, run history, per-agent
//! telemetry, the LLM response cache, and full-text search over strategy
//! briefs.
//!
//! The CLI is the sole writer via [`Storage::open`]; external readers use
//! [`Storage::open_readonly`].

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use profitgraph_shared::{ProfitGraphError, Result};
use uuid::Uuid;

/// Maximum preview length persisted in the agent telemetry log.
const PREVIEW_CHARS: usize = 50;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// An ingested video row.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub video_id: String,
    pub transcript_path: String,
    pub content_hash: String,
    pub source_engine: String,
    pub ingested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A full-text search hit over stored briefs.
#[derive(Debug, Clone)]
pub struct BriefHit {
    pub video_id: String,
    pub filename: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProfitGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ProfitGraphError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProfitGraphError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Video operations
    // -----------------------------------------------------------------------

    /// Upsert an ingested video. Re-ingestion refreshes the transcript path,
    /// hash, and timestamp but keeps the processed state.
    pub async fn upsert_video(
        &self,
        video_id: &str,
        transcript_path: &str,
        content_hash: &str,
        source_engine: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO videos (video_id, transcript_path, content_hash, source_engine, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(video_id) DO UPDATE SET
                   transcript_path = excluded.transcript_path,
                   content_hash = excluded.content_hash,
                   source_engine = excluded.source_engine,
                   ingested_at = excluded.ingested_at",
                params![video_id, transcript_path, content_hash, source_engine, now.as_str()],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a video by ID.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT video_id, transcript_path, content_hash, source_engine, ingested_at, processed_at
                 FROM videos WHERE video_id = ?1",
                params![video_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_video(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ProfitGraphError::Storage(e.to_string())),
        }
    }

    /// List all ingested videos, newest first.
    pub async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        self.query_videos(
            "SELECT video_id, transcript_path, content_hash, source_engine, ingested_at, processed_at
             FROM videos ORDER BY ingested_at DESC",
        )
        .await
    }

    /// List videos that have been ingested but not yet processed.
    pub async fn list_pending(&self) -> Result<Vec<VideoRecord>> {
        self.query_videos(
            "SELECT video_id, transcript_path, content_hash, source_engine, ingested_at, processed_at
             FROM videos WHERE processed_at IS NULL ORDER BY ingested_at",
        )
        .await
    }

    async fn query_videos(&self, sql: &str) -> Result<Vec<VideoRecord>> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_video(&row)?);
        }
        Ok(results)
    }

    /// Mark a video as processed (synced to the graph).
    pub async fn mark_processed(&self, video_id: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE videos SET processed_at = ?1 WHERE video_id = ?2",
                params![now.as_str(), video_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Insert a new processing run. Returns the generated run ID.
    pub async fn insert_run(&self, video_id: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, video_id, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), video_id, now.as_str()],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Close a run with completion stats.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Agent telemetry
    // -----------------------------------------------------------------------

    /// Append a telemetry row for a single agent invocation.
    ///
    /// Input/output are truncated to short previews; full responses live in
    /// the agent cache and the rendered artifacts, not the log.
    pub async fn log_agent(
        &self,
        run_id: &str,
        agent: &str,
        prompt_version: &str,
        input: &str,
        output: &str,
        duration_ms: u64,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let input_preview = preview(input);
        let output_preview = preview(output);
        self.conn
            .execute(
                "INSERT INTO agent_log (run_id, agent, prompt_version, input_preview, output_preview, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run_id,
                    agent,
                    prompt_version,
                    input_preview.as_str(),
                    output_preview.as_str(),
                    duration_ms as i64,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Telemetry rows for a run: `(agent, prompt_version, duration_ms)`.
    pub async fn agent_log_for_run(&self, run_id: &str) -> Result<Vec<(String, String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT agent, prompt_version, duration_ms FROM agent_log
                 WHERE run_id = ?1 ORDER BY id",
                params![run_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let agent: String = row
                .get(0)
                .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
            let version: String = row
                .get(1)
                .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
            let duration: i64 = row.get(2).unwrap_or(0);
            results.push((agent, version, duration.max(0) as u64));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Agent cache operations
    // -----------------------------------------------------------------------

    /// Get a cached agent result.
    pub async fn get_agent_cache(
        &self,
        video_id: &str,
        artifact_type: &str,
        prompt_hash: &str,
        model_id: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result FROM agent_cache
                 WHERE video_id = ?1 AND artifact_type = ?2 AND prompt_hash = ?3 AND model_id = ?4",
                params![video_id, artifact_type, prompt_hash, model_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let result: String = row
                    .get(0)
                    .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProfitGraphError::Storage(e.to_string())),
        }
    }

    /// Store an agent result in the cache (upserts).
    pub async fn set_agent_cache(
        &self,
        video_id: &str,
        artifact_type: &str,
        prompt_hash: &str,
        model_id: &str,
        result: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO agent_cache (id, video_id, artifact_type, prompt_hash, model_id, result, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(video_id, artifact_type, prompt_hash, model_id) DO UPDATE SET
                   result = excluded.result,
                   created_at = excluded.created_at",
                params![id.as_str(), video_id, artifact_type, prompt_hash, model_id, result, now.as_str()],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Invalidate all cached agent results for a video.
    pub async fn invalidate_agent_cache(&self, video_id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM agent_cache WHERE video_id = ?1",
                params![video_id],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Briefs & FTS search
    // -----------------------------------------------------------------------

    /// Upsert the strategy brief for a video.
    pub async fn upsert_brief(&self, video_id: &str, filename: &str, content: &str) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO briefs (id, video_id, filename, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(video_id) DO UPDATE SET
                   filename = excluded.filename,
                   content = excluded.content,
                   created_at = excluded.created_at",
                params![id.as_str(), video_id, filename, content, now.as_str()],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Full-text search across stored briefs.
    pub async fn search_briefs(&self, query: &str, limit: u32) -> Result<Vec<BriefHit>> {
        let mut rows = self
            .conn
            .query(
                "SELECT b.video_id, b.filename, rank
                 FROM briefs_fts fts
                 JOIN briefs b ON b.rowid = fts.rowid
                 WHERE briefs_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                params![query, limit],
            )
            .await
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let video_id: String = row
                .get(0)
                .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
            let filename: String = row
                .get(1)
                .map_err(|e| ProfitGraphError::Storage(e.to_string()))?;
            let score: f64 = row.get(2).unwrap_or(0.0);
            results.push(BriefHit {
                video_id,
                filename,
                score,
            });
        }
        Ok(results)
    }
}

/// Truncate to a short, char-safe preview for the telemetry log.
fn preview(s: &str) -> String {
    s.chars().take(PREVIEW_CHARS).collect()
}

/// Convert a database row to a [`VideoRecord`].
fn row_to_video(row: &libsql::Row) -> Result<VideoRecord> {
    Ok(VideoRecord {
        video_id: row
            .get::<String>(0)
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?,
        transcript_path: row
            .get::<String>(1)
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?,
        content_hash: row
            .get::<String>(2)
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?,
        source_engine: row
            .get::<String>(3)
            .map_err(|e| ProfitGraphError::Storage(e.to_string()))?,
        ingested_at: parse_timestamp(
            &row.get::<String>(4)
                .map_err(|e| ProfitGraphError::Storage(e.to_string()))?,
        )?,
        processed_at: match row.get::<String>(5) {
            Ok(s) => Some(parse_timestamp(&s)?),
            Err(_) => None,
        },
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProfitGraphError::Storage(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("pg_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("pg_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn video_lifecycle() {
        let storage = test_storage().await;

        storage
            .upsert_video("dQw4w9WgXcQ", "/tmp/dQw4w9WgXcQ_transcript.json", "abc123", "captions/en")
            .await
            .expect("upsert video");

        let video = storage
            .get_video("dQw4w9WgXcQ")
            .await
            .expect("get video")
            .expect("found");
        assert_eq!(video.content_hash, "abc123");
        assert!(video.processed_at.is_none());

        // Pending until processed
        let pending = storage.list_pending().await.expect("list pending");
        assert_eq!(pending.len(), 1);

        storage
            .mark_processed("dQw4w9WgXcQ")
            .await
            .expect("mark processed");

        let pending = storage.list_pending().await.expect("list pending");
        assert!(pending.is_empty());

        let video = storage.get_video("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert!(video.processed_at.is_some());
    }

    #[tokio::test]
    async fn reingest_preserves_processed_state() {
        let storage = test_storage().await;

        storage
            .upsert_video("abc12345678", "/tmp/a.json", "hash1", "captions/en")
            .await
            .unwrap();
        storage.mark_processed("abc12345678").await.unwrap();

        // Re-ingest with a new hash
        storage
            .upsert_video("abc12345678", "/tmp/a.json", "hash2", "captions/en")
            .await
            .unwrap();

        let video = storage.get_video("abc12345678").await.unwrap().unwrap();
        assert_eq!(video.content_hash, "hash2");
        assert!(video.processed_at.is_some());
    }

    #[tokio::test]
    async fn run_lifecycle() {
        let storage = test_storage().await;
        storage
            .upsert_video("abc12345678", "/tmp/a.json", "hash", "captions/en")
            .await
            .unwrap();

        let run_id = storage.insert_run("abc12345678").await.expect("insert run");
        assert!(!run_id.is_empty());

        storage
            .finish_run(&run_id, r#"{"entities": 7}"#)
            .await
            .expect("finish run");
    }

    #[tokio::test]
    async fn agent_log_truncates_previews() {
        let storage = test_storage().await;
        storage
            .upsert_video("abc12345678", "/tmp/a.json", "hash", "captions/en")
            .await
            .unwrap();
        let run_id = storage.insert_run("abc12345678").await.unwrap();

        let long_input = "x".repeat(500);
        storage
            .log_agent(&run_id, "Strategist", "gap_analysis_v1", &long_input, "ok", 1200)
            .await
            .expect("log agent");

        let log = storage.agent_log_for_run(&run_id).await.expect("read log");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "Strategist");
        assert_eq!(log[0].2, 1200);
    }

    #[tokio::test]
    async fn agent_cache_hit_miss_invalidate() {
        let storage = test_storage().await;

        // Miss
        let cached = storage
            .get_agent_cache("vid12345678", "strategist", "hash1", "gemini-2.0-flash-exp")
            .await
            .expect("get cache miss");
        assert!(cached.is_none());

        // Set
        storage
            .set_agent_cache(
                "vid12345678",
                "strategist",
                "hash1",
                "gemini-2.0-flash-exp",
                r#"{"research_questions": []}"#,
            )
            .await
            .expect("set cache");

        // Hit
        let cached = storage
            .get_agent_cache("vid12345678", "strategist", "hash1", "gemini-2.0-flash-exp")
            .await
            .expect("get cache hit");
        assert!(cached.is_some());
        assert!(cached.unwrap().contains("research_questions"));

        // Invalidate
        storage
            .invalidate_agent_cache("vid12345678")
            .await
            .expect("invalidate");
        let cached = storage
            .get_agent_cache("vid12345678", "strategist", "hash1", "gemini-2.0-flash-exp")
            .await
            .expect("get after invalidate");
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn brief_fts_search() {
        let storage = test_storage().await;

        for (vid, filename, content) in [
            ("aaaaaaaaaaa", "aaaaaaaaaaa_vector_dbs.md", "Comparing vector databases for RAG"),
            ("bbbbbbbbbbb", "bbbbbbbbbbb_agents.md", "Agent orchestration with local models"),
            ("ccccccccccc", "ccccccccccc_pricing.md", "Token pricing and context windows"),
        ] {
            storage
                .upsert_brief(vid, filename, content)
                .await
                .expect("upsert brief");
        }

        let results = storage.search_briefs("pricing", 10).await.expect("search");
        assert!(!results.is_empty());
        assert_eq!(results[0].video_id, "ccccccccccc");
    }

    #[tokio::test]
    async fn brief_upsert_replaces_content() {
        let storage = test_storage().await;
        storage
            .upsert_brief("aaaaaaaaaaa", "old.md", "old content")
            .await
            .unwrap();
        storage
            .upsert_brief("aaaaaaaaaaa", "new.md", "new content")
            .await
            .unwrap();

        let results = storage.search_briefs("new", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "new.md");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("pg_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_video("abc12345678", "/tmp/a.json", "hash", "captions/en")
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro
            .upsert_video("def12345678", "/tmp/b.json", "hash", "captions/en")
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}

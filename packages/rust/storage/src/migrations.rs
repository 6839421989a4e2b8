//! SQL migration definitions for the ProfitGraph local index.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: videos, runs, agent_log, agent_cache, briefs, FTS5",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested videos. processed_at is NULL until the agent pass has
-- synced the video into the knowledge graph.
CREATE TABLE IF NOT EXISTS videos (
    video_id        TEXT PRIMARY KEY,
    transcript_path TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    source_engine   TEXT NOT NULL,
    ingested_at     TEXT NOT NULL,
    processed_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_videos_processed ON videos(processed_at);

-- Processing run history
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    video_id    TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_video_id ON runs(video_id);

-- Per-agent telemetry, append-only
CREATE TABLE IF NOT EXISTS agent_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id         TEXT NOT NULL,
    agent          TEXT NOT NULL,
    prompt_version TEXT NOT NULL,
    input_preview  TEXT NOT NULL,
    output_preview TEXT NOT NULL,
    duration_ms    INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agent_log_run ON agent_log(run_id);

-- LLM response cache
CREATE TABLE IF NOT EXISTS agent_cache (
    id            TEXT PRIMARY KEY,
    video_id      TEXT NOT NULL,
    artifact_type TEXT NOT NULL,
    prompt_hash   TEXT NOT NULL,
    model_id      TEXT NOT NULL,
    result        TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE(video_id, artifact_type, prompt_hash, model_id)
);

CREATE INDEX IF NOT EXISTS idx_agent_cache_video ON agent_cache(video_id);

-- Generated strategy briefs
CREATE TABLE IF NOT EXISTS briefs (
    id         TEXT PRIMARY KEY,
    video_id   TEXT NOT NULL,
    filename   TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(video_id)
);

-- Full-text search on briefs
CREATE VIRTUAL TABLE IF NOT EXISTS briefs_fts USING fts5(
    filename,
    content,
    content=briefs,
    content_rowid=rowid
);

-- Triggers to keep FTS in sync with the briefs table
CREATE TRIGGER IF NOT EXISTS briefs_fts_insert AFTER INSERT ON briefs BEGIN
    INSERT INTO briefs_fts(rowid, filename, content)
    VALUES (new.rowid, new.filename, new.content);
END;

CREATE TRIGGER IF NOT EXISTS briefs_fts_delete AFTER DELETE ON briefs BEGIN
    INSERT INTO briefs_fts(briefs_fts, rowid, filename, content)
    VALUES ('delete', old.rowid, old.filename, old.content);
END;

CREATE TRIGGER IF NOT EXISTS briefs_fts_update AFTER UPDATE ON briefs BEGIN
    INSERT INTO briefs_fts(briefs_fts, rowid, filename, content)
    VALUES ('delete', old.rowid, old.filename, old.content);
    INSERT INTO briefs_fts(rowid, filename, content)
    VALUES (new.rowid, new.filename, new.content);
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

//! Core domain types for the ProfitGraph pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{ProfitGraphError, Result};

/// Current schema version for the transcript document format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// VideoId
// ---------------------------------------------------------------------------

/// Fallback pattern for video IDs embedded in otherwise unrecognized URLs.
static ID_FALLBACK_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("valid regex"));

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a video ID from a bare ID or any of the common URL shapes:
    /// `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `/embed/<id>`, `/v/<id>`,
    /// with a regex fallback for everything else.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Bare 11-char ID
        if is_raw_id(input) && !input.contains("youtube") {
            return Ok(Self(input.to_string()));
        }

        if let Ok(url) = url::Url::parse(input) {
            if let Some(id) = id_from_url(&url) {
                return Ok(Self(id));
            }
        }

        if let Some(caps) = ID_FALLBACK_RE.captures(input) {
            return Ok(Self(caps[1].to_string()));
        }

        Err(ProfitGraphError::validation(format!(
            "not a recognizable YouTube URL or video ID: {input}"
        )))
    }

    /// The raw 11-character identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical transcript filename for this video.
    pub fn transcript_filename(&self) -> String {
        format!("{}_transcript.json", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = ProfitGraphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_raw_id(s: &str) -> bool {
    s.len() == 11
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn id_from_url(url: &url::Url) -> Option<String> {
    let host = url.host_str()?;

    if host == "youtu.be" {
        let id = url.path().trim_start_matches('/');
        return is_raw_id(id).then(|| id.to_string());
    }

    if matches!(host, "www.youtube.com" | "youtube.com" | "m.youtube.com") {
        if url.path() == "/watch" {
            return url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.to_string())
                .filter(|v| is_raw_id(v));
        }
        let segments: Vec<&str> = url.path().trim_start_matches('/').split('/').collect();
        if let ["embed" | "v", id, ..] = segments.as_slice() {
            return is_raw_id(id).then(|| (*id).to_string());
        }
    }

    None
}

// ---------------------------------------------------------------------------
// TranscriptDoc
// ---------------------------------------------------------------------------

/// The `<video_id>_transcript.json` document produced by ingestion and
/// consumed by the processing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDoc {
    /// Schema version for forward compatibility.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The source video.
    pub video_id: VideoId,
    /// Cleaned caption text, one block of prose.
    pub transcript_text: String,
    /// Which caption source produced this text (e.g. "captions/en").
    pub source_engine: String,
    /// When the transcript was ingested.
    pub ingested_at: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

// ---------------------------------------------------------------------------
// Agent outputs
// ---------------------------------------------------------------------------

/// Research plan produced by the Strategist agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchPlan {
    /// Questions for the Scout to research.
    #[serde(default, alias = "questions")]
    pub research_questions: Vec<String>,
}

/// A key entity extracted from a strategy brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Open-ended entity category (Tool, Model, Framework, Risk, Action, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name; unique within the graph.
    pub name: String,
    /// Short free-text qualifier.
    #[serde(default)]
    pub detail: String,
}

impl Entity {
    /// Graph sync requires both a name and a kind.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.kind.trim().is_empty()
    }
}

/// Marketing copy attached to a strategy brief.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketingCopy {
    #[serde(default)]
    pub viral_tweet: String,
    #[serde(default)]
    pub linkedin: String,
}

/// The Architect agent's synthesized output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyBrief {
    /// Model-suggested snake_case filename (sanitized before use).
    pub filename: String,
    /// Markdown brief body.
    pub content: String,
    /// Optional marketing assets appended to the rendered brief.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<MarketingCopy>,
    /// Extracted key entities for graph sync.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// The closed set of relationship verbs the Refiner may write to the graph.
///
/// Verbs are interpolated into Cypher as relationship types, so the set is
/// an enum rather than a free string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    #[serde(rename = "INTEGRATES_WITH")]
    IntegratesWith,
    #[serde(rename = "RUNS_ON")]
    RunsOn,
    #[serde(rename = "COMPETES_WITH")]
    CompetesWith,
    #[serde(rename = "MITIGATES")]
    Mitigates,
}

impl RelKind {
    /// The Cypher relationship type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntegratesWith => "INTEGRATES_WITH",
            Self::RunsOn => "RUNS_ON",
            Self::CompetesWith => "COMPETES_WITH",
            Self::Mitigates => "MITIGATES",
        }
    }
}

impl std::fmt::Display for RelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed edge between two entities, identified by the Refiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub rel: RelKind,
}

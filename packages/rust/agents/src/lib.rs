//! LLM clients and the ProfitGraph agent pass.
//!
//! Three agents turn a transcript into graph-ready intelligence:
//! - **Strategist** identifies critical failure points worth researching
//! - **Scout** executes the research plan against a live search model
//! - **Architect** synthesizes the brief and extracts key entities
//!
//! A fourth, the **Refiner**, runs post-hoc over stored briefs to identify
//! typed relationships between entities.
//!
//! Agents are prompt builders + response parsers; orchestration, caching,
//! and telemetry live in `profitgraph-core`.

pub mod architect;
pub mod fence;
pub mod gemini;
pub mod refiner;
pub mod scout;
pub mod sonar;
pub mod strategist;

pub use gemini::GeminiClient;
pub use sonar::SonarClient;

/// Result of a single model invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentOutcome {
    /// Raw response text (fences included, parsing is the caller's job).
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
}

/// Truncate content to approximately `max_chars` characters (char-safe).
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{truncated}\n\n[... content truncated for context window ...]")
    }
}

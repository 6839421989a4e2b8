//! The Strategist agent: find the critical failure points worth researching.

use tracing::warn;

use profitgraph_shared::ResearchPlan;

use crate::fence::strip_fences;
use crate::truncate_chars;

/// Telemetry tag for this prompt revision.
pub const PROMPT_VERSION: &str = "gap_analysis_v2";

/// Transcript budget for the gap-analysis prompt.
const TRANSCRIPT_BUDGET: usize = 15_000;

/// Build the gap-analysis prompt for a transcript.
pub fn prompt(transcript: &str) -> String {
    let transcript = truncate_chars(transcript, TRANSCRIPT_BUDGET);
    format!(
        r#"You are a cynical, high-level CTO. Review this transcript for a technical business.

Your Goal: Identify 3-5 "Critical Failure Points" or "Implementation Blockers."

CRITICAL INSTRUCTION - AUDIO CLEANUP:
The transcript is from auto-captions and may have phonetic errors.
- If you see "JLM", it likely means "GLM" (General Language Model).
- If you see "Lama", it likely means "Llama".
- If you see "OpenAI Opus", CORRECT IT to "Claude 3 Opus" or "GPT-4o" based on context.
- USE THE CORRECT TECHNICAL TERMS in your search queries.

Focus on:
1. UNDOCUMENTED COSTS (API pricing, tokens).
2. PLATFORM RISK (Reliance on specific providers).
3. TECHNICAL LIMITS (Context window, latency).

Return JSON:
{{
    "research_questions": [
        "Query 1",
        "Query 2"
    ]
}}

Transcript:
{transcript}"#
    )
}

/// Parse the model response into a research plan.
///
/// Malformed output degrades to an empty plan; the pipeline continues
/// without research rather than failing the video.
pub fn parse_plan(response: &str) -> ResearchPlan {
    let cleaned = strip_fences(response);
    match serde_json::from_str::<ResearchPlan>(&cleaned) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "strategist returned malformed plan, continuing without research");
            ResearchPlan::default()
        }
    }
}

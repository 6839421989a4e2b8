//! The Architect agent: synthesize the strategy brief and extract entities.

use tracing::warn;

use profitgraph_shared::{StrategyBrief, VideoId};

use crate::fence::strip_fences;
use crate::truncate_chars;

/// Telemetry tag for this prompt revision.
pub const PROMPT_VERSION: &str = "entity_extractor_v2";

/// Transcript budget for the synthesis prompt.
const TRANSCRIPT_BUDGET: usize = 5_000;

/// Build the synthesis prompt from the transcript and Scout findings.
pub fn prompt(transcript: &str, research: &str) -> String {
    let transcript = truncate_chars(transcript, TRANSCRIPT_BUDGET);
    format!(
        r##"Context: ProfitGraph Business Strategy.
Input 1: Transcript (User Content)
{transcript}
Input 2: Verified Research (External Validation)
{research}

Task:
1. Create a "Profit Synergy Brief" (Markdown).
2. Extract KEY ENTITIES as a structured list:
   - Models (LLMs like GPT-4, Claude, Llama)
   - Interfaces (IDEs, SaaS, wrappers like Cursor, Whisper Flow)
   - Frameworks (LangChain, OMI, Supabase)
   - Risks (Business, Tech, Vendor)
   - Actions (Implementation steps)
3. Generate a SMART FILENAME (snake_case).

Return JSON:
{{
    "filename": "smart_name.md",
    "content": "# Markdown Report...",
    "marketing": {{
        "viral_tweet": "280 char hook...",
        "linkedin": "Bullet points..."
    }},
    "entities": [
        {{"type": "Tool", "name": "Supabase", "detail": "Database"}},
        {{"type": "Risk", "name": "API Cost", "detail": "High at scale"}}
    ]
}}"##
    )
}

/// Parse the model response into a [`StrategyBrief`].
///
/// Accepts a top-level object or a single-element array. When the response
/// is not parseable the raw text becomes the brief body under a fallback
/// filename, with no entities.
pub fn parse_brief(response: &str, video_id: &VideoId) -> StrategyBrief {
    let cleaned = strip_fences(response);

    let value: Option<serde_json::Value> = serde_json::from_str(&cleaned).ok();
    let object = value.map(|v| match v {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    });

    if let Some(object) = object {
        match serde_json::from_value::<StrategyBrief>(object) {
            Ok(brief) => return brief,
            Err(e) => {
                warn!(error = %e, "architect JSON did not match the brief shape, using fallback");
            }
        }
    } else {
        warn!("architect returned non-JSON output, using fallback");
    }

    StrategyBrief {
        filename: format!("{video_id}_strategy_fallback.md"),
        content: cleaned,
        marketing: None,
        entities: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn prompt_embeds_both_inputs() {
        let p = prompt("transcript text", "Q: cost?\nA: high");
        assert!(p.contains("transcript text"));
        assert!(p.contains("A: high"));
        assert!(p.contains("SMART FILENAME"));
    }

    #[test]
    fn parse_well_formed_brief() {
        let response = r##"{
            "filename": "local_inference_stack.md",
            "content": "# Brief\nBody",
            "marketing": {"viral_tweet": "hook", "linkedin": "points"},
            "entities": [{"type": "Tool", "name": "Supabase", "detail": "Database"}]
        }"##;
        let brief = parse_brief(response, &vid());
        assert_eq!(brief.filename, "local_inference_stack.md");
        assert_eq!(brief.entities.len(), 1);
        assert_eq!(brief.marketing.unwrap().viral_tweet, "hook");
    }

    #[test]
    fn parse_unwraps_single_element_array() {
        let response = r##"[{"filename": "a.md", "content": "# A"}]"##;
        let brief = parse_brief(response, &vid());
        assert_eq!(brief.filename, "a.md");
    }

    #[test]
    fn parse_fenced_response() {
        let response = "```json\n{\"filename\": \"b.md\", \"content\": \"# B\"}\n```";
        let brief = parse_brief(response, &vid());
        assert_eq!(brief.filename, "b.md");
    }

    #[test]
    fn fallback_on_non_json() {
        let brief = parse_brief("plain prose, no JSON here", &vid());
        assert_eq!(brief.filename, "dQw4w9WgXcQ_strategy_fallback.md");
        assert_eq!(brief.content, "plain prose, no JSON here");
        assert!(brief.entities.is_empty());
    }

    #[test]
    fn fallback_on_wrong_shape() {
        let brief = parse_brief(r#"{"unexpected": true}"#, &vid());
        assert_eq!(brief.filename, "dQw4w9WgXcQ_strategy_fallback.md");
    }
}

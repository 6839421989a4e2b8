//! The Refiner agent: identify typed relationships between entities.

use tracing::warn;

use profitgraph_shared::Relationship;

use crate::fence::strip_fences;
use crate::truncate_chars;

/// Telemetry tag for this prompt revision.
pub const PROMPT_VERSION: &str = "relationship_analyst_v1";

/// Brief-text budget for the relationship prompt.
const BRIEF_BUDGET: usize = 5_000;

/// Build the relationship-identification prompt for a strategy brief.
pub fn prompt(brief_text: &str) -> String {
    let brief_text = truncate_chars(brief_text, BRIEF_BUDGET);
    format!(
        r#"Analyze this tech strategy brief.
Identify technical relationships between tools/concepts mentioned.

Return a JSON list of relationships using these specific verbs:
- "INTEGRATES_WITH" (e.g. IDE uses Model)
- "RUNS_ON" (e.g. App runs on Cloud)
- "COMPETES_WITH" (e.g. Claude vs GPT-4)
- "MITIGATES" (e.g. Cache mitigates Latency)

Output Format (Strict JSON):
[
    {{"source": "Cursor", "target": "Claude 3.5", "rel": "INTEGRATES_WITH"}},
    {{"source": "Supabase", "target": "Firebase", "rel": "COMPETES_WITH"}}
]

Text:
{brief_text}"#
    )
}

/// Parse the model response into relationships.
///
/// Each list item is parsed independently; entries with unknown verbs or a
/// missing field are dropped with a warning rather than failing the batch.
pub fn parse_relationships(response: &str) -> Vec<Relationship> {
    let cleaned = strip_fences(response);

    let items: Vec<serde_json::Value> = match serde_json::from_str(&cleaned) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "refiner returned malformed relationship list");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Relationship>(item) {
            Ok(rel) => Some(rel),
            Err(e) => {
                warn!(error = %e, "skipping relationship with unknown verb or missing field");
                None
            }
        })
        .collect()
}

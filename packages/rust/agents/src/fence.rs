//! Markdown fence cleanup for model responses.
//!
//! Models asked for strict JSON or Cypher still wrap output in code fences
//! often enough that every response is cleaned before parsing.

/// Strip a surrounding code fence (```json, ```cypher, or bare ```) from a
/// model response. Fence-free text passes through untouched.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();

    let mut lines: Vec<&str> = trimmed.lines().collect();

    if lines
        .first()
        .is_some_and(|l| l.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

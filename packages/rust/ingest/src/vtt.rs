//! WebVTT caption cleanup.
//!
//! Auto-generated caption tracks carry timing cues, positioning tags, and
//! rolling repeated lines. The cleanup strips everything that is not speech
//! and joins the remainder into one block of prose.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Inline cue tags like `<c>`, `<c.colorE5E5E5>`, `<00:00:01.120>`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Strip WebVTT formatting down to pure speech.
///
/// Drops headers, cue timing lines, and track metadata; removes inline tags;
/// deduplicates repeated caption lines (rolling captions re-emit the previous
/// line in each cue).
pub fn clean_vtt(raw: &str) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut cleaned: Vec<String> = Vec::new();

    for line in raw.lines() {
        if is_metadata_line(line) {
            continue;
        }

        let text = TAG_RE.replace_all(line, "");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if seen.insert(text.to_string()) {
            cleaned.push(text.to_string());
        }
    }

    cleaned.join(" ")
}

/// Headers, cue timings, and track metadata carry no speech.
fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with("WEBVTT")
        || trimmed.contains("-->")
        || trimmed.starts_with("Kind:")
        || trimmed.starts_with("Language:")
        || trimmed.starts_with("NOTE")
        || trimmed.starts_with("STYLE")
}

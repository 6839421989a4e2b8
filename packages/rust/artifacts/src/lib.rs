//! Rendered output artifacts: strategy briefs, implementation plans, and
//! the interactive graph dashboard.
//!
//! Everything here is pure string rendering; writing files is the caller's
//! job.

pub mod dashboard;

pub use dashboard::{GraphEdge, GraphNode, render_dashboard};

use profitgraph_shared::{StrategyBrief, VideoId};

/// Characters that are illegal or hostile in filenames.
const FILENAME_FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Render a strategy brief to markdown: the body plus a marketing section
/// when the Architect produced one.
pub fn render_brief(brief: &StrategyBrief) -> String {
    let mut out = brief.content.clone();

    if let Some(marketing) = &brief.marketing {
        if !marketing.viral_tweet.is_empty() || !marketing.linkedin.is_empty() {
            out.push_str("\n\n## Marketing Assets\n");
            out.push_str(&format!("**Viral Tweet:** {}\n\n", marketing.viral_tweet));
            out.push_str(&format!("**LinkedIn:**\n{}\n", marketing.linkedin));
        }
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Build the on-disk brief filename from the model's suggestion.
///
/// Suggestions are sanitized, forced to `.md`, and prefixed with the video
/// ID unless they already carry it (the fallback filename does).
pub fn brief_filename(video_id: &VideoId, suggested: &str) -> String {
    let cleaned: String = suggested
        .trim()
        .chars()
        .filter(|c| !FILENAME_FORBIDDEN.contains(c))
        .collect();

    let cleaned = if cleaned.is_empty() {
        "strategy.md".to_string()
    } else if cleaned.ends_with(".md") {
        cleaned
    } else {
        format!("{cleaned}.md")
    };

    if cleaned.starts_with(&format!("{video_id}_")) {
        cleaned
    } else {
        format!("{video_id}_{cleaned}")
    }
}

/// Render an implementation plan document for a topic.
pub fn render_plan(topic: &str, body: &str, tool_version: &str) -> String {
    format!(
        "# Profit Implementation Plan: {topic}\n\n{}\n\n---\nGenerated by ProfitGraph v{tool_version}\n",
        body.trim()
    )
}

/// Filename for a topic plan: `<topic>_plan.md` with the topic slugged.
pub fn plan_filename(topic: &str) -> String {
    let slug: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_plan.md", slug.trim_matches('_'))
}

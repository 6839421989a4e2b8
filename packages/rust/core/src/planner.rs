//! Implementation-plan generation for a graph topic.

use std::path::PathBuf;

use tracing::{info, instrument};

use profitgraph_agents::GeminiClient;
use profitgraph_graph::GraphClient;
use profitgraph_shared::{ProfitGraphError, Result};

/// Configuration for plan generation.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Topic node name to plan around (e.g. an entity name).
    pub topic: String,
    /// Root directory; the plan lands in `<root>/plans/`.
    pub output_root: PathBuf,
    /// Tool version for the artifact footer.
    pub tool_version: String,
}

/// Result of plan generation.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan_path: PathBuf,
    /// Graph context lines the plan was grounded on.
    pub context_lines: usize,
}

/// Generate an implementation plan for a topic from its graph neighborhood.
#[instrument(skip_all, fields(topic = %config.topic))]
pub async fn generate_plan(
    config: &PlanConfig,
    gemini: &GeminiClient,
    graph: &GraphClient,
) -> Result<PlanOutcome> {
    let context_lines = graph.topic_context(&config.topic).await?;
    let context = if context_lines.is_empty() {
        "No data found in Graph.".to_string()
    } else {
        context_lines.join("\n")
    };

    info!(lines = context_lines.len(), "graph context loaded");

    let response = gemini.generate(&plan_prompt(&config.topic, &context)).await?;
    let rendered =
        profitgraph_artifacts::render_plan(&config.topic, &response.text, &config.tool_version);

    let plans_dir = config.output_root.join("plans");
    std::fs::create_dir_all(&plans_dir).map_err(|e| ProfitGraphError::io(&plans_dir, e))?;

    let plan_path = plans_dir.join(profitgraph_artifacts::plan_filename(&config.topic));
    std::fs::write(&plan_path, rendered).map_err(|e| ProfitGraphError::io(&plan_path, e))?;

    info!(path = %plan_path.display(), "plan saved");

    Ok(PlanOutcome {
        plan_path,
        context_lines: context_lines.len(),
    })
}

/// Prompt for the plan generator.
fn plan_prompt(topic: &str, context: &str) -> String {
    format!(
        r#"Create a Profit Implementation Plan for {topic}.

GRAPH CONTEXT:
{context}

INSTRUCTIONS:
1. Verify tool claims based on the 'fact_check' status in context.
2. Highlight any discrepancies (e.g., if video said free but context says paid).
3. Outline the stack, the problem solved, and the service to sell."#
    )
}

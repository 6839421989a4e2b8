//! The Scout agent: execute the research plan against a live search model.

use tracing::{info, warn};

use profitgraph_shared::{ProfitGraphError, ResearchPlan, Result};

use crate::sonar::SonarClient;

/// Telemetry tag for this agent.
pub const PROMPT_VERSION: &str = "research_executor_v1";

/// The Scout's aggregated findings.
#[derive(Debug, Clone, Default)]
pub struct ScoutReport {
    /// `Q: ...\nA: ...` blocks separated by `---`.
    pub summary: String,
    pub queries_run: usize,
    pub queries_failed: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Run every research question; individual failures are logged and skipped.
///
/// An empty plan short-circuits to an empty report; a transcript without
/// research gaps is not an error.
pub async fn execute_plan(sonar: &SonarClient, plan: &ResearchPlan) -> Result<ScoutReport> {
    if plan.research_questions.is_empty() {
        return Ok(ScoutReport::default());
    }

    info!(queries = plan.research_questions.len(), "executing research plan");

    let mut report = ScoutReport::default();
    let mut findings: Vec<String> = Vec::new();

    for question in &plan.research_questions {
        match sonar.research(question).await {
            Ok(outcome) => {
                findings.push(format!("Q: {question}\nA: {}\n", outcome.text));
                report.queries_run += 1;
                report.tokens_in += outcome.tokens_in;
                report.tokens_out += outcome.tokens_out;
            }
            Err(e) => {
                warn!(question = %question, error = %e, "research query failed, skipping");
                report.queries_failed += 1;
            }
        }
    }

    if report.queries_run == 0 && report.queries_failed > 0 {
        return Err(ProfitGraphError::Agent(format!(
            "all {} research queries failed",
            report.queries_failed
        )));
    }

    report.summary = findings.join("\n---\n");
    Ok(report)
}

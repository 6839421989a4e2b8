//! Relationship refinement sweep over stored strategies.
//!
//! Pulls strategies that have not been refined yet, asks the Refiner agent
//! for typed relationships between the entities they mention, and applies
//! them to the graph. A strategy is only marked refined once relationships
//! were actually applied, so empty passes get retried on the next sweep.

use tracing::{info, instrument, warn};

use profitgraph_agents::{GeminiClient, refiner};
use profitgraph_graph::GraphClient;
use profitgraph_shared::Result;

use crate::pipeline::ProgressReporter;

/// Configuration for a refinement sweep.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Maximum strategies to refine in one sweep.
    pub limit: u32,
}

/// Result of a refinement sweep.
#[derive(Debug, Default)]
pub struct RefineOutcome {
    pub strategies_seen: usize,
    pub strategies_refined: usize,
    pub relationships_applied: usize,
}

/// Run one refinement sweep.
#[instrument(skip_all, fields(limit = config.limit))]
pub async fn refine_graph(
    config: &RefineConfig,
    gemini: &GeminiClient,
    graph: &GraphClient,
    progress: &dyn ProgressReporter,
) -> Result<RefineOutcome> {
    progress.phase("Scanning graph for unrefined strategies");
    let strategies = graph.unrefined_strategies(config.limit).await?;

    if strategies.is_empty() {
        info!("all strategies are already refined");
        return Ok(RefineOutcome::default());
    }

    let mut outcome = RefineOutcome {
        strategies_seen: strategies.len(),
        ..Default::default()
    };
    let total = strategies.len();

    for (i, strategy) in strategies.iter().enumerate() {
        progress.step(i + 1, total, &strategy.id);

        let prompt = refiner::prompt(&strategy.content);
        let relationships = match gemini.generate_json(&prompt).await {
            Ok(response) => refiner::parse_relationships(&response.text),
            Err(e) => {
                warn!(strategy = %strategy.id, error = %e, "refiner call failed, skipping strategy");
                continue;
            }
        };

        if relationships.is_empty() {
            info!(strategy = %strategy.id, "no relationships found");
            continue;
        }

        let applied = graph.apply_relationships(&relationships).await?;
        graph.mark_refined(&strategy.id).await?;

        outcome.strategies_refined += 1;
        outcome.relationships_applied += applied;
    }

    info!(
        seen = outcome.strategies_seen,
        refined = outcome.strategies_refined,
        relationships = outcome.relationships_applied,
        "refinement sweep complete"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use profitgraph_shared::GraphCredentials;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_graph(server: &MockServer) -> GraphClient {
        GraphClient::connect(&GraphCredentials {
            uri: server.uri(),
            user: "neo4j".into(),
            password: "secret".into(),
            database: "neo4j".into(),
        })
        .unwrap()
    }

    async fn mock_gemini(server: &MockServer) -> GeminiClient {
        GeminiClient::new("k", "gemini-2.0-flash-exp")
            .unwrap()
            .with_origin(&server.uri())
            .unwrap()
    }

    #[tokio::test]
    async fn empty_graph_short_circuits() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"columns": ["id", "text"], "data": []}],
                "errors": []
            })))
            .mount(&server)
            .await;

        let outcome = refine_graph(
            &RefineConfig { limit: 5 },
            &mock_gemini(&server).await,
            &mock_graph(&server).await,
            &SilentProgress,
        )
        .await
        .expect("sweep");

        assert_eq!(outcome.strategies_seen, 0);
        assert_eq!(outcome.strategies_refined, 0);
    }

    #[tokio::test]
    async fn sweep_applies_and_marks() {
        let server = MockServer::start().await;

        // Unrefined strategy query
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(body_string_contains("REFINED_BY"))
            .and(body_string_contains("LIMIT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "columns": ["id", "text"],
                    "data": [{"row": ["abc_strat", "Cursor uses Claude 3.5"]}]
                }],
                "errors": []
            })))
            .mount(&server)
            .await;

        // Relationship application + mark_refined
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(body_string_contains("INTEGRATES_WITH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"columns": [], "data": []}],
                "errors": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(body_string_contains("refined_at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"columns": [], "data": []}],
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Refiner response
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text":
                    "[{\"source\": \"Cursor\", \"target\": \"Claude 3.5\", \"rel\": \"INTEGRATES_WITH\"}]"
                }]}}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 20}
            })))
            .mount(&server)
            .await;

        let outcome = refine_graph(
            &RefineConfig { limit: 5 },
            &mock_gemini(&server).await,
            &mock_graph(&server).await,
            &SilentProgress,
        )
        .await
        .expect("sweep");

        assert_eq!(outcome.strategies_seen, 1);
        assert_eq!(outcome.strategies_refined, 1);
        assert_eq!(outcome.relationships_applied, 1);
    }

    #[tokio::test]
    async fn strategy_without_relationships_stays_unrefined() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "columns": ["id", "text"],
                    "data": [{"row": ["abc_strat", "nothing relates here"]}]
                }],
                "errors": []
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "[]"}]}}]
            })))
            .mount(&server)
            .await;

        let outcome = refine_graph(
            &RefineConfig { limit: 5 },
            &mock_gemini(&server).await,
            &mock_graph(&server).await,
            &SilentProgress,
        )
        .await
        .expect("sweep");

        assert_eq!(outcome.strategies_seen, 1);
        assert_eq!(outcome.strategies_refined, 0);
        assert_eq!(outcome.relationships_applied, 0);
    }
}

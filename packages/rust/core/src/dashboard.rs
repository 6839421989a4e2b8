//! Dashboard export: graph snapshot → self-contained HTML.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use profitgraph_artifacts::{GraphEdge, GraphNode, render_dashboard};
use profitgraph_graph::GraphClient;
use profitgraph_shared::{ProfitGraphError, Result};

/// Result of a dashboard export.
#[derive(Debug)]
pub struct DashboardOutcome {
    pub path: PathBuf,
    pub nodes: usize,
    pub edges: usize,
}

/// Export the whole graph as an interactive HTML page.
#[instrument(skip_all, fields(out = %out_path.display()))]
pub async fn build_dashboard(graph: &GraphClient, out_path: &Path) -> Result<DashboardOutcome> {
    let (snapshot_nodes, snapshot_edges) = graph.snapshot().await?;

    let nodes: Vec<GraphNode> = snapshot_nodes
        .iter()
        .map(|n| {
            GraphNode::from_parts(
                n.id,
                &n.labels,
                n.name.as_deref(),
                n.detail.as_deref(),
                n.content.as_deref(),
            )
        })
        .collect();

    let edges: Vec<GraphEdge> = snapshot_edges
        .iter()
        .map(|e| GraphEdge {
            from: e.from,
            to: e.to,
        })
        .collect();

    let html = render_dashboard(&nodes, &edges)?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProfitGraphError::io(parent, e))?;
    }
    std::fs::write(out_path, html).map_err(|e| ProfitGraphError::io(out_path, e))?;

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        "dashboard exported"
    );

    Ok(DashboardOutcome {
        path: out_path.to_path_buf(),
        nodes: nodes.len(),
        edges: edges.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use profitgraph_shared::GraphCredentials;
    use uuid::Uuid;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn export_writes_html_with_graph_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {
                        "columns": ["id", "labels", "name", "detail", "content"],
                        "data": [
                            {"row": [0, ["Strategy"], null, null, "# Brief"]},
                            {"row": [1, ["Entity"], "Supabase", "Database", null]}
                        ]
                    },
                    {"columns": ["from", "to"], "data": [{"row": [0, 1]}]}
                ],
                "errors": []
            })))
            .mount(&server)
            .await;

        let graph = GraphClient::connect(&GraphCredentials {
            uri: server.uri(),
            user: "neo4j".into(),
            password: "secret".into(),
            database: "neo4j".into(),
        })
        .unwrap();

        let dir = std::env::temp_dir().join(format!("pg-dash-test-{}", Uuid::now_v7()));
        let out_path = dir.join("dashboard").join("profitgraph.html");

        let outcome = build_dashboard(&graph, &out_path).await.expect("export");
        assert_eq!(outcome.nodes, 2);
        assert_eq!(outcome.edges, 1);

        let html = std::fs::read_to_string(&out_path).unwrap();
        assert!(html.contains("Supabase"));
        assert!(html.contains("Strategy Node"));
        assert!(html.contains("vis.DataSet"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

//! Read paths over the knowledge graph.

use serde_json::Value;
use tracing::instrument;

use profitgraph_shared::Result;

use crate::client::{GraphClient, Statement, StatementResult, value_text};

/// A strategy row returned by [`GraphClient::unrefined_strategies`].
#[derive(Debug, Clone)]
pub struct StrategyRow {
    pub id: String,
    pub content: String,
}

/// A node in the full-graph snapshot used by the dashboard export.
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    pub id: i64,
    pub labels: Vec<String>,
    pub name: Option<String>,
    pub detail: Option<String>,
    pub content: Option<String>,
}

/// A directed edge in the full-graph snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotEdge {
    pub from: i64,
    pub to: i64,
}

impl GraphClient {
    /// Strategies that have not been through a refinement pass yet.
    pub async fn unrefined_strategies(&self, limit: u32) -> Result<Vec<StrategyRow>> {
        let statement = Statement::new(
            r#"MATCH (s:Strategy)
WHERE NOT (s)-[:REFINED_BY]->(:RefinerLog)
RETURN s.id AS id, s.content AS text
LIMIT $limit"#,
        )
        .param("limit", limit);

        let result = self.run_single(statement).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| StrategyRow {
                id: row.first().map(value_text).unwrap_or_default(),
                content: row.get(1).map(value_text).unwrap_or_default(),
            })
            .collect())
    }

    /// One-hop neighborhood of a named node, rendered as prompt-ready lines:
    /// `Name (fact_check) --[REL]--> Other (Desc: ...)`.
    #[instrument(skip_all, fields(topic = %topic))]
    pub async fn topic_context(&self, topic: &str) -> Result<Vec<String>> {
        let statement = Statement::new(
            r#"MATCH (n {name: $topic})-[r]-(connected)
RETURN n.name AS name,
       coalesce(n.fact_check, 'Unverified') AS status,
       type(r) AS rel,
       connected.name AS other,
       coalesce(connected.verified_desc, connected.video_desc, connected.detail, '') AS desc
LIMIT 20"#,
        )
        .param("topic", topic);

        let result = self.run_single(statement).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                let get = |i: usize| row.get(i).map(value_text).unwrap_or_default();
                format!(
                    "{} ({}) --[{}]--> {} (Desc: {})",
                    get(0),
                    get(1),
                    get(2),
                    get(3),
                    get(4)
                )
            })
            .collect())
    }

    /// Labels, relationship types, and sample strategy properties, used as
    /// context for Cypher-generating prompts.
    pub async fn schema_summary(&self) -> Result<String> {
        let statements = vec![
            Statement::new("CALL db.labels() YIELD label RETURN collect(label) AS labels"),
            Statement::new(
                "CALL db.relationshipTypes() YIELD relationshipType RETURN collect(relationshipType) AS rels",
            ),
            Statement::new("MATCH (s:Strategy) RETURN keys(s) AS props LIMIT 1"),
        ];

        let results = self.run(&statements).await?;
        let first_cell = |r: Option<&StatementResult>| -> String {
            r.and_then(|r| r.rows.first())
                .and_then(|row| row.first())
                .map(|v| v.to_string())
                .unwrap_or_else(|| "[]".into())
        };

        let mut summary = format!(
            "Nodes: {}\nRelationships: {}",
            first_cell(results.first()),
            first_cell(results.get(1))
        );

        if let Some(props) = results.get(2).and_then(|r| r.rows.first()) {
            if let Some(keys) = props.first() {
                summary.push_str(&format!("\nStrategy Properties: {keys}"));
            }
        }

        Ok(summary)
    }

    /// Execute a read statement produced elsewhere (the oracle's generated
    /// Cypher). Returns raw rows for synthesis.
    pub async fn run_read(&self, cypher: &str) -> Result<StatementResult> {
        self.run_single(Statement::new(cypher)).await
    }

    /// Everything in the graph, for the dashboard export.
    pub async fn snapshot(&self) -> Result<(Vec<SnapshotNode>, Vec<SnapshotEdge>)> {
        let statements = vec![
            Statement::new(
                r#"MATCH (n)
RETURN id(n) AS id, labels(n) AS labels, n.name AS name,
       n.detail AS detail, n.content AS content"#,
            ),
            Statement::new("MATCH (n)-[r]->(m) RETURN id(n) AS from, id(m) AS to"),
        ];

        let mut results = self.run(&statements).await?;
        if results.len() < 2 {
            return Ok((Vec::new(), Vec::new()));
        }
        let edge_result = results.pop().unwrap_or_default();
        let node_result = results.pop().unwrap_or_default();

        let nodes = node_result
            .rows
            .iter()
            .map(|row| SnapshotNode {
                id: row.first().and_then(Value::as_i64).unwrap_or_default(),
                labels: row
                    .get(1)
                    .and_then(Value::as_array)
                    .map(|labels| labels.iter().map(value_text).collect())
                    .unwrap_or_default(),
                name: non_null(row.get(2)),
                detail: non_null(row.get(3)),
                content: non_null(row.get(4)),
            })
            .collect();

        let edges = edge_result
            .rows
            .iter()
            .map(|row| SnapshotEdge {
                from: row.first().and_then(Value::as_i64).unwrap_or_default(),
                to: row.get(1).and_then(Value::as_i64).unwrap_or_default(),
            })
            .collect();

        Ok((nodes, edges))
    }

    /// Video-to-strategy previews, the quick "is anything in there" check.
    pub async fn strategy_overview(&self, limit: u32) -> Result<Vec<(String, String)>> {
        let statement = Statement::new(
            r#"MATCH (v:Video)-->(s:Strategy)
RETURN v.id AS video, substring(s.content, 0, 50) AS preview
LIMIT $limit"#,
        )
        .param("limit", limit);

        let result = self.run_single(statement).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                (
                    row.first().map(value_text).unwrap_or_default(),
                    row.get(1).map(value_text).unwrap_or_default(),
                )
            })
            .collect())
    }
}

fn non_null(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_text(v)),
    }
}

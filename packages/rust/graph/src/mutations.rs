//! Write paths into the knowledge graph.

use serde_json::json;
use tracing::{info, instrument};

use profitgraph_shared::{Entity, Relationship, Result, VideoId};

use crate::client::{GraphClient, Statement};

impl GraphClient {
    /// Merge the `(:Video)-[:YIELDS_STRATEGY]->(:Strategy)-[:BASED_ON_RESEARCH]->(:Research)`
    /// triple for a processed video and refresh its `last_processed` stamp.
    #[instrument(skip_all, fields(video_id = %video_id))]
    pub async fn sync_strategy(
        &self,
        video_id: &VideoId,
        strategy: &str,
        research: &str,
    ) -> Result<()> {
        let statement = Statement::new(
            r#"MERGE (v:Video {id: $vid})
SET v.last_processed = datetime()
MERGE (s:Strategy {id: $vid + "_strat"})
SET s.content = $strategy
MERGE (r:Research {id: $vid + "_res"})
SET r.content = $research
MERGE (v)-[:YIELDS_STRATEGY]->(s)
MERGE (s)-[:BASED_ON_RESEARCH]->(r)"#,
        )
        .param("vid", video_id.as_str())
        .param("strategy", strategy)
        .param("research", research);

        self.run_single(statement).await?;
        info!("strategy synced to graph");
        Ok(())
    }

    /// Merge entity nodes and their `MENTIONS` edges from a video's strategy.
    ///
    /// Entities without a name or kind are filtered out before the batch.
    /// Returns the number of entities synced.
    #[instrument(skip_all, fields(video_id = %video_id, entities = entities.len()))]
    pub async fn sync_entities(&self, video_id: &VideoId, entities: &[Entity]) -> Result<usize> {
        let batch: Vec<serde_json::Value> = entities
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| json!({"name": e.name, "type": e.kind, "detail": e.detail}))
            .collect();

        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();

        let statement = Statement::new(
            r#"MATCH (s:Strategy {id: $vid + "_strat"})
UNWIND $batch AS item
MERGE (e:Entity {name: item.name})
SET e.type = item.type
MERGE (s)-[:MENTIONS {detail: item.detail}]->(e)"#,
        )
        .param("vid", video_id.as_str())
        .param("batch", batch);

        self.run_single(statement).await?;
        info!(count, "entities synced to graph");
        Ok(count)
    }

    /// Merge typed relationship edges between entities.
    ///
    /// The relationship type is interpolated from the [`RelKind`] enum, which
    /// is the whitelist that makes the interpolation safe.
    ///
    /// [`RelKind`]: profitgraph_shared::RelKind
    #[instrument(skip_all, fields(relationships = relationships.len()))]
    pub async fn apply_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        if relationships.is_empty() {
            return Ok(0);
        }

        let statements: Vec<Statement> = relationships
            .iter()
            .map(|rel| {
                Statement::new(format!(
                    r#"MERGE (a:Entity {{name: $source}})
MERGE (b:Entity {{name: $target}})
MERGE (a)-[:{}]->(b)"#,
                    rel.rel.as_str()
                ))
                .param("source", rel.source.as_str())
                .param("target", rel.target.as_str())
            })
            .collect();

        self.run(&statements).await?;
        info!(count = statements.len(), "relationships applied");
        Ok(statements.len())
    }

    /// Mark a strategy as refined so the next sweep skips it.
    pub async fn mark_refined(&self, strategy_id: &str) -> Result<()> {
        let statement = Statement::new(
            r#"MATCH (s:Strategy {id: $sid})
MERGE (l:RefinerLog {id: $sid + "_refined"})
SET l.refined_at = datetime()
MERGE (s)-[:REFINED_BY]->(l)"#,
        )
        .param("sid", strategy_id);

        self.run_single(statement).await?;
        Ok(())
    }

    /// Apply the uniqueness constraint and lookup indexes the ingest path
    /// relies on. Idempotent.
    pub async fn apply_constraints(&self) -> Result<()> {
        let statements = vec![
            // Prevents duplicate entity nodes when processing multiple videos
            Statement::new(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:Entity) REQUIRE n.name IS UNIQUE",
            ),
            Statement::new("CREATE INDEX IF NOT EXISTS FOR (t:Tool) ON (t.name)"),
            Statement::new("CREATE INDEX IF NOT EXISTS FOR (r:Risk) ON (r.name)"),
        ];

        self.run(&statements).await?;
        info!("graph constraints active");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profitgraph_shared::{GraphCredentials, RelKind};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_client(server: &MockServer) -> GraphClient {
        GraphClient::connect(&GraphCredentials {
            uri: server.uri(),
            user: "neo4j".into(),
            password: "secret".into(),
            database: "neo4j".into(),
        })
        .unwrap()
    }

    fn empty_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"columns": [], "data": []}],
            "errors": []
        }))
    }

    #[tokio::test]
    async fn sync_strategy_sends_merge_triple() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(body_string_contains("YIELDS_STRATEGY"))
            .and(body_string_contains("BASED_ON_RESEARCH"))
            .and(body_string_contains("dQw4w9WgXcQ"))
            .respond_with(empty_ok())
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();
        client
            .sync_strategy(&vid, "# Brief", "Q: cost?\nA: high")
            .await
            .expect("sync");
    }

    #[tokio::test]
    async fn sync_entities_filters_invalid_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("UNWIND"))
            .and(body_string_contains("Supabase"))
            .respond_with(empty_ok())
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let entities = vec![
            Entity {
                kind: "Tool".into(),
                name: "Supabase".into(),
                detail: "Database".into(),
            },
            Entity {
                kind: "".into(),
                name: "nameless kind".into(),
                detail: "".into(),
            },
        ];

        let count = client.sync_entities(&vid, &entities).await.expect("sync");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn sync_entities_empty_batch_skips_network() {
        // No mock mounted: any request would fail the test.
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();

        let count = client.sync_entities(&vid, &[]).await.expect("sync");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn apply_relationships_uses_typed_verbs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("[:INTEGRATES_WITH]"))
            .and(body_string_contains("[:MITIGATES]"))
            .respond_with(empty_ok())
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let rels = vec![
            Relationship {
                source: "Cursor".into(),
                target: "Claude 3.5".into(),
                rel: RelKind::IntegratesWith,
            },
            Relationship {
                source: "Cache".into(),
                target: "Latency".into(),
                rel: RelKind::Mitigates,
            },
        ];

        let count = client.apply_relationships(&rels).await.expect("apply");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn apply_constraints_sends_all_three() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("IS UNIQUE"))
            .and(body_string_contains("Tool"))
            .and(body_string_contains("Risk"))
            .respond_with(empty_ok())
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        client.apply_constraints().await.expect("constraints");
    }
}

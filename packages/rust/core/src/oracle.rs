//! The graph oracle: natural-language questions answered from the graph.
//!
//! Per question: generate a read-only Cypher statement from the schema
//! summary, execute it, then synthesize a human answer from the raw rows.

use tracing::{debug, info, instrument};

use profitgraph_agents::{GeminiClient, fence::strip_fences, truncate_chars};
use profitgraph_graph::GraphClient;
use profitgraph_shared::Result;

/// Character budget for raw rows in the synthesis prompt.
const DATA_BUDGET: usize = 10_000;

/// A synthesized answer with its generated query.
#[derive(Debug, Clone)]
pub struct OracleAnswer {
    pub cypher: String,
    pub answer: String,
    pub rows: usize,
}

/// Connected oracle session. The schema summary is fetched once at connect
/// and reused for every question.
pub struct Oracle {
    gemini: GeminiClient,
    graph: GraphClient,
    schema: String,
}

impl Oracle {
    /// Connect to the graph and capture its schema for Cypher generation.
    pub async fn connect(gemini: GeminiClient, graph: GraphClient) -> Result<Self> {
        let schema = graph.schema_summary().await?;
        info!("oracle connected");
        debug!(%schema, "graph schema loaded");

        Ok(Self {
            gemini,
            graph,
            schema,
        })
    }

    /// The schema summary used in the Cypher-generation prompt.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Answer a question: question → Cypher → rows → synthesis.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn answer(&self, question: &str) -> Result<OracleAnswer> {
        let cypher_response = self
            .gemini
            .generate(&cypher_prompt(&self.schema, question))
            .await?;
        let cypher = strip_fences(&cypher_response.text);
        debug!(%cypher, "generated query");

        let result = self.graph.run_read(&cypher).await?;
        let rows = result.rows.len();

        let data = serde_json::to_string(&result.rows_as_objects())
            .unwrap_or_else(|_| "[]".to_string());
        let data = truncate_chars(&data, DATA_BUDGET);

        let synthesis = self
            .gemini
            .generate(&synthesis_prompt(question, &data))
            .await?;

        Ok(OracleAnswer {
            cypher,
            answer: synthesis.text,
            rows,
        })
    }
}

/// Prompt for turning a question into a read-only Cypher statement.
fn cypher_prompt(schema: &str, question: &str) -> String {
    format!(
        r#"You are a Neo4j Cypher Expert.
Convert this question into a READ-ONLY Cypher query.

Schema:
{schema}

CRITICAL: The :Video nodes ONLY have an 'id' (e.g., 'S2MP49...'). They do NOT have titles.
To find a specific topic (like 'Rocket AI' or 'Pricing'), you must use CONTAINS on the Strategy content.

Correct Pattern Example:
MATCH (v:Video)-[:YIELDS_STRATEGY]->(s:Strategy)
WHERE toLower(s.content) CONTAINS toLower('Rocket AI')
RETURN s.content LIMIT 1

Question: "{question}"

Output ONLY the Cypher code. No markdown."#
    )
}

/// Prompt for synthesizing a human answer from raw rows.
fn synthesis_prompt(question: &str, data: &str) -> String {
    format!(
        r#"You are a Business Intelligence Analyst.

User Question: "{question}"

Database Data:
{data}

Task:
Synthesize a direct, insight-rich answer based ONLY on the data above.
If the data is empty, say "I couldn't find relevant data in the graph.""#
    )
}

//! HTTP transaction API client for Neo4j.
//!
//! Statements are posted to `/db/<database>/tx/commit` as a single implicit
//! transaction; server-reported errors in the response envelope surface as
//! [`ProfitGraphError::Graph`].

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use profitgraph_shared::{GraphCredentials, ProfitGraphError, Result};

/// A single Cypher statement with parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    #[serde(rename = "statement")]
    pub text: String,
    pub parameters: serde_json::Map<String, Value>,
}

impl Statement {
    /// A statement with no parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: serde_json::Map::new(),
        }
    }

    /// Attach a named parameter.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// Result rows for one executed statement.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl StatementResult {
    /// Rows as column-keyed JSON objects (for prompt context and display).
    pub fn rows_as_objects(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection handle for the knowledge graph.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: Client,
    endpoint: Url,
    user: String,
    password: String,
    database: String,
}

impl GraphClient {
    /// Connect with resolved credentials. The endpoint must be the server's
    /// HTTP(S) origin, not a bolt:// URI.
    pub fn connect(creds: &GraphCredentials) -> Result<Self> {
        let endpoint = Url::parse(&creds.uri).map_err(|e| {
            ProfitGraphError::config(format!("invalid graph endpoint '{}': {e}", creds.uri))
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ProfitGraphError::config(format!(
                "graph endpoint must be an http(s) URL for the HTTP transaction API, got '{}'",
                creds.uri
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProfitGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            user: creds.user.clone(),
            password: creds.password.clone(),
            database: creds.database.clone(),
        })
    }

    /// Cheap connectivity probe.
    pub async fn verify_connectivity(&self) -> Result<()> {
        self.run_single(Statement::new("RETURN 1")).await.map(|_| ())
    }

    /// Execute statements in one implicit transaction.
    pub async fn run(&self, statements: &[Statement]) -> Result<Vec<StatementResult>> {
        let mut url = self.endpoint.clone();
        url.set_path(&format!("/db/{}/tx/commit", self.database));

        let response = self
            .client
            .post(url.as_str())
            .basic_auth(&self.user, Some(&self.password))
            .json(&TxRequest { statements })
            .send()
            .await
            .map_err(|e| ProfitGraphError::Network(format!("graph: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfitGraphError::Graph(format!(
                "graph server returned HTTP {status}"
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| ProfitGraphError::Graph(format!("response parse: {e}")))?;

        if let Some(err) = parsed.errors.first() {
            return Err(ProfitGraphError::Graph(format!(
                "{}: {}",
                err.code, err.message
            )));
        }

        Ok(parsed
            .results
            .into_iter()
            .map(|r| StatementResult {
                columns: r.columns,
                rows: r.data.into_iter().map(|d| d.row).collect(),
            })
            .collect())
    }

    /// Execute a single statement and return its result.
    pub async fn run_single(&self, statement: Statement) -> Result<StatementResult> {
        let mut results = self.run(std::slice::from_ref(&statement)).await?;
        if results.is_empty() {
            return Err(ProfitGraphError::Graph(
                "server returned no result for statement".into(),
            ));
        }
        Ok(results.remove(0))
    }
}

/// Render a result cell as display text (strings unquoted, rest as JSON).
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

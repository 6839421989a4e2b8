//! Perplexity Sonar client (chat completions over HTTP).

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use profitgraph_shared::{ProfitGraphError, Result};

use crate::AgentOutcome;

/// Default API origin.
const API_ORIGIN: &str = "https://api.perplexity.ai";

/// System prompt for every research query.
const RESEARCHER_SYSTEM_PROMPT: &str = "You are a concise technical researcher.";

/// Client for Sonar research queries.
#[derive(Debug, Clone)]
pub struct SonarClient {
    client: Client,
    origin: Url,
    api_key: String,
    model: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl SonarClient {
    /// Create a client for the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProfitGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            origin: Url::parse(API_ORIGIN).expect("static origin parses"),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Point the client at a different API origin (for mock-server tests).
    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = Url::parse(origin)
            .map_err(|e| ProfitGraphError::config(format!("invalid API origin: {e}")))?;
        Ok(self)
    }

    /// Run a single research question.
    pub async fn research(&self, question: &str) -> Result<AgentOutcome> {
        let mut url = self.origin.clone();
        url.set_path("/chat/completions");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: RESEARCHER_SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: question,
                },
            ],
        };

        let start = Instant::now();
        let response = self
            .client
            .post(url.as_str())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProfitGraphError::Network(format!("sonar: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfitGraphError::Agent(format!(
                "sonar returned HTTP {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProfitGraphError::Agent(format!("sonar response parse: {e}")))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProfitGraphError::Agent("sonar returned no choices".into()))?;

        let usage = parsed.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(AgentOutcome {
            text,
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

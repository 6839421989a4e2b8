//! Gemini API client (`generateContent` over HTTP).

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use profitgraph_shared::{ProfitGraphError, Result};

use crate::AgentOutcome;

/// Default API origin.
const API_ORIGIN: &str = "https://generativelanguage.googleapis.com";

/// Client for Gemini text generation.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    origin: Url,
    api_key: String,
    model: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_tokens: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidate_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl GeminiClient {
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

    /// The model this client targets.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Point the client at a different API origin (for mock-server tests).
    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = Url::parse(origin)
            .map_err(|e| ProfitGraphError::config(format!("invalid API origin: {e}")))?;
        Ok(self)
    }

    /// Generate free-form text.
    pub async fn generate(&self, prompt: &str) -> Result<AgentOutcome> {
        self.request(prompt, None).await
    }

    /// Generate with the response constrained to JSON.
    pub async fn generate_json(&self, prompt: &str) -> Result<AgentOutcome> {
        self.request(
            prompt,
            Some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        )
        .await
    }

    async fn request(
        &self,
        prompt: &str,
        generation_config: Option<GenerationConfig>,
    ) -> Result<AgentOutcome> {
        let mut url = self.origin.clone();
        url.set_path(&format!("/v1beta/models/{}:generateContent", self.model));

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(url.as_str())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProfitGraphError::Network(format!("gemini: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProfitGraphError::Agent(format!(
                "gemini returned HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProfitGraphError::Agent(format!("gemini response parse: {e}")))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProfitGraphError::Agent("gemini returned no candidates".into()))?;

        let usage = parsed.usage.unwrap_or(UsageMetadata {
            prompt_tokens: 0,
            candidate_tokens: 0,
        });

        Ok(AgentOutcome {
            text,
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.candidate_tokens,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

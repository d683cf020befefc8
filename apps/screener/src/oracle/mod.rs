//! Oracle client: the single point of entry for text-generation calls in the screener.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All oracle interactions MUST go through `OracleClient`.
//!
//! This layer never retries. Retry policy belongs to the batch pipeline.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

use crate::oracle::prompts::{build_screening_prompt, SCREENING_SYSTEM};

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all screening calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Oracle returned empty content")]
    EmptyContent,
}

impl OracleError {
    /// Transport failures, rate limits and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Http(_) => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::EmptyContent => false,
        }
    }
}

/// Turns resume text plus a job description into the labelled free-text response.
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn query(&self, resume_text: &str, job_description: &str)
        -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OracleResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl OracleResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API backed oracle.
#[derive(Clone)]
pub struct AnthropicOracle {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicOracle {
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), MESSAGES_PATH),
        }
    }
}

#[async_trait]
impl OracleClient for AnthropicOracle {
    async fn query(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<String, OracleError> {
        let prompt = build_screening_prompt(resume_text, job_description);
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: SCREENING_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let oracle_response: OracleResponse = response.json().await?;

        debug!(
            "Oracle call succeeded: input_tokens={}, output_tokens={}",
            oracle_response.usage.input_tokens, oracle_response.usage.output_tokens
        );

        oracle_response
            .text()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .ok_or(OracleError::EmptyContent)
    }
}

//! Generation Collaborator Interface
//!
//! Boundary to the external AI generation service. The runner invokes it with a
//! bounded timeout and classifies every outcome into one of two buckets: errors
//! worth retrying, and responses that arrived but are unusable as-is. The second
//! bucket never consumes a retry attempt; the caller substitutes a fallback asset
//! and completes the task.

use crate::config::GeneratorConfig;
use crate::error::SpoolError;
use crate::types::TaskKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Outcome classification for one generation call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    /// The collaborator could not service the request at all (network failure,
    /// timeout, rate limit, non-2xx status, undecodable body). Worth retrying.
    #[error("transient generator failure: {message}")]
    Transient { message: String },

    /// The collaborator answered but a required field is missing or empty.
    /// `partial` carries the decoded body so salvageable fields survive into
    /// the fallback asset.
    #[error("malformed generator output: {message}")]
    Malformed {
        message: String,
        partial: Option<Value>,
    },
}

/// A finished asset as returned by the generation service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeneratedAsset {
    pub content: String,
    pub media_url: Option<String>,
    pub model: String,
}

/// Client trait for the generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate one asset for a task payload.
    async fn generate(&self, kind: TaskKind, payload: &Value)
        -> Result<GeneratedAsset, GenerateError>;

    /// Model identifier sent with each request, for logging.
    fn model_name(&self) -> &str;
}

/// Substitute asset used when the collaborator's output is malformed.
///
/// Keeps whatever usable fields the partial body carried (a media URL, the
/// reporting model name) and fills the content with a placeholder naming the
/// task kind, so the rendered output is visibly incomplete rather than broken.
pub fn fallback_asset(kind: TaskKind, partial: Option<&Value>) -> GeneratedAsset {
    let media_url = partial
        .and_then(|body| body.get("media_url"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let model = partial
        .and_then(|body| body.get("model"))
        .and_then(Value::as_str)
        .unwrap_or("fallback")
        .to_string();

    GeneratedAsset {
        content: format!("Placeholder {} pending regeneration.", kind),
        media_url,
        model,
    }
}

#[derive(Serialize)]
struct GenerateHttpRequest<'a> {
    model: &'a str,
    kind: &'a str,
    payload: &'a Value,
}

/// HTTP client for the generation service.
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpGenerator {
    /// Build a client from generator settings plus the per-call budget from the
    /// execution settings. The budget lives on the HTTP client so a hung call
    /// errors out instead of outliving the execution window.
    pub fn new(config: &GeneratorConfig, request_timeout: Duration) -> Result<Self, SpoolError> {
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(request_timeout)
            .build()
            .map_err(|e| SpoolError::ConfigError(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        kind: TaskKind,
        payload: &Value,
    ) -> Result<GeneratedAsset, GenerateError> {
        let request = GenerateHttpRequest {
            model: &self.model,
            kind: kind.as_str(),
            payload,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(match status.as_u16() {
                429 => GenerateError::Transient {
                    message: format!("rate limit exceeded: {}", body),
                },
                _ => GenerateError::Transient {
                    message: format!("request failed with status {}: {}", status, body),
                },
            });
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Err(GenerateError::Transient {
                    message: format!("undecodable generator response: {}", e),
                })
            }
        };

        validate_body(kind, body, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// Transport-level failures are all retryable; the variants only shape the
// message seen by operators in `last_error`.
fn map_transport_error(error: reqwest::Error) -> GenerateError {
    let message = if error.is_timeout() {
        format!("request timeout: {}", error)
    } else if error.is_connect() {
        format!("connection error: {}", error)
    } else {
        format!("http error: {}", error)
    };
    GenerateError::Transient { message }
}

/// Check a decoded response body against what the task kind requires.
///
/// Every kind needs non-empty `content`; video tasks additionally need a
/// `media_url`. Shortfalls are malformed output, not failures: the body is
/// handed back so the fallback can salvage what did arrive.
fn validate_body(
    kind: TaskKind,
    body: Value,
    default_model: &str,
) -> Result<GeneratedAsset, GenerateError> {
    let content = body
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if content.is_empty() {
        return Err(GenerateError::Malformed {
            message: "response is missing usable content".to_string(),
            partial: Some(body),
        });
    }

    let media_url = body
        .get("media_url")
        .and_then(Value::as_str)
        .map(str::to_string);
    if kind == TaskKind::Video && media_url.is_none() {
        return Err(GenerateError::Malformed {
            message: "video response is missing a media URL".to_string(),
            partial: Some(body),
        });
    }

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(default_model)
        .to_string();

    Ok(GeneratedAsset {
        content,
        media_url,
        model,
    })
}

//! Google Gemini REST backend (`generateContent`).
//!
//! PDFs are attached inline as base64 `inline_data` parts, so no separate
//! upload round-trip is needed.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::{LlmBackend, LlmError, parse_retry_after, transport_error};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a proxy or self-hosted gateway instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn build_parts(prompt: &str, files: &[PathBuf]) -> Result<Vec<Value>, LlmError> {
        let mut parts = Vec::with_capacity(files.len() + 1);
        for file in files {
            let bytes = tokio::fs::read(file)
                .await
                .map_err(|e| LlmError::Other(format!("failed to read {}: {}", file.display(), e)))?;
            parts.push(json!({
                "inline_data": {
                    "mime_type": "application/pdf",
                    "data": BASE64.encode(&bytes),
                }
            }));
        }
        parts.push(json!({ "text": prompt }));
        Ok(parts)
    }
}

impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        files: &'a [PathBuf],
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let parts = Self::build_parts(prompt, files).await?;
            let url = format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            );

            let resp = client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&json!({ "contents": [{ "parts": parts }] }))
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| transport_error(e, timeout))?;

            let status = resp.status();
            if status.as_u16() == 429 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                return Err(LlmError::RateLimited { retry_after });
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LlmError::Auth(format!("HTTP {}", status)));
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(LlmError::Http(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }

            let data: Value = resp
                .json()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;
            extract_text(&data)
        })
    }
}

/// Pull the generated text out of a `generateContent` response.
fn extract_text(data: &Value) -> Result<String, LlmError> {
    if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
        return Err(LlmError::ContentBlocked(reason.to_string()));
    }

    let candidate = &data["candidates"][0];
    if candidate["finishReason"].as_str() == Some("SAFETY") {
        return Err(LlmError::ContentBlocked("finishReason=SAFETY".to_string()));
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyReply);
    }
    Ok(text)
}

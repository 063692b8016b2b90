//! OpenAI-compatible chat-completions backend.
//!
//! Works against any endpoint speaking the `/chat/completions` shape
//! (OpenAI, OpenRouter, local gateways) via a configurable base URL. The
//! chat API takes no file attachments, so PDFs are flattened to text with
//! `litreview-pdf` and appended to the prompt as fenced document blocks.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Value, json};

use crate::{LlmBackend, LlmError, parse_retry_after, transport_error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Use an OpenAI-compatible gateway (e.g., OpenRouter) instead.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Flatten attached PDFs into fenced text blocks appended to the prompt.
async fn build_user_message(prompt: &str, files: &[PathBuf]) -> Result<String, LlmError> {
    let mut message = String::from(prompt);
    for file in files {
        let path = file.clone();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        // pdf-extract is CPU-bound; keep it off the async workers.
        let text = tokio::task::spawn_blocking(move || litreview_pdf::extract_text(&path))
            .await
            .map_err(|e| LlmError::Other(format!("extraction task error: {}", e)))?
            .map_err(|e| LlmError::Other(e.to_string()))?;
        message.push_str(&format!("\n\n--- Document: {} ---\n{}", name, text));
    }
    Ok(message)
}

impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        files: &'a [PathBuf],
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            // Extraction honors the same timeout as the network call; a PDF
            // that cannot be flattened in time fails this document only.
            let content = tokio::time::timeout(timeout, build_user_message(prompt, files))
                .await
                .map_err(|_| LlmError::Timeout(timeout))??;
            let url = format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            );

            let resp = client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": content }],
                }))
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

/// Pull the completion text out of a chat-completions response.
fn extract_text(data: &Value) -> Result<String, LlmError> {
    let choice = &data["choices"][0];
    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(LlmError::ContentBlocked(
            "finish_reason=content_filter".to_string(),
        ));
    }

    let text = choice["message"]["content"].as_str().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(LlmError::EmptyReply);
    }
    Ok(text.to_string())
}

use std::sync::Arc;

use anyhow::{Context, bail};

use litreview_core::config_file::ConfigFile;
use litreview_llm::{GeminiBackend, LlmBackend, OpenAiBackend};

/// Build the LLM backend from the config file and environment.
pub fn build_backend(file: &ConfigFile) -> anyhow::Result<Arc<dyn LlmBackend>> {
    let api = file.api.clone().unwrap_or_default();
    let provider = api.provider.unwrap_or_else(|| "gemini".to_string());

    match provider.to_lowercase().as_str() {
        "gemini" => {
            let key = api
                .api_key
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .context("no Gemini API key (config or GEMINI_API_KEY)")?;
            let model = api.model.unwrap_or_else(|| "gemini-2.5-flash".to_string());
            let mut backend = GeminiBackend::new(key, model);
            if let Some(url) = api.base_url {
                backend = backend.with_base_url(url);
            }
            Ok(Arc::new(backend))
        }
        "openai" => {
            let key = api
                .api_key
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .context("no OpenAI API key (config or OPENAI_API_KEY)")?;
            let model = api.model.unwrap_or_else(|| "gpt-4o-mini".to_string());
            let mut backend = OpenAiBackend::new(key, model);
            if let Some(url) = api.base_url {
                backend = backend.with_base_url(url);
            }
            Ok(Arc::new(backend))
        }
        other => bail!("unsupported provider: {other} (expected gemini or openai)"),
    }
}

//! Final draft assembly: collate successful summaries into one prompt and
//! run a single long generation call.

use std::path::Path;
use std::time::Duration;

use litreview_llm::{LlmBackend, generate_with_retry};

use crate::{CoreError, SummaryOutcome};

/// Build the draft prompt: one formatted block per outcome, then the
/// research theme, then the template.
pub fn prepare_draft_prompt(
    outcomes: &[SummaryOutcome],
    research_theme: &str,
    template: &str,
) -> String {
    let mut blocks = String::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        blocks.push_str(&format!(
            "### Literature {}: {}\n\n**Summary:**\n{}\n\n---\n\n",
            i + 1,
            outcome.reference,
            outcome.summary
        ));
    }
    format!("{blocks}{research_theme}\n\n{template}")
}

/// Generate the final draft and write it to `output_path`.
///
/// Fails fast when `outcomes` is empty; the LLM is never called with zero
/// evidence. One blocking call with the caller's timeout; transient errors
/// are retried inside the adapter helper up to `max_retries`.
#[allow(clippy::too_many_arguments)]
pub async fn assemble_draft(
    outcomes: &[SummaryOutcome],
    research_theme: &str,
    template: &str,
    backend: &dyn LlmBackend,
    client: &reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    output_path: &Path,
) -> Result<String, CoreError> {
    if outcomes.is_empty() {
        return Err(CoreError::NoSummaries);
    }

    let prompt = prepare_draft_prompt(outcomes, research_theme, template);
    tracing::info!(
        summaries = outcomes.len(),
        prompt_chars = prompt.len(),
        backend = backend.name(),
        "generating final draft"
    );

    let draft = generate_with_retry(backend, &prompt, &[], client, timeout, max_retries)
        .await
        .map_err(|e| CoreError::Draft(e.to_string()))?;
    if draft.trim().is_empty() {
        return Err(CoreError::Draft("empty reply from model".to_string()));
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, &draft)?;
    tracing::info!(path = %output_path.display(), chars = draft.len(), "final draft written");

    Ok(draft)
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub paths: Option<PathsConfig>,
    pub api: Option<ApiConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub prompts: Option<PromptsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub pdf_dir: Option<String>,
    pub reference_file: Option<String>,
    pub mapping_file: Option<String>,
    pub store_file: Option<String>,
    pub draft_file: Option<String>,
    pub csv_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// "gemini" or "openai".
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Model for the final draft call; falls back to `model`.
    pub draft_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
    pub llm_timeout_secs: Option<u64>,
    pub draft_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    pub research_theme_file: Option<String>,
    pub summary_prompt_file: Option<String>,
    pub draft_prompt_file: Option<String>,
}

/// Platform config directory path: `<config_dir>/litreview/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("litreview").join("config.toml"))
}

/// Load config by cascading CWD `.litreview.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".litreview.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn pick<T: Clone>(overlay: Option<&T>, base: Option<&T>) -> Option<T> {
    overlay.or(base).cloned()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bp, op) = (base.paths.unwrap_or_default(), overlay.paths.unwrap_or_default());
    let (ba, oa) = (base.api.unwrap_or_default(), overlay.api.unwrap_or_default());
    let (bc, oc) = (
        base.concurrency.unwrap_or_default(),
        overlay.concurrency.unwrap_or_default(),
    );
    let (bm, om) = (
        base.prompts.unwrap_or_default(),
        overlay.prompts.unwrap_or_default(),
    );

    ConfigFile {
        paths: Some(PathsConfig {
            pdf_dir: pick(op.pdf_dir.as_ref(), bp.pdf_dir.as_ref()),
            reference_file: pick(op.reference_file.as_ref(), bp.reference_file.as_ref()),
            mapping_file: pick(op.mapping_file.as_ref(), bp.mapping_file.as_ref()),
            store_file: pick(op.store_file.as_ref(), bp.store_file.as_ref()),
            draft_file: pick(op.draft_file.as_ref(), bp.draft_file.as_ref()),
            csv_file: pick(op.csv_file.as_ref(), bp.csv_file.as_ref()),
        }),
        api: Some(ApiConfig {
            provider: pick(oa.provider.as_ref(), ba.provider.as_ref()),
            model: pick(oa.model.as_ref(), ba.model.as_ref()),
            api_key: pick(oa.api_key.as_ref(), ba.api_key.as_ref()),
            base_url: pick(oa.base_url.as_ref(), ba.base_url.as_ref()),
            draft_model: pick(oa.draft_model.as_ref(), ba.draft_model.as_ref()),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: pick(oc.num_workers.as_ref(), bc.num_workers.as_ref()),
            llm_timeout_secs: pick(oc.llm_timeout_secs.as_ref(), bc.llm_timeout_secs.as_ref()),
            draft_timeout_secs: pick(
                oc.draft_timeout_secs.as_ref(),
                bc.draft_timeout_secs.as_ref(),
            ),
            max_retries: pick(oc.max_retries.as_ref(), bc.max_retries.as_ref()),
        }),
        prompts: Some(PromptsConfig {
            research_theme_file: pick(
                om.research_theme_file.as_ref(),
                bm.research_theme_file.as_ref(),
            ),
            summary_prompt_file: pick(
                om.summary_prompt_file.as_ref(),
                bm.summary_prompt_file.as_ref(),
            ),
            draft_prompt_file: pick(
                om.draft_prompt_file.as_ref(),
                bm.draft_prompt_file.as_ref(),
            ),
        }),
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}

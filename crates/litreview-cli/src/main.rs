use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use litreview_core::config_file::{self, ConfigFile};
use litreview_core::{
    PipelineConfig, ProgressReporter, ResultStore, align, draft, prompts, run_pipeline,
    scan_documents,
};
use litreview_llm::{GeminiBackend, LlmBackend, OpenAiBackend};

mod output;

use output::ColorMode;

/// Literature Review Assistant - align, summarize, and draft from a folder of papers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Directory of source PDFs
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    /// Free-text reference list file
    #[arg(long)]
    references: Option<PathBuf>,

    /// Reference mapping side file
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Durable result store (JSON array of successful summaries)
    #[arg(long)]
    store: Option<PathBuf>,

    /// LLM provider: gemini or openai
    #[arg(long)]
    provider: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// API key (falls back to GEMINI_API_KEY / OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Provider base URL override (proxies, OpenRouter, ...)
    #[arg(long)]
    base_url: Option<String>,

    /// Concurrent LLM workers
    #[arg(long)]
    workers: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Align references (if needed) and summarize all pending PDFs
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Discard the persisted mapping and re-align from scratch
        #[arg(long)]
        refresh_mapping: bool,
    },

    /// Build or refresh the filename-to-citation mapping only
    Align {
        #[command(flatten)]
        common: CommonArgs,

        /// Discard the persisted mapping and re-align from scratch
        #[arg(long)]
        refresh: bool,
    },

    /// Assemble the final draft from all successful summaries
    Draft {
        #[command(flatten)]
        common: CommonArgs,

        /// Output path for the draft
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the result store as a sorted CSV
    Export {
        #[command(flatten)]
        common: CommonArgs,

        /// Output path for the CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            common,
            refresh_mapping,
        } => run(common, refresh_mapping).await,
        Command::Align { common, refresh } => align_only(common, refresh).await,
        Command::Draft { common, output } => draft_cmd(common, output).await,
        Command::Export { common, output } => export(common, output),
    }
}

async fn run(common: CommonArgs, refresh_mapping: bool) -> anyhow::Result<()> {
    let file = config_file::load_config();
    let config = resolve_pipeline_config(&common, &file, refresh_mapping)?;
    let backend = build_backend(&common, &file, false)?;
    let color = ColorMode(!common.no_color);

    let reporter = Arc::new(ProgressReporter::new());
    let bar = spawn_progress_bar(&reporter);

    let result = run_pipeline(&config, backend, reporter).await;
    bar.abort();

    let report = result?;
    output::print_report(&mut std::io::stdout(), &report, color)?;
    Ok(())
}

async fn align_only(common: CommonArgs, refresh: bool) -> anyhow::Result<()> {
    let file = config_file::load_config();
    let config = resolve_pipeline_config(&common, &file, refresh)?;
    let backend = build_backend(&common, &file, false)?;
    let color = ColorMode(!common.no_color);

    let documents = scan_documents(&config.pdf_dir)?;
    if documents.is_empty() {
        bail!("no PDF documents found in {}", config.pdf_dir.display());
    }

    let client = litreview_core::http_client();
    let map = align::load_or_align(
        &config.mapping_file,
        &documents,
        &config.reference_file,
        backend.as_ref(),
        &client,
        Duration::from_secs(config.llm_timeout_secs),
        config.max_retries,
        refresh,
    )
    .await?;

    let matched = map.values().filter(|v| v.is_some()).count();
    output::print_alignment(&mut std::io::stdout(), matched, map.len(), color)?;
    Ok(())
}

async fn draft_cmd(common: CommonArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    let file = config_file::load_config();
    let config = resolve_pipeline_config(&common, &file, false)?;
    let backend = build_backend(&common, &file, true)?;

    let store = ResultStore::new(config.store_file.clone());
    let (_, successes) = store.load_existing();
    if successes.is_empty() {
        bail!(
            "no successful summaries in {} - run `litreview run` first",
            store.path().display()
        );
    }

    let template = file
        .prompts
        .as_ref()
        .and_then(|p| p.draft_prompt_file.as_deref())
        .map(read_text_file)
        .transpose()?
        .unwrap_or_else(|| prompts::DRAFT_PROMPT.to_string());

    let output_path = output
        .or_else(|| path_from(&file, |p| p.draft_file.clone()))
        .unwrap_or_else(|| PathBuf::from("final_draft.md"));

    let client = litreview_core::http_client();
    let text = draft::assemble_draft(
        &successes,
        &config.research_theme,
        &template,
        backend.as_ref(),
        &client,
        Duration::from_secs(config.draft_timeout_secs),
        config.max_retries,
        &output_path,
    )
    .await?;

    println!(
        "Draft written to {} ({} summaries, {} chars)",
        output_path.display(),
        successes.len(),
        text.len()
    );
    Ok(())
}

fn export(common: CommonArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    let file = config_file::load_config();
    let store_path = common
        .store
        .clone()
        .or_else(|| path_from(&file, |p| p.store_file.clone()))
        .unwrap_or_else(|| PathBuf::from("literature_summary.json"));

    let store = ResultStore::new(store_path);
    let (_, successes) = store.load_existing();

    let output_path = output
        .or_else(|| path_from(&file, |p| p.csv_file.clone()))
        .unwrap_or_else(|| PathBuf::from("summary_sorted.csv"));

    let rows = litreview_reporting::export_csv_file(&successes, &output_path)
        .map_err(|e| anyhow::anyhow!(e))?;
    println!("Exported {} rows to {}", rows, output_path.display());
    Ok(())
}

/// Resolve configuration: CLI flags > config file > defaults.
fn resolve_pipeline_config(
    common: &CommonArgs,
    file: &ConfigFile,
    refresh_mapping: bool,
) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_config_file(file)?;
    if let Some(dir) = &common.pdf_dir {
        config.pdf_dir = dir.clone();
    }
    if let Some(path) = &common.references {
        config.reference_file = path.clone();
    }
    if let Some(path) = &common.mapping {
        config.mapping_file = path.clone();
    }
    if let Some(path) = &common.store {
        config.store_file = path.clone();
    }
    if let Some(workers) = common.workers {
        config.num_workers = workers;
    }
    config.refresh_mapping = refresh_mapping;
    Ok(config)
}

/// Build the LLM backend from flags, config file, and environment.
fn build_backend(
    common: &CommonArgs,
    file: &ConfigFile,
    for_draft: bool,
) -> anyhow::Result<Arc<dyn LlmBackend>> {
    let api = file.api.clone().unwrap_or_default();
    let provider = common
        .provider
        .clone()
        .or(api.provider)
        .unwrap_or_else(|| "gemini".to_string());

    let model = common.model.clone().or(if for_draft {
        api.draft_model.or(api.model.clone())
    } else {
        api.model.clone()
    });

    match provider.to_lowercase().as_str() {
        "gemini" => {
            let key = common
                .api_key
                .clone()
                .or(api.api_key)
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .context("no Gemini API key (flag, config, or GEMINI_API_KEY)")?;
            let mut backend = GeminiBackend::new(key, model.unwrap_or_else(|| "gemini-2.5-flash".into()));
            if let Some(url) = &common.base_url {
                backend = backend.with_base_url(url.clone());
            }
            Ok(Arc::new(backend))
        }
        "openai" => {
            let key = common
                .api_key
                .clone()
                .or(api.api_key)
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .context("no OpenAI API key (flag, config, or OPENAI_API_KEY)")?;
            let mut backend = OpenAiBackend::new(key, model.unwrap_or_else(|| "gpt-4o-mini".into()));
            if let Some(url) = common.base_url.clone().or(api.base_url) {
                backend = backend.with_base_url(url);
            }
            Ok(Arc::new(backend))
        }
        other => bail!("unsupported provider: {other} (expected gemini or openai)"),
    }
}

fn path_from(
    file: &ConfigFile,
    pick: impl Fn(&config_file::PathsConfig) -> Option<String>,
) -> Option<PathBuf> {
    file.paths.as_ref().and_then(pick).map(PathBuf::from)
}

fn read_text_file(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("failed to read {path}"))
}

/// Drive an indicatif bar from the reporter's subscription. Exits on the
/// terminal "all done" event; aborted by the caller on pipeline errors.
fn spawn_progress_bar(reporter: &ProgressReporter) -> tokio::task::JoinHandle<()> {
    let mut rx = reporter.subscribe();
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("[{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        while let Some(state) = rx.recv().await {
            bar.set_length(state.total as u64);
            bar.set_position(state.current as u64);
            bar.set_message(state.message.clone());
            if state.message == "all done" {
                break;
            }
        }
        bar.finish_and_clear();
    })
}

//! Document Translator CLI - translate TXT, PDF and EPUB files into Chinese.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use doc_translator_core::{
    AppConfig, DocumentTranslator, FileFilter, ProgressEvent, ProgressSink, Provider, RunConfig,
    RunOutcome, RunReport, TranslatorConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderOption {
    Akashml,
    Deepseek,
    Hyperbolic,
}

impl From<ProviderOption> for Provider {
    fn from(opt: ProviderOption) -> Self {
        match opt {
            ProviderOption::Akashml => Self::Akashml,
            ProviderOption::Deepseek => Self::Deepseek,
            ProviderOption::Hyperbolic => Self::Hyperbolic,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "doc-translate")]
#[command(author, version, about = "Translate documents into Chinese", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate one file with large chunks
    Job {
        /// Input file (.txt, .pdf or .epub)
        file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Translate every supported file in a directory with small chunks
    Batch {
        /// Input directory
        #[arg(default_value = "files")]
        dir: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Translation provider (default: from config, else AkashML)
    #[arg(short, long, value_enum)]
    provider: Option<ProviderOption>,

    /// API key (default: config file, then the provider's own environment variable)
    #[arg(long, env = "DOC_TRANSLATOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write translations here instead of beside the input
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Disable caching
    #[arg(long)]
    no_cache: bool,
}

/// Mirror dispatcher progress on a terminal bar
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        // Template is hardcoded and valid, unwrap is safe
        #[allow(clippy::unwrap_used)]
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    #[allow(clippy::cast_possible_truncation)]
    fn on_progress(&self, event: &ProgressEvent) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.completed as u64);
    }
}

/// Load config, then apply the run profile and CLI overrides
fn build_config(config_path: Option<&Path>, profile: RunConfig, common: &CommonArgs) -> Result<AppConfig> {
    let mut config = if let Some(path) = config_path {
        AppConfig::from_file(path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // A config file that tunes the run section wins over the profile
    if config.run == RunConfig::default() {
        config.run = profile;
    }
    if let Some(workers) = common.workers {
        config.run.max_workers = workers;
    }

    resolve_translator(
        &mut config.translator,
        common.provider.map(Provider::from),
        common.api_key.clone(),
        |name| std::env::var(name).ok(),
    );
    if let Some(ref model) = common.model {
        config.translator.model.clone_from(model);
    }

    if common.no_cache {
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;
    }
    if let Some(ref dir) = common.output_dir {
        config.output_dir = Some(dir.clone());
    }

    config.run.validate().context("Invalid run configuration")?;
    Ok(config)
}

/// Pick the endpoint and API key.
///
/// `--provider` replaces the configured endpoint only when it names a
/// different provider, and the configured key goes with it. The key is then
/// taken from `cli_key`, else the config, else the environment variable of
/// the provider serving `api_base`.
fn resolve_translator(
    translator: &mut TranslatorConfig,
    chosen: Option<Provider>,
    cli_key: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) {
    let configured = Provider::from_api_base(&translator.api_base);
    if let Some(provider) = chosen
        && Some(provider) != configured
    {
        *translator = provider.translator_config(None);
    }

    let provider = chosen.or(configured);
    let api_key = cli_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| translator.api_key().map(str::to_string))
        .or_else(|| provider.and_then(|p| env(p.key_env())));
    if api_key.is_some() {
        translator.api_key = api_key;
    }
}

#[allow(clippy::print_stdout)]
fn print_report(input: &Path, output: &Path, report: &RunReport) {
    match &report.outcome {
        RunOutcome::Succeeded if report.failed_chunks.is_empty() => {
            println!("✓ {} -> {}", input.display(), output.display());
        }
        RunOutcome::Succeeded => {
            let numbers: Vec<String> = report.failed_chunks.iter().map(|i| (i + 1).to_string()).collect();
            println!(
                "⚠ {} -> {} (untranslated chunks: {})",
                input.display(),
                output.display(),
                numbers.join(", ")
            );
        }
        RunOutcome::Failed(reason) => {
            println!("✗ {}: {}", input.display(), reason);
        }
    }
    println!("  {}", report.stats);
}

async fn run_job(file: &Path, config: AppConfig) -> Result<ExitCode> {
    let translator = DocumentTranslator::new(config).context("Failed to initialize translator")?;
    let info = translator.translator_info();
    info!("Using {} ({})", info.name, info.model);

    let progress = BarProgress::new();
    let report = translator
        .translate_file(file, &progress)
        .await
        .with_context(|| format!("Failed to translate {}", file.display()))?;
    progress.finish();

    print_report(file, &translator.output_path(file), &report);
    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Supported inputs of `dir`, sorted by name
fn collect_inputs(dir: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if !path.is_file() {
            continue;
        }
        match filter.check_path(&path) {
            None => files.push(path),
            Some(reason) => info!("Skipping {}: {}", path.display(), reason),
        }
    }
    files.sort();
    Ok(files)
}

async fn run_batch(dir: &Path, config: AppConfig) -> Result<ExitCode> {
    let filter = FileFilter::default();
    let files = collect_inputs(dir, &filter)?;
    if files.is_empty() {
        warn!("No supported files in {}", dir.display());
        return Ok(ExitCode::SUCCESS);
    }
    info!("Found {} files in {}", files.len(), dir.display());

    let translator = DocumentTranslator::new(config).context("Failed to initialize translator")?;
    let (mut succeeded, mut failed, mut skipped) = (0usize, 0usize, 0usize);

    for (i, file) in files.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, files.len(), file.display());

        let segments = match translator.extract(file).await {
            Ok(segments) => segments,
            Err(e) => {
                error!("Failed to extract {}: {}", file.display(), e);
                failed += 1;
                continue;
            }
        };
        if let Some(reason) = filter.check_content(&segments) {
            info!("Skipping {}: {}", file.display(), reason);
            skipped += 1;
            continue;
        }

        let progress = BarProgress::new();
        let result = translator.translate_segments(file, &segments, &progress).await;
        progress.finish();

        match result {
            Ok(report) => {
                print_report(file, &translator.output_path(file), &report);
                if report.is_success() {
                    succeeded += 1;
                } else {
                    failed += 1;
                }
            }
            Err(e) if e.is_fatal() => {
                return Err(e).context("Aborting batch on configuration error");
            }
            Err(e) => {
                error!("Failed to translate {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    #[allow(clippy::print_stdout)]
    {
        println!("Batch complete: {succeeded} succeeded, {failed} failed, {skipped} skipped");
    }
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Run summaries are logged at info, so that is the floor
    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Job { file, common } => {
            let config = build_config(cli.config.as_deref(), RunConfig::job(), &common)?;
            run_job(&file, config).await
        }
        Command::Batch { dir, common } => {
            let config = build_config(cli.config.as_deref(), RunConfig::batch(), &common)?;
            run_batch(&dir, config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_job() {
        let cli = Cli::try_parse_from(["doc-translate", "-v", "job", "book.epub", "--provider", "deepseek", "--workers", "3"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Job { file, common } = cli.command else {
            panic!("expected job");
        };
        assert_eq!(file, PathBuf::from("book.epub"));
        assert!(matches!(common.provider, Some(ProviderOption::Deepseek)));
        assert_eq!(common.workers, Some(3));
    }

    #[test]
    fn test_cli_batch_defaults_to_files_dir() {
        let cli = Cli::try_parse_from(["doc-translate", "batch", "--no-cache"]).unwrap();
        let Command::Batch { dir, common } = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(dir, PathBuf::from("files"));
        assert!(common.no_cache);
    }

    #[test]
    fn test_build_config_applies_profile_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let common = CommonArgs {
            provider: Some(ProviderOption::Hyperbolic),
            api_key: Some("k".to_string()),
            model: None,
            workers: Some(2),
            output_dir: None,
            no_cache: true,
        };
        let config = build_config(Some(&path), RunConfig::job(), &common).unwrap();

        assert_eq!(config.run.chunk_size, RunConfig::job().chunk_size);
        assert_eq!(config.run.max_workers, 2);
        assert_eq!(config.translator.api_base, Provider::Hyperbolic.api_base());
        assert_eq!(config.translator.api_key(), Some("k"));
        assert!(!config.cache.memory_enabled && !config.cache.disk_enabled);
    }

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "DEEPSEEK_API_KEY" => Some("ds-env".to_string()),
            "HYPERBOLIC_API_KEY" => Some("hb-env".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_configured_provider_reads_its_own_env_key() {
        let mut translator = Provider::Deepseek.translator_config(None);
        resolve_translator(&mut translator, None, None, fake_env);
        assert_eq!(translator.api_key(), Some("ds-env"));
        assert_eq!(translator.api_base, Provider::Deepseek.api_base());
    }

    #[test]
    fn test_same_provider_flag_keeps_config_key() {
        let mut translator = Provider::Deepseek.translator_config(Some("ds-file".to_string()));
        translator.model = "deepseek-reasoner".to_string();
        resolve_translator(&mut translator, Some(Provider::Deepseek), None, fake_env);
        assert_eq!(translator.api_key(), Some("ds-file"));
        assert_eq!(translator.model, "deepseek-reasoner");
    }

    #[test]
    fn test_other_provider_flag_drops_config_key() {
        let mut translator = Provider::Deepseek.translator_config(Some("ds-file".to_string()));
        resolve_translator(&mut translator, Some(Provider::Hyperbolic), None, fake_env);
        assert_eq!(translator.api_base, Provider::Hyperbolic.api_base());
        assert_eq!(translator.model, Provider::Hyperbolic.model());
        assert_eq!(translator.api_key(), Some("hb-env"));
    }

    #[test]
    fn test_cli_key_wins_and_custom_endpoint_skips_env() {
        let mut translator = Provider::Deepseek.translator_config(Some("ds-file".to_string()));
        resolve_translator(&mut translator, None, Some("cli".to_string()), fake_env);
        assert_eq!(translator.api_key(), Some("cli"));

        let mut local = TranslatorConfig::new("http://localhost:8080/v1", None, "local");
        resolve_translator(&mut local, None, None, |_| Some("leaked".to_string()));
        assert_eq!(local.api_key(), None);
    }
}

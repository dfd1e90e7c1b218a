//! Presetsync command-line management tool.
//!
//! Provides subcommands for generating and validating configuration files,
//! resolving the preset revision for an application version, downloading
//! and loading presets, and inspecting or checking preset documents.

mod console_sink;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use presetsync_core::config::AppConfig;
use presetsync_core::remote::{Endpoints, HttpSource, PresetFetcher};
use presetsync_core::revision::resolve_revision;
use presetsync_core::schema::{JsonSchemaValidator, SchemaValidator};
use presetsync_core::storage::{JsonFileStorage, PresetStorage};
use presetsync_core::sync_engine::{DownloadOutcome, PersistedOutcome, PresetSync};

use crate::console_sink::ConsoleSink;

const DEFAULT_CONFIG_PATH: &str = "~/.config/presetsync/config.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Presetsync command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "presetsync",
    version,
    about = "Download, validate and inspect versioned configuration presets"
)]
struct Cli {
    /// Path to the TOML configuration file
    /// [default: ~/.config/presetsync/config.toml].
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (overrides the config file; RUST_LOG takes precedence).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./presetsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Fetch the version manifest and print the revision that applies.
    Resolve {
        /// Application version to resolve (defaults to `app.version`).
        #[arg(long)]
        app_version: Option<String>,
    },

    /// Download, validate and persist the presets.
    Sync {
        /// Raise an alert on success and save even if saving is disabled.
        #[arg(long)]
        force: bool,
    },

    /// Run the startup sequence: download, then load the persisted file.
    Load,

    /// List the persisted presets.
    Show,

    /// Validate a JSON document against the preset schema.
    Check {
        /// JSON file to check.
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = cli;
    let config = config.as_deref();
    let log_level = log_level.as_deref();

    match command {
        Commands::Init { output } => {
            init_tracing(log_level.unwrap_or("warn"));
            cmd_init(&output)
        }
        Commands::Validate => {
            init_tracing(log_level.unwrap_or("warn"));
            cmd_validate(&config_path(config))
        }
        Commands::Resolve { app_version } => {
            cmd_resolve(&setup(config, log_level)?, app_version).await
        }
        Commands::Sync { force } => cmd_sync(&setup(config, log_level)?, force).await,
        Commands::Load => cmd_load(&setup(config, log_level)?).await,
        Commands::Show => cmd_show(&setup(config, log_level)?).await,
        Commands::Check { file } => cmd_check(&setup(config, log_level)?, &file),
    }
}

/// Load the configuration, then install logging at its level unless
/// `--log-level` overrides it.
fn setup(config: Option<&str>, log_level: Option<&str>) -> Result<AppConfig> {
    let config = load_config(config)?;
    init_tracing(log_level.unwrap_or(&config.app.log_level));
    Ok(config)
}

/// `RUST_LOG` wins; otherwise use `level`, falling back to `info` if it
/// does not parse.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn config_path(explicit: Option<&str>) -> PathBuf {
    PathBuf::from(expand_tilde(explicit.unwrap_or(DEFAULT_CONFIG_PATH)))
}

/// An explicitly given file must exist; the default location may be absent,
/// in which case the built-in defaults apply.
fn load_config(explicit: Option<&str>) -> Result<AppConfig> {
    let path = config_path(explicit);
    let mut config = match explicit {
        Some(_) => AppConfig::load_and_resolve(&path),
        None => AppConfig::load_or_default(&path),
    }
    .context("failed to load configuration file")?;
    config.app.data_dir = PathBuf::from(expand_tilde(&config.app.data_dir.to_string_lossy()));
    Ok(config)
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .context("invalid spinner template")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn load_validator(config: &AppConfig) -> Result<JsonSchemaValidator> {
    match &config.storage.schema_file {
        Some(path) => JsonSchemaValidator::from_file(path)
            .with_context(|| format!("failed to load schema {}", path.display())),
        None => JsonSchemaValidator::presets().context("failed to compile built-in schema"),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = format!(
        r#"# Presetsync Configuration
# Every key is optional; the values below are the defaults.

[app]
# Version of the application the presets are for. Older versions receive
# the newest presets published for them.
version = "{version}"
log_level = "info"
# data_dir = "~/.local/share/presetsync"

[remote]
repo = "SteamGridDB/steam-rom-manager"
raw_url = "https://raw.githubusercontent.com"
api_url = "https://api.github.com"
manifest_ref = "master"
manifest_path = "files/presetsHashes.json"
presets_dir = "files/presets"
default_revision = "master"
timeout_ms = 5000
# token_env = "GITHUB_TOKEN"

[storage]
# presets_file = "~/.local/share/presetsync/configPresets.json"
# schema_file = "./preset-schema.json"

[alerts]
downloaded_ms = 5000
load_error_ms = 5000
write_error_ms = 3000
"#,
        version = env!("CARGO_PKG_VERSION")
    );

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set app.version to the version of your application");
    println!("  2. Optionally set GITHUB_TOKEN and uncomment token_env");
    println!("  3. Validate with: presetsync validate --config {}", output.display());
    println!("  4. Download presets: presetsync sync --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    // Missing token is only a warning.
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    match load_validator(&config) {
        Ok(_) => println!("  [OK] Preset schema compiles"),
        Err(e) => {
            println!("  [FAIL] {:#}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  App version     : {}", config.app.version);
    println!("  Repository      : {}", config.remote.repo);
    println!("  Presets dir     : {}", config.remote.presets_dir);
    println!("  Default revision: {}", config.remote.default_revision);
    println!("  Timeout         : {}ms", config.remote.timeout_ms);
    println!(
        "  API token       : {}",
        if config.remote.token.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("  Presets file    : {}", config.presets_file().display());
    println!(
        "  Schema          : {}",
        config
            .storage
            .schema_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

async fn cmd_resolve(config: &AppConfig, app_version: Option<String>) -> Result<()> {
    let app_version = app_version.unwrap_or_else(|| config.app.version.clone());
    let source = HttpSource::from_config(&config.remote).context("failed to create HTTP client")?;
    let endpoints = Endpoints::from_config(&config.remote).context("invalid remote configuration")?;
    let fetcher = PresetFetcher::new(Arc::new(source), endpoints);

    let progress = spinner("Fetching version manifest...")?;
    let manifest = fetcher.fetch_manifest().await;
    progress.finish_and_clear();
    let manifest = manifest.context("failed to fetch version manifest")?;

    let default_revision = &config.remote.default_revision;
    let revision = resolve_revision(&app_version, &manifest, default_revision);
    let is_head = &revision == default_revision;

    println!();
    println!("{}", style::header(&format!("Version manifest ({} entries)", manifest.len())));
    println!();

    if !manifest.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Version", "Commit"]);
        for (version, record) in manifest.iter() {
            table.add_row(vec![Cell::new(version), Cell::new(&record.commit)]);
        }
        println!("{}", table);
        println!();
    }

    println!("  App version: {}", app_version);
    println!("  Revision   : {}", style::revision(&revision, is_head));
    if !is_head {
        println!(
            "  {}",
            style::dim("the newest presets require a newer application; using a cached commit")
        );
    }

    Ok(())
}

async fn cmd_sync(config: &AppConfig, force: bool) -> Result<()> {
    let sink = Arc::new(ConsoleSink::new());
    let sync = PresetSync::from_config(config, sink.clone())
        .context("failed to set up preset sync")?;

    let progress = spinner("Downloading config presets...")?;
    sink.attach(&progress);
    let outcome = sync.download(force).await;
    progress.finish_and_clear();
    sink.detach();

    print_download(&outcome);
    match outcome {
        DownloadOutcome::Applied { .. } => {
            println!("  Presets: {}", preset_count(&sync.data()));
            println!("  File   : {}", config.presets_file().display());
            Ok(())
        }
        DownloadOutcome::Skipped => Ok(()),
        DownloadOutcome::Rejected { .. } | DownloadOutcome::Failed { .. } => {
            anyhow::bail!("download did not complete")
        }
    }
}

async fn cmd_load(config: &AppConfig) -> Result<()> {
    let sink = Arc::new(ConsoleSink::new());
    let sync = PresetSync::from_config(config, sink.clone())
        .context("failed to set up preset sync")?;

    let progress = spinner("Loading config presets...")?;
    sink.attach(&progress);
    let report = sync.load().await;
    progress.finish_and_clear();
    sink.detach();

    print_download(&report.download);
    match &report.persisted {
        PersistedOutcome::Loaded => println!(
            "{}",
            style::success(&format!("Loaded {}", config.presets_file().display()))
        ),
        PersistedOutcome::Missing => println!(
            "{}",
            style::warn(&format!("No presets file at {}", config.presets_file().display()))
        ),
        PersistedOutcome::Corrupted { .. } => println!(
            "{}",
            style::error(
                "Presets file is corrupted; saving is disabled until valid presets are accepted"
            )
        ),
    }
    println!("  Presets: {}", preset_count(&sync.data()));

    if matches!(report.persisted, PersistedOutcome::Corrupted { .. }) {
        anyhow::bail!("persisted presets could not be loaded");
    }
    Ok(())
}

async fn cmd_show(config: &AppConfig) -> Result<()> {
    let storage = JsonFileStorage::new(config.presets_file());
    let document = storage
        .read()
        .await
        .context("failed to read presets file")?;

    let presets = match document {
        Some(Value::Object(presets)) => presets,
        Some(_) => anyhow::bail!("{} does not contain a JSON object", storage.location()),
        None => {
            println!("No presets stored at {}.", storage.location());
            println!("Run 'presetsync sync' to download them.");
            return Ok(());
        }
    };

    if presets.is_empty() {
        println!("No presets found.");
        return Ok(());
    }

    println!();
    println!("{}", style::header(&format!("Config Presets ({})", presets.len())));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Parser", "Title"]);

    for (name, preset) in &presets {
        let field = |key: &str| {
            preset
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("—")
                .to_string()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(field("parserType")),
            Cell::new(field("configTitle")),
        ]);
    }

    println!("{}", table);
    println!();

    Ok(())
}

fn cmd_check(config: &AppConfig, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let validator = load_validator(config)?;
    match validator.validate(&document) {
        Ok(()) => {
            println!(
                "{}",
                style::success(&format!(
                    "{} is valid ({} presets)",
                    file.display(),
                    preset_count(&document)
                ))
            );
            Ok(())
        }
        Err(violation) => {
            println!("{}", style::error(&format!("{} is invalid:", file.display())));
            for error in &violation.errors {
                println!("  {}", error);
            }
            anyhow::bail!("{} error(s) found", violation.errors.len())
        }
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_download(outcome: &DownloadOutcome) {
    match outcome {
        DownloadOutcome::Skipped => {
            println!("{}", style::warn("A download is already in progress"))
        }
        DownloadOutcome::Applied { revision, files } => println!(
            "{}",
            style::success(&format!(
                "Applied {} preset file(s) from revision {}",
                files, revision
            ))
        ),
        DownloadOutcome::Rejected { revision, violation } => {
            println!(
                "{}",
                style::error(&format!(
                    "Presets from revision {} failed validation",
                    revision
                ))
            );
            for error in &violation.errors {
                println!("  {}", error);
            }
        }
        DownloadOutcome::Failed { revision, error } => println!(
            "{}",
            style::error(&format!(
                "Download failed{}: {}",
                revision
                    .as_ref()
                    .map(|r| format!(" (revision {})", r))
                    .unwrap_or_default(),
                error
            ))
        ),
    }
}

fn preset_count(document: &Value) -> usize {
    document.as_object().map(|presets| presets.len()).unwrap_or(0)
}

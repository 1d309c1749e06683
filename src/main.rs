//! TestLens - relevance and complexity scores for test cases
//!
//! A CLI tool that uploads a diff and a test-case listing to Gemini,
//! requests a structured per-test assessment, and writes it as JSON
//! keyed by test id.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (configuration, missing inputs, remote or schema error)

mod cli;
mod config;
mod error;
mod models;
mod output;
mod polling;
mod remote;
mod runner;
mod schema;

use anyhow::{Context, Result};
use cli::Args;
use config::{resolve_api_key, Config, CONFIG_FILE};
use remote::GeminiClient;
use runner::AnalysisRunner;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("TestLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Diff: {:?}, test cases: {:?}", args.diff, args.test_cases);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .testlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .testlens.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .testlens.toml")?;

    println!("✅ Created .testlens.toml with default settings.");
    println!("   Edit it to customize input paths, model, and polling.");
    Ok(())
}

/// Initialize logging based on verbosity settings; RUST_LOG wins when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }
}

/// Resolve settings at the edge, then hand everything to the runner.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Credential first: nothing remote happens without it.
    let api_key = resolve_api_key(args.api_key.as_deref())
        .map_err(|e| anyhow::Error::new(e).context("configuration failed"))?;

    let show_progress = !args.quiet;
    let runner_config = config.runner_config(show_progress);

    if args.dry_run {
        return handle_dry_run(&config, &runner_config);
    }

    let client = GeminiClient::new(config.gemini_config(api_key))?;

    if show_progress {
        println!("🤖 Initializing Gemini client...");
        println!("   Model: {}", client.model());
        println!("   Diff: {}", config.general.diff.display());
        println!("   Test cases: {}", config.general.test_cases.display());
        println!("   Response shape: {:?}", config.model.response_shape);
    }

    let runner = AnalysisRunner::new(client, config.wait_strategy(), runner_config);

    let summary = runner.run().await.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("{} failed", stage))
    })?;

    println!(
        "\n✅ Successfully generated {} with {} entries.",
        summary.output.display(),
        summary.entries
    );
    Ok(())
}

/// Handle --dry-run: check the inputs, make no remote calls.
fn handle_dry_run(config: &Config, runner_config: &runner::RunnerConfig) -> Result<()> {
    println!("\n🔍 Dry run: checking inputs (no Gemini calls)...\n");

    let artifacts = runner::check_inputs(runner_config)
        .map_err(|e| anyhow::Error::new(e).context("input check failed"))?;

    for artifact in &artifacts {
        let size = std::fs::metadata(&artifact.path)
            .map(|m| m.len())
            .unwrap_or(0);
        println!(
            "     📄 {} as \"{}\" ({} bytes)",
            artifact.path.display(),
            artifact.display_name,
            size
        );
    }
    println!("\n   Model: {}", config.model.name);
    println!("   Output: {}", runner_config.output.display());

    println!("\n✅ Dry run complete. No Gemini calls were made.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

//! Command-line interface argument parsing.
//!
//! Every flag is optional. Running `testlens` with no arguments reads
//! `dff.txt` and `test_case.txt` from the current directory and writes
//! `llm.txt`.

use clap::Parser;
use std::path::PathBuf;

use crate::schema::ResponseShape;

/// TestLens - score test cases against a diff with Gemini
///
/// Uploads a diff and a test-case listing, asks the model for the relevance
/// and complexity of every test case, and writes the scores as JSON keyed
/// by test id.
///
/// Examples:
///   testlens
///   testlens --diff changes.diff --test-cases tests.txt --output scores.json
///   testlens --response-shape map --max-polls 60
///   testlens --dry-run
///   testlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Gemini API key (hidden; set GEMINI_API_KEY instead)
    #[arg(
        long,
        env = "GEMINI_API_KEY",
        hide = true,
        hide_env_values = true,
        value_name = "KEY"
    )]
    pub api_key: Option<String>,

    /// Diff to analyze [default: dff.txt]
    #[arg(long, value_name = "FILE")]
    pub diff: Option<PathBuf>,

    /// Test-case listing to score [default: test_case.txt]
    #[arg(long, value_name = "FILE")]
    pub test_cases: Option<PathBuf>,

    /// Output file for the JSON scores [default: llm.txt]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Gemini model to use [default: gemini-2.5-pro]
    #[arg(short, long, env = "TESTLENS_MODEL")]
    pub model: Option<String>,

    /// Gemini API base URL
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Shape the model is asked to return
    ///
    /// `list` asks for records carrying their test id and reshapes them;
    /// `map` asks for the final mapping directly.
    #[arg(long, value_name = "SHAPE")]
    pub response_shape: Option<ResponseShape>,

    /// Seconds between upload status checks [default: 2]
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Give up after this many status checks per file
    ///
    /// Without it, polling continues until the service reports a final state.
    #[arg(long, value_name = "COUNT")]
    pub max_polls: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .testlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Check the credential and input files without calling the service
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .testlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref api_base) = self.api_base {
            if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
                return Err("API base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(max_polls) = self.max_polls {
            if max_polls == 0 {
                return Err("Max polls must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

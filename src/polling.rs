//! Readiness polling for uploaded files.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::models::UploadedFile;
use crate::remote::InferenceService;

/// How long to wait between status checks, and how many checks to allow.
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Upper bound on status checks per file. `None` polls until the file
    /// leaves the processing state.
    fn max_attempts(&self) -> Option<u32>;

    /// Suspend before the next status check.
    async fn wait(&self);
}

/// Sleep a fixed interval between checks.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// No delay at all; status checks run back to back.
    #[allow(dead_code)] // Used by tests
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, None)
    }
}

#[async_trait]
impl WaitStrategy for FixedInterval {
    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    async fn wait(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Poll `file` until it leaves the processing state.
///
/// Returns the final handle when it is ACTIVE. Any other terminal state
/// aborts with [`AnalysisError::RemoteProcessing`].
pub async fn wait_for_active<S, W>(
    service: &S,
    file: &UploadedFile,
    strategy: &W,
    show_progress: bool,
) -> Result<UploadedFile, AnalysisError>
where
    S: InferenceService + ?Sized,
    W: WaitStrategy + ?Sized,
{
    let pb = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("   {spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    } else {
        ProgressBar::hidden()
    };
    pb.set_message(format!("Waiting for {} to be processed", file.label()));

    let mut current = service.get_file(&file.name).await?;
    let mut checks: u32 = 1;

    while current.state.is_processing() {
        if let Some(max) = strategy.max_attempts() {
            if checks >= max {
                pb.finish_and_clear();
                return Err(AnalysisError::ProcessingTimeout {
                    name: current.name,
                    attempts: checks,
                });
            }
        }

        debug!("{} still processing (check {})", current.name, checks);
        pb.tick();
        strategy.wait().await;

        current = service.get_file(&file.name).await?;
        checks += 1;
    }

    pb.finish_and_clear();

    if !current.state.is_ready() {
        return Err(AnalysisError::RemoteProcessing {
            name: current.name,
            state: current.state,
        });
    }

    info!("{} is active after {} status check(s)", current.name, checks);
    Ok(current)
}

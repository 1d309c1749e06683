//! The analysis runner.
//!
//! Straight-line workflow: check inputs, upload both artifacts, wait for
//! each to become active, issue one structured generation request, then
//! write the result mapping. The output file is only touched by the last
//! step, so any earlier failure leaves it as it was.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::models::{InputArtifact, ResultMapping, UploadedFile};
use crate::output;
use crate::polling::{self, WaitStrategy};
use crate::remote::{GenerationRequest, InferenceService};
use crate::schema::{self, ResponseShape};

/// Paths and options for one run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub diff: PathBuf,
    pub test_cases: PathBuf,
    pub output: PathBuf,
    pub response_shape: ResponseShape,
    /// Print progress lines and the poll spinner.
    pub show_progress: bool,
}

/// The two input artifacts, in upload order, or the list of missing paths.
pub fn check_inputs(config: &RunnerConfig) -> Result<[InputArtifact; 2], AnalysisError> {
    let artifacts = [
        InputArtifact::diff(&config.diff),
        InputArtifact::test_cases(&config.test_cases),
    ];
    let missing: Vec<PathBuf> = artifacts
        .iter()
        .filter(|a| !a.exists())
        .map(|a| a.path.clone())
        .collect();

    if !missing.is_empty() {
        return Err(AnalysisError::MissingInputs(missing));
    }
    Ok(artifacts)
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub entries: usize,
}

/// Drives one analysis against an [`InferenceService`].
pub struct AnalysisRunner<S, W> {
    service: S,
    wait: W,
    config: RunnerConfig,
}

impl<S, W> AnalysisRunner<S, W>
where
    S: InferenceService,
    W: WaitStrategy,
{
    pub fn new(service: S, wait: W, config: RunnerConfig) -> Self {
        Self {
            service,
            wait,
            config,
        }
    }

    #[allow(dead_code)] // Used by tests to inspect recorded calls
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fail if either input file is missing. No remote call is made.
    pub fn check_inputs(&self) -> Result<[InputArtifact; 2], AnalysisError> {
        check_inputs(&self.config)
    }

    /// Run the full workflow and write the output file.
    pub async fn run(&self) -> Result<RunSummary, AnalysisError> {
        let mapping = self.analyze().await?;

        output::write_results(&self.config.output, &mapping)?;
        info!(
            "Wrote {} entries to {}",
            mapping.len(),
            self.config.output.display()
        );

        Ok(RunSummary {
            output: self.config.output.clone(),
            entries: mapping.len(),
        })
    }

    /// Everything up to, but not including, persistence.
    pub async fn analyze(&self) -> Result<ResultMapping, AnalysisError> {
        let artifacts = self.check_inputs()?;

        self.progress("📤 Uploading files...");
        let mut uploaded = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            uploaded.push(self.upload(artifact).await?);
        }

        self.progress("⏳ Waiting for file processing...");
        let mut active = Vec::with_capacity(uploaded.len());
        for file in &uploaded {
            let file =
                polling::wait_for_active(&self.service, file, &self.wait, self.config.show_progress)
                    .await?;
            active.push(file);
        }

        let shape = self.config.response_shape;
        let request = GenerationRequest {
            files: active,
            instruction: shape.instruction().to_string(),
            schema: shape.json_schema(),
        };

        self.progress("🔬 Analyzing test cases...");
        debug!("Requesting {:?}-shaped response", shape);
        let text = self.service.generate(&request).await?;

        let mapping = schema::parse_response(&text, shape)?;
        info!("Model returned {} test case analyses", mapping.len());
        Ok(mapping)
    }

    async fn upload(&self, artifact: &InputArtifact) -> Result<UploadedFile, AnalysisError> {
        let contents = tokio::fs::read(&artifact.path).await.map_err(|e| {
            AnalysisError::output(format!("failed to read {}", artifact.path.display()), e)
        })?;
        debug!(
            "Read {} bytes from {}",
            contents.len(),
            artifact.path.display()
        );

        self.service.upload(artifact, contents).await
    }

    fn progress(&self, line: &str) {
        if self.config.show_progress {
            println!("{}", line);
        }
    }
}

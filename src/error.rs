//! Error taxonomy for an analysis run.
//!
//! Every variant is terminal: the runner never retries and never writes
//! the output file once one of these has been produced.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::FileState;

/// Failure of a single analysis run, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing credential or an unusable setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or both input files do not exist locally.
    #[error("input files not found locally: {}", display_paths(.0))]
    MissingInputs(Vec<PathBuf>),

    /// An uploaded file settled in a state other than ACTIVE.
    #[error("file {name} failed to process: {state}")]
    RemoteProcessing { name: String, state: FileState },

    /// The poll budget ran out while the file was still processing.
    #[error("file {name} still processing after {attempts} status checks")]
    ProcessingTimeout { name: String, attempts: u32 },

    /// Upload, status or generation request failed on the wire or remotely.
    #[error("remote service error during {stage}: {message}")]
    Transport { stage: &'static str, message: String },

    /// The model answered but the answer does not fit the declared schema.
    #[error("response does not match the declared schema: {0}")]
    Schema(String),

    /// Local I/O while reading inputs or persisting results.
    #[error("{context}: {source}")]
    Output {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    pub fn transport(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            stage,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn output(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Output {
            context: context.into(),
            source,
        }
    }

    /// Short name of the stage that failed, used in the final report line.
    pub fn stage(&self) -> &'static str {
        match self {
            AnalysisError::Configuration(_) => "configuration",
            AnalysisError::MissingInputs(_) => "input check",
            AnalysisError::RemoteProcessing { .. } | AnalysisError::ProcessingTimeout { .. } => {
                "file processing"
            }
            AnalysisError::Transport { stage, .. } => *stage,
            AnalysisError::Schema(_) => "response parsing",
            AnalysisError::Output { .. } => "local I/O",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inputs_lists_every_path() {
        let err = AnalysisError::MissingInputs(vec![
            PathBuf::from("dff.txt"),
            PathBuf::from("test_case.txt"),
        ]);
        assert_eq!(
            err.to_string(),
            "input files not found locally: dff.txt, test_case.txt"
        );
        assert_eq!(err.stage(), "input check");
    }

    #[test]
    fn test_remote_processing_names_file_and_state() {
        let err = AnalysisError::RemoteProcessing {
            name: "files/abc123".to_string(),
            state: FileState::Failed,
        };
        assert_eq!(err.to_string(), "file files/abc123 failed to process: FAILED");
    }

    #[test]
    fn test_transport_stage_is_reported() {
        let err = AnalysisError::transport("upload", "connection refused");
        assert_eq!(err.stage(), "upload");
        assert!(err.to_string().contains("connection refused"));
    }
}

//! Data models for a test-case analysis run.
//!
//! Local input artifacts, the remote handles they become after upload,
//! and the per-test scores that end up in the output file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Display name used when uploading the diff.
pub const DIFF_DISPLAY_NAME: &str = "Git Diff";

/// Display name used when uploading the test-case listing.
pub const TEST_CASES_DISPLAY_NAME: &str = "Test Cases";

/// A local file that gets uploaded for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArtifact {
    /// Path on the local filesystem.
    pub path: PathBuf,
    /// Name shown by the remote service.
    pub display_name: String,
    /// MIME type sent with the upload.
    pub mime_type: String,
}

impl InputArtifact {
    pub fn new(path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
            mime_type: "text/plain".to_string(),
        }
    }

    /// The code change under review.
    pub fn diff(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DIFF_DISPLAY_NAME)
    }

    /// The listing of test cases to score.
    pub fn test_cases(path: impl Into<PathBuf>) -> Self {
        Self::new(path, TEST_CASES_DISPLAY_NAME)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum FileState {
    /// Upload accepted, not usable yet.
    Processing,
    /// Ready to be referenced by a generation request.
    Active,
    /// Processing failed remotely.
    Failed,
    #[default]
    Unspecified,
    /// Anything the service reports that we don't know about.
    Other(String),
}

impl FileState {
    pub fn is_processing(&self) -> bool {
        matches!(self, FileState::Processing)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FileState::Active)
    }
}

impl From<String> for FileState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            "STATE_UNSPECIFIED" | "" => FileState::Unspecified,
            _ => FileState::Other(s),
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::Processing => write!(f, "PROCESSING"),
            FileState::Active => write!(f, "ACTIVE"),
            FileState::Failed => write!(f, "FAILED"),
            FileState::Unspecified => write!(f, "STATE_UNSPECIFIED"),
            FileState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Remote handle for an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// URI used to reference the file from a generation request.
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: FileState,
}

impl UploadedFile {
    /// Label for progress and error output.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Scores assigned to one test case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub relevance: f64,
    pub complexity: f64,
}

/// One record of the list-shaped model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseAnalysis {
    pub test_id: String,
    pub relevance: f64,
    pub complexity: f64,
}

impl TestCaseAnalysis {
    /// Split into the output key and its value.
    pub fn into_entry(self) -> (String, Scores) {
        (
            self.test_id,
            Scores {
                relevance: self.relevance,
                complexity: self.complexity,
            },
        )
    }
}

/// Test identifier to scores. Sorted so repeated runs serialize identically.
pub type ResultMapping = BTreeMap<String, Scores>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_state_from_wire() {
        assert_eq!(FileState::from("PROCESSING".to_string()), FileState::Processing);
        assert_eq!(FileState::from("ACTIVE".to_string()), FileState::Active);
        assert_eq!(FileState::from("FAILED".to_string()), FileState::Failed);
        assert_eq!(
            FileState::from("STATE_UNSPECIFIED".to_string()),
            FileState::Unspecified
        );
        assert_eq!(
            FileState::from("ARCHIVED".to_string()),
            FileState::Other("ARCHIVED".to_string())
        );
        assert_eq!(FileState::Other("ARCHIVED".to_string()).to_string(), "ARCHIVED");
    }

    #[test]
    fn test_uploaded_file_deserialize() {
        let json = r#"{
            "name": "files/abc123",
            "displayName": "Git Diff",
            "mimeType": "text/plain",
            "sizeBytes": "42",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "state": "PROCESSING"
        }"#;
        let file: UploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.name, "files/abc123");
        assert_eq!(file.label(), "Git Diff");
        assert!(file.state.is_processing());
    }

    #[test]
    fn test_uploaded_file_missing_state() {
        let file: UploadedFile = serde_json::from_str(r#"{"name": "files/x"}"#).unwrap();
        assert_eq!(file.state, FileState::Unspecified);
        assert_eq!(file.label(), "files/x");
    }

    #[test]
    fn test_analysis_into_entry() {
        let analysis = TestCaseAnalysis {
            test_id: "TC001".to_string(),
            relevance: 0.9,
            complexity: 0.5,
        };
        let (id, scores) = analysis.into_entry();
        assert_eq!(id, "TC001");
        assert_eq!(
            scores,
            Scores {
                relevance: 0.9,
                complexity: 0.5
            }
        );
    }

    #[test]
    fn test_input_artifact_names() {
        let diff = InputArtifact::diff("dff.txt");
        assert_eq!(diff.display_name, "Git Diff");
        assert_eq!(diff.mime_type, "text/plain");
        assert_eq!(InputArtifact::test_cases("t.txt").display_name, "Test Cases");
    }
}

//! Remote inference service boundary.
//!
//! The runner only talks to the service through [`InferenceService`], so
//! the Gemini client can be swapped for a recording stub in tests.

pub mod gemini;
#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AnalysisError;
use crate::models::{InputArtifact, UploadedFile};

pub use gemini::{GeminiClient, GeminiConfig};

/// One structured-output generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Uploaded files, in the order they are referenced.
    pub files: Vec<UploadedFile>,
    /// Natural-language instruction placed after the files.
    pub instruction: String,
    /// JSON Schema the response must conform to.
    pub schema: Value,
}

/// Operations consumed from the remote service.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Upload an artifact's contents under its display name.
    async fn upload(
        &self,
        artifact: &InputArtifact,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, AnalysisError>;

    /// Fetch the current handle (and processing state) of an uploaded file.
    async fn get_file(&self, name: &str) -> Result<UploadedFile, AnalysisError>;

    /// Issue a generation request and return the raw JSON text of the answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError>;
}

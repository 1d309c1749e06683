//! Recording stub of the inference service for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{GenerationRequest, InferenceService};
use crate::error::AnalysisError;
use crate::models::{FileState, InputArtifact, UploadedFile};

/// A call made against the stub.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload { display_name: String, bytes: usize },
    GetFile(String),
    Generate { files: Vec<String>, instruction: String },
}

/// Deterministic in-memory service.
///
/// Uploads are named `files/<n>` in upload order. Each file walks through
/// its configured state sequence, repeating the last state once exhausted.
#[derive(Default)]
pub struct StubService {
    states: Mutex<HashMap<String, Vec<FileState>>>,
    response: String,
    fail_upload: bool,
    fail_generate: bool,
    calls: Mutex<Vec<Call>>,
}

impl StubService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, name: &str, states: Vec<FileState>) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert(name.to_string(), states);
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn failing_generate(mut self) -> Self {
        self.fail_generate = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_checks(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetFile(n) if n == name))
            .count()
    }

    pub fn generate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Generate { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn handle(&self, name: &str, display_name: Option<String>, state: FileState) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            display_name,
            mime_type: Some("text/plain".to_string()),
            uri: format!("https://stub.test/v1beta/{}", name),
            state,
        }
    }
}

#[async_trait]
impl InferenceService for StubService {
    async fn upload(
        &self,
        artifact: &InputArtifact,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, AnalysisError> {
        self.record(Call::Upload {
            display_name: artifact.display_name.clone(),
            bytes: contents.len(),
        });
        if self.fail_upload {
            return Err(AnalysisError::transport("upload", "stub upload failure"));
        }

        let uploads = self
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Upload { .. }))
            .count();
        let name = format!("files/{}", uploads);
        Ok(self.handle(&name, Some(artifact.display_name.clone()), FileState::Processing))
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile, AnalysisError> {
        self.record(Call::GetFile(name.to_string()));

        let mut states = self.states.lock().unwrap();
        let state = match states.get_mut(name) {
            Some(seq) if seq.len() > 1 => seq.remove(0),
            Some(seq) => seq.first().cloned().unwrap_or(FileState::Active),
            None => FileState::Active,
        };
        Ok(self.handle(name, None, state))
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        self.record(Call::Generate {
            files: request.files.iter().map(|f| f.name.clone()).collect(),
            instruction: request.instruction.clone(),
        });
        if self.fail_generate {
            return Err(AnalysisError::transport("generation", "stub generation failure"));
        }
        Ok(self.response.clone())
    }
}

//! Gemini API client.
//!
//! Implements the three operations the runner needs on top of the public
//! REST surface: the resumable Files API upload, `files.get`, and
//! `models.generateContent` with a JSON response schema.

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{GenerationRequest, InferenceService};
use crate::error::AnalysisError;
use crate::models::{InputArtifact, UploadedFile};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Connection settings for the Gemini API.
#[derive(Debug)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub api_base: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl GeminiConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 600,
        }
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_json_schema: Value,
}

/// `generateContent` response body (the fields we read).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Upload response envelope.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        info!(
            "Initializing Gemini client for model {} at {}",
            config.model, config.api_base
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AnalysisError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn send_error(&self, stage: &'static str, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::transport(
                stage,
                format!("request timed out after {}s", self.config.timeout_seconds),
            )
        } else if e.is_connect() {
            AnalysisError::transport(
                stage,
                format!("cannot connect to {}", self.config.api_base),
            )
        } else {
            AnalysisError::transport(stage, format!("failed to send request: {}", e))
        }
    }

    /// Turn a non-2xx response into a transport error carrying the body.
    async fn check_status(
        stage: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AnalysisError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AnalysisError::transport(
            stage,
            format!("Gemini API error {}: {}", status, body),
        ))
    }
}

#[async_trait]
impl InferenceService for GeminiClient {
    async fn upload(
        &self,
        artifact: &InputArtifact,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, AnalysisError> {
        const STAGE: &str = "upload";
        let start_url = format!("{}/upload/v1beta/files", self.api_base());
        debug!(
            "Starting resumable upload of {} ({} bytes)",
            artifact.path.display(),
            contents.len()
        );

        let response = self
            .http_client
            .post(&start_url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", contents.len())
            .header("X-Goog-Upload-Header-Content-Type", &artifact.mime_type)
            .json(&json!({ "file": { "display_name": artifact.display_name } }))
            .send()
            .await
            .map_err(|e| self.send_error(STAGE, e))?;
        let response = Self::check_status(STAGE, response).await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AnalysisError::transport(STAGE, "upload URL missing from response"))?;

        let response = self
            .http_client
            .post(&upload_url)
            .header(CONTENT_LENGTH, contents.len())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(contents)
            .send()
            .await
            .map_err(|e| self.send_error(STAGE, e))?;
        let response = Self::check_status(STAGE, response).await?;

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            AnalysisError::transport(STAGE, format!("failed to parse upload response: {}", e))
        })?;

        info!("Uploaded {} as {}", artifact.display_name, uploaded.file.name);
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile, AnalysisError> {
        const STAGE: &str = "status check";
        let url = format!("{}/v1beta/{}", self.api_base(), name);

        let response = self
            .http_client
            .get(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| self.send_error(STAGE, e))?;
        let response = Self::check_status(STAGE, response).await?;

        response.json().await.map_err(|e| {
            AnalysisError::transport(STAGE, format!("failed to parse file metadata: {}", e))
        })
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        const STAGE: &str = "generation";
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base(),
            self.config.model
        );
        let body = build_generate_body(request);

        debug!(
            "Sending generateContent with {} file(s)",
            request.files.len()
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(STAGE, e))?;
        let response = Self::check_status(STAGE, response).await?;

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AnalysisError::transport(STAGE, format!("failed to parse Gemini response: {}", e))
        })?;

        extract_text(parsed)
    }
}

fn build_generate_body(request: &GenerationRequest) -> GenerateContentRequest {
    let mut parts: Vec<Part> = request
        .files
        .iter()
        .map(|f| Part {
            text: None,
            file_data: Some(FileData {
                mime_type: f
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "text/plain".to_string()),
                file_uri: f.uri.clone(),
            }),
        })
        .collect();
    parts.push(Part {
        text: Some(request.instruction.clone()),
        file_data: None,
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_json_schema: request.schema.clone(),
        },
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A response without any candidate text was received but cannot be read
/// under the schema, so it is a schema error rather than a transport one.
fn extract_text(response: GenerateContentResponse) -> Result<String, AnalysisError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(AnalysisError::schema(format!(
            "model returned no answer ({})",
            reason
        )));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AnalysisError::schema(format!(
            "model returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

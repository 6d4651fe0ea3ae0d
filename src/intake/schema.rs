use super::gatekeeper::IntakeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An inbound file submission, before validation.
///
/// `size` is the size the caller declared, which is what the gatekeeper
/// checks; for HTTP uploads it is the length of the received payload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub payload: Option<Vec<u8>>,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub source: Option<String>,
}

impl UploadRequest {
    /// Build a request whose declared size is the payload length.
    pub fn from_bytes(filename: &str, mime_type: &str, payload: Vec<u8>) -> Self {
        Self {
            size: payload.len() as u64,
            payload: Some(payload),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Lifecycle of an accepted document as it moves through processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Uploaded => "uploaded",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown processing status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ProcessingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(ProcessingStatus::Uploaded),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "error" => Ok(ProcessingStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The record synthesized for an accepted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub source: String,
    pub status: ProcessingStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// Serializable outcome of a gatekeeper evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum UploadDecision {
    Accepted { record: UploadRecord },
    Rejected { kind: String, reason: String },
}

impl UploadDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadDecision::Accepted { .. })
    }
}

impl From<Result<UploadRecord, IntakeError>> for UploadDecision {
    fn from(result: Result<UploadRecord, IntakeError>) -> Self {
        match result {
            Ok(record) => UploadDecision::Accepted { record },
            Err(err) => UploadDecision::Rejected {
                kind: err.kind().to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Text to classify. `metadata` is carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationInput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ClassificationInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Step function over the match score: >2 is high, >1 is medium.
    pub fn from_score(score: usize) -> Self {
        if score > 2 {
            Priority::High
        } else if score > 1 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: String,
    pub confidence: f64,
    pub subcategories: Vec<String>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub match_score: usize,
}

/// A document as persisted in the metadata index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub source: String,
    pub status: ProcessingStatus,
    pub uploaded_at: DateTime<Utc>,
    pub blob_path: Option<String>,
    pub extracted_text: Option<String>,
    pub classification: Option<ClassificationResult>,
    pub error: Option<String>,
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentRecord>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

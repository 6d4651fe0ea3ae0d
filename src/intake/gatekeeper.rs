use super::schema::{ProcessingStatus, UploadRecord, UploadRequest};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

/// Default upload ceiling: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Source label recorded when the caller supplies none.
pub const DEFAULT_SOURCE: &str = "local";

/// MIME types accepted for intake unless configuration says otherwise.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
    "image/png",
    "image/jpeg",
    "image/tiff",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("no file provided")]
    MissingPayload,

    #[error("file type not supported: {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("file size {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },
}

impl IntakeError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::MissingPayload => "MissingPayload",
            IntakeError::UnsupportedType { .. } => "UnsupportedType",
            IntakeError::PayloadTooLarge { .. } => "PayloadTooLarge",
        }
    }
}

/// Decides whether an upload may enter the processing pipeline.
///
/// Rules run in a fixed order (presence, type, size) and the first
/// violation is reported. Evaluation has no side effects apart from
/// generating the record identifier.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    allowed_types: Vec<String>,
    max_upload_bytes: u64,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_TYPES.iter().copied(), DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl Gatekeeper {
    pub fn new<I, S>(allowed_types: I, max_upload_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_types: allowed_types
                .into_iter()
                .map(|t| normalize_mime(t.as_ref()))
                .collect(),
            max_upload_bytes,
        }
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Whether `mime_type` is on the allow-list. Parameters such as
    /// `; charset=utf-8` and letter case are ignored.
    pub fn is_allowed(&self, mime_type: &str) -> bool {
        let mime = normalize_mime(mime_type);
        self.allowed_types.iter().any(|allowed| *allowed == mime)
    }

    pub fn evaluate(&self, request: &UploadRequest) -> Result<UploadRecord, IntakeError> {
        match request.payload.as_deref() {
            Some(bytes) if !bytes.is_empty() => {}
            _ => return Err(IntakeError::MissingPayload),
        }

        if !self.is_allowed(&request.mime_type) {
            return Err(IntakeError::UnsupportedType {
                mime_type: request.mime_type.clone(),
            });
        }

        if request.size > self.max_upload_bytes {
            return Err(IntakeError::PayloadTooLarge {
                size: request.size,
                limit: self.max_upload_bytes,
            });
        }

        let source = request
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
            .to_string();

        Ok(UploadRecord {
            id: new_upload_id(),
            filename: request.filename.clone(),
            size: request.size,
            mime_type: request.mime_type.clone(),
            source,
            status: ProcessingStatus::Uploaded,
            uploaded_at: Utc::now(),
        })
    }
}

/// 122 random bits as 32 lowercase hex characters.
fn new_upload_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::schema::UploadDecision;
    use std::collections::HashSet;

    fn request(mime: &str, size: u64) -> UploadRequest {
        UploadRequest {
            payload: Some(vec![0u8; 16]),
            filename: "report.pdf".to_string(),
            mime_type: mime.to_string(),
            size,
            source: None,
        }
    }

    #[test]
    fn accepts_every_default_type() {
        let gatekeeper = Gatekeeper::default();
        for mime in DEFAULT_ALLOWED_TYPES {
            let record = gatekeeper.evaluate(&request(mime, 1024)).unwrap();
            assert!(!record.id.is_empty());
            assert_eq!(record.mime_type, *mime);
            assert_eq!(record.status, ProcessingStatus::Uploaded);
        }
    }

    #[test]
    fn identifiers_are_unique_and_alphanumeric() {
        let gatekeeper = Gatekeeper::default();
        let req = request("application/pdf", 10);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = gatekeeper.evaluate(&req).unwrap().id;
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn rejects_zip_regardless_of_size() {
        let gatekeeper = Gatekeeper::default();
        for size in [1, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MAX_UPLOAD_BYTES + 1] {
            let err = gatekeeper
                .evaluate(&request("application/zip", size))
                .unwrap_err();
            assert_eq!(err.kind(), "UnsupportedType");
        }
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let gatekeeper = Gatekeeper::default();
        let limit = 50 * 1024 * 1024;

        assert!(gatekeeper.evaluate(&request("image/png", limit)).is_ok());

        let err = gatekeeper
            .evaluate(&request("image/png", limit + 1))
            .unwrap_err();
        assert_eq!(
            err,
            IntakeError::PayloadTooLarge {
                size: limit + 1,
                limit
            }
        );
    }

    #[test]
    fn missing_payload_is_checked_first() {
        let gatekeeper = Gatekeeper::default();

        let mut req = request("application/zip", DEFAULT_MAX_UPLOAD_BYTES + 1);
        req.payload = None;
        assert_eq!(gatekeeper.evaluate(&req), Err(IntakeError::MissingPayload));

        req.payload = Some(Vec::new());
        assert_eq!(gatekeeper.evaluate(&req), Err(IntakeError::MissingPayload));
    }

    #[test]
    fn type_is_checked_before_size() {
        let gatekeeper = Gatekeeper::default();
        let err = gatekeeper
            .evaluate(&request("video/mp4", DEFAULT_MAX_UPLOAD_BYTES * 2))
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedType");
    }

    #[test]
    fn source_defaults_to_local() {
        let gatekeeper = Gatekeeper::default();

        let record = gatekeeper.evaluate(&request("text/csv", 3)).unwrap();
        assert_eq!(record.source, "local");

        let mut req = request("text/csv", 3);
        req.source = Some("   ".to_string());
        assert_eq!(gatekeeper.evaluate(&req).unwrap().source, "local");

        let req = request("text/csv", 3).with_source(" email ");
        assert_eq!(gatekeeper.evaluate(&req).unwrap().source, "email");
    }

    #[test]
    fn mime_parameters_and_case_are_ignored() {
        let gatekeeper = Gatekeeper::default();
        assert!(gatekeeper.is_allowed("text/csv; charset=utf-8"));
        assert!(gatekeeper.is_allowed("Image/PNG"));
        assert!(!gatekeeper.is_allowed("text/plain"));
    }

    #[test]
    fn custom_allow_list_and_ceiling() {
        let gatekeeper = Gatekeeper::new(["text/plain"], 8);
        assert!(gatekeeper.evaluate(&request("text/plain", 8)).is_ok());
        assert_eq!(
            gatekeeper.evaluate(&request("application/pdf", 8)).unwrap_err().kind(),
            "UnsupportedType"
        );
        assert_eq!(
            gatekeeper.evaluate(&request("text/plain", 9)).unwrap_err().kind(),
            "PayloadTooLarge"
        );
    }

    #[test]
    fn decision_carries_record_only_when_accepted() {
        let gatekeeper = Gatekeeper::default();

        let accepted = UploadDecision::from(gatekeeper.evaluate(&request("image/jpeg", 5)));
        assert!(accepted.is_accepted());

        let rejected = UploadDecision::from(gatekeeper.evaluate(&request("application/zip", 5)));
        match rejected {
            UploadDecision::Rejected { kind, reason } => {
                assert_eq!(kind, "UnsupportedType");
                assert!(reason.contains("application/zip"));
            }
            UploadDecision::Accepted { .. } => panic!("zip must be rejected"),
        }
    }
}

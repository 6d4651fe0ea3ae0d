use super::classify::Classifier;
use super::extract::extract_text;
use super::gatekeeper::{Gatekeeper, IntakeError};
use super::index::DocumentIndex;
use super::schema::{DocumentRecord, ProcessingStatus, UploadRecord, UploadRequest};
use super::storage::FileStorage;
use anyhow::{anyhow, Result};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rejected(#[from] IntakeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Rejected(err) => err.kind(),
            PipelineError::Internal(_) => "InternalError",
        }
    }
}

/// An accepted upload together with its processed document.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: UploadRecord,
    pub document: DocumentRecord,
}

/// Drives an upload from validation to a classified, indexed document:
/// gatekeeper, index (`uploaded`), blob store, extraction, classification,
/// index (`completed`). A failure once the row exists leaves the document in
/// `error` and removes any blob already written.
pub struct Pipeline {
    gatekeeper: Gatekeeper,
    classifier: Classifier,
    storage: FileStorage,
    index: DocumentIndex,
}

impl Pipeline {
    pub fn new(
        gatekeeper: Gatekeeper,
        classifier: Classifier,
        storage: FileStorage,
        index: DocumentIndex,
    ) -> Self {
        Self {
            gatekeeper,
            classifier,
            storage,
            index,
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub async fn ingest(&self, request: UploadRequest) -> Result<Ingested, PipelineError> {
        let record = match self.gatekeeper.evaluate(&request) {
            Ok(record) => record,
            Err(err) => {
                tracing::info!(
                    filename = %request.filename,
                    mime_type = %request.mime_type,
                    size = request.size,
                    "upload rejected: {err}"
                );
                return Err(err.into());
            }
        };
        tracing::info!(
            id = %record.id,
            filename = %record.filename,
            size = record.size,
            source = %record.source,
            "upload accepted"
        );

        if let Err(err) = self.index.insert(&record) {
            tracing::error!(id = %record.id, "could not index upload: {err:#}");
            return Err(err.into());
        }

        let payload = request.payload.unwrap_or_default();
        let blob_path = match self
            .storage
            .store(&record.id, &record.filename, &payload)
            .await
        {
            Ok((blob_path, _)) => blob_path,
            Err(err) => return Err(self.abandon(&record, None, err).await),
        };

        match self.process(&record, &blob_path, &payload) {
            Ok(document) => Ok(Ingested { record, document }),
            Err(err) => Err(self.abandon(&record, Some(&blob_path), err).await),
        }
    }

    /// Record a post-acceptance failure: drop the blob, mark the row `error`.
    async fn abandon(
        &self,
        record: &UploadRecord,
        blob_path: Option<&str>,
        err: anyhow::Error,
    ) -> PipelineError {
        tracing::error!(id = %record.id, "processing failed: {err:#}");
        if let Some(blob_path) = blob_path {
            if let Err(delete_err) = self.storage.delete(blob_path).await {
                tracing::warn!(id = %record.id, blob_path, "could not remove blob: {delete_err:#}");
            }
        }
        if let Err(mark_err) = self.index.fail(&record.id, &format!("{err:#}")) {
            tracing::warn!(id = %record.id, "could not record failure: {mark_err:#}");
        }
        err.into()
    }

    fn process(
        &self,
        record: &UploadRecord,
        blob_path: &str,
        payload: &[u8],
    ) -> Result<DocumentRecord> {
        self.index.set_blob_path(&record.id, blob_path)?;
        self.index.set_status(&record.id, ProcessingStatus::Processing)?;

        let text = extract_text(payload, &record.mime_type);
        let classification = match text.as_deref() {
            Some(text) => match self.classifier.classify_text(text) {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::debug!(id = %record.id, "skipping classification: {err}");
                    None
                }
            },
            None => {
                tracing::debug!(id = %record.id, mime_type = %record.mime_type, "no extractable text");
                None
            }
        };

        self.index
            .complete(&record.id, text.as_deref(), classification.as_ref())?;

        if let Some(result) = &classification {
            tracing::info!(
                id = %record.id,
                category = %result.category,
                priority = ?result.priority,
                "document classified"
            );
        }

        self.index
            .get(&record.id)?
            .ok_or_else(|| anyhow!("document {} missing from index after processing", record.id))
    }
}

//! Document intake
//!
//! Validates uploads, stores accepted payloads, extracts text, assigns a
//! department category and keeps a searchable metadata index.

pub mod classify;
pub mod extract;
pub mod gatekeeper;
pub mod index;
pub mod pipeline;
pub mod schema;
pub mod storage;

pub use classify::{Category, Classifier, ClassifyError, Taxonomy, TaxonomyError, GENERAL_CATEGORY};
pub use gatekeeper::{Gatekeeper, IntakeError, DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_UPLOAD_BYTES};
pub use index::DocumentIndex;
pub use pipeline::{Ingested, Pipeline, PipelineError};
pub use schema::{
    ClassificationInput, ClassificationResult, DocumentRecord, Priority, ProcessingStatus,
    UploadDecision, UploadRecord, UploadRequest,
};
pub use storage::FileStorage;

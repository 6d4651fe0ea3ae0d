//! HTTP binding for intake and classification.
//!
//! - `POST /uploads`: multipart `file` plus optional `source`
//! - `POST /classification`: JSON `{ text, metadata? }`
//! - `GET  /documents`: paginated list (`offset`, `limit`, `category`), or a
//!   keyword search when `q` is given
//! - `GET  /documents/{id}`: one document
//! - `GET  /health`

use crate::config::Config;
use crate::intake::classify::{Classifier, ClassifyError};
use crate::intake::extract::guess_mime_type;
use crate::intake::gatekeeper::IntakeError;
use crate::intake::index::DocumentIndex;
use crate::intake::pipeline::{Pipeline, PipelineError};
use crate::intake::schema::{
    ClassificationInput, ClassificationResult, DocumentListResponse, DocumentRecord, Priority,
    ProcessingStatus, UploadRecord, UploadRequest,
};
use crate::intake::storage::FileStorage;
use anyhow::{Context, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Room for multipart boundaries and headers on top of the upload ceiling.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Error body shared by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Length-limit failures surface mid-stream when the body has no
    /// `Content-Length`; they keep their 413.
    fn multipart(err: MultipartError, context: &str) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLarge",
                format!("{context}: request body too large"),
            )
        } else {
            Self::new(StatusCode::BAD_REQUEST, "InvalidBody", format!("{context}: {err}"))
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!("request failed: {err:#}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            "internal error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.kind(), err.to_string())
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.kind(), err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Rejected(err) => err.into(),
            PipelineError::Internal(err) => Self::internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

/// Processing outcome attached to the acceptance record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub processing_status: ProcessingStatus,
    pub extracted_text: Option<String>,
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
}

impl From<DocumentRecord> for ProcessingMetadata {
    fn from(doc: DocumentRecord) -> Self {
        let (category, confidence, priority, tags) = match doc.classification {
            Some(c) => (Some(c.category), Some(c.confidence), Some(c.priority), c.tags),
            None => (None, None, None, Vec::new()),
        };
        Self {
            processing_status: doc.status,
            extracted_text: doc.extracted_text,
            category,
            confidence,
            priority,
            tags,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub record: UploadRecord,
    pub metadata: ProcessingMetadata,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub category: Option<String>,
    pub q: Option<String>,
}

/// Build the router. The body limit follows the gatekeeper's ceiling.
pub fn router(pipeline: Arc<Pipeline>, request_timeout: Duration) -> Router {
    let body_limit = pipeline
        .gatekeeper()
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handle_health))
        .route("/uploads", post(handle_upload))
        .route("/classification", post(handle_classification))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}", get(handle_get_document))
        .with_state(AppState { pipeline })
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Assemble the pipeline from config.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let taxonomy = config.taxonomy().context("Invalid classifier taxonomy")?;
    let index = DocumentIndex::open(&config.data_dir())?;
    let storage = FileStorage::new(&config.blob_dir().display().to_string());
    Ok(Pipeline::new(
        config.gatekeeper(),
        Classifier::new(taxonomy),
        storage,
        index,
    ))
}

pub async fn serve(config: Config) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&config)?);
    let app = router(
        pipeline,
        Duration::from_secs(config.gateway.request_timeout_secs),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("HTTP gateway listening on {}", addr);
    tracing::info!(data_dir = %config.data_dir().display(), "serving documents");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart(e, "invalid multipart body"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| guess_mime_type(&filename));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::multipart(e, "failed to read file"))?;
                request.size = bytes.len() as u64;
                request.payload = Some(bytes.to_vec());
                request.filename = filename;
                request.mime_type = mime_type;
            }
            Some("source") => {
                let source = field
                    .text()
                    .await
                    .map_err(|e| ApiError::multipart(e, "failed to read source"))?;
                request.source = Some(source);
            }
            _ => {}
        }
    }

    let ingested = state.pipeline.ingest(request).await?;
    Ok(Json(UploadResponse {
        record: ingested.record,
        metadata: ingested.document.into(),
    }))
}

async fn handle_classification(
    State(state): State<AppState>,
    payload: Result<Json<ClassificationInput>, JsonRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let Json(input) = payload.map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, "InvalidBody", e.body_text())
    })?;
    let result = state.pipeline.classifier().classify(&input)?;
    Ok(Json(result))
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let category = params.category.as_deref();
    let index = state.pipeline.index();
    let list = match params.q.as_deref() {
        Some(query) => index.search(query, category, offset, limit)?,
        None => index.list(offset, limit, category)?,
    };
    Ok(Json(list))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    match state.pipeline.index().get(&id)? {
        Some(doc) => Ok(Json(doc)),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("document {id} not found"),
        )),
    }
}

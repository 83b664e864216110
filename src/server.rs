//! HTTP API.
//!
//! # Endpoints
//!
//! - `POST /api/upload/`, `POST /api/notebooks/` - upload and convert a notebook
//! - `GET /api/notebooks/` - list records
//! - `GET /api/notebooks/:id/` - one record; `DELETE` removes it and its files
//! - `GET /api/notebooks/:id/status/`, `GET /api/conversion-status/:id/` - status only
//! - `GET /api/health` - liveness
//! - `GET /media/*` - stored notebooks and PDFs
//!
//! # Uploads
//!
//! `multipart/form-data` with a `notebook_file` file part and an
//! `original_filename` text part. Both are required:
//!
//! ```bash
//! curl -F notebook_file=@analysis.ipynb -F original_filename=analysis.ipynb \
//!   http://127.0.0.1:8000/api/upload/
//! ```
//!
//! Conversion runs inside the request; the `201` response already carries
//! the final `completed` record.
//!
//! # Errors
//!
//! | Case | Status | Body |
//! |------|--------|------|
//! | Validation | 400 | `{"<field>": ["<message>"]}` |
//! | Unknown id | 404 | `{"detail": "Not found."}` |
//! | Conversion failed | 500 | `{"error": "Failed to start conversion", "details": "..."}` |

use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::media::MediaStorage;
use crate::service::{ConversionService, FIELD_FILE, FIELD_NAME};
use crate::store::{ConversionStatus, NotebookRecord};
use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub type AppState = Arc<ConversionService>;

/// Build the application router around a service.
pub fn app(service: AppState) -> Router {
    // Leave headroom above the upload limit so an oversize file reaches
    // validation and gets a field error instead of a bare 413.
    let body_limit = (service.max_upload_bytes() + 1024 * 1024) as usize;
    let media = ServeDir::new(service.media().root());
    let media_url = service.media().url_prefix().to_string();

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/upload/", post(upload))
        .route("/api/notebooks/", get(list_records).post(upload))
        .route("/api/notebooks/:id/", get(get_record).delete(delete_record))
        .route("/api/notebooks/:id/status/", get(get_status))
        .route("/api/conversion-status/:id/", get(get_status))
        .nest_service(&media_url, media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> Result<(), ServiceError> {
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .map_err(|e| ServiceError::storage(&config.media_root, e))?;
    let service = Arc::new(ConversionService::from_config(&config).await?);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| ServiceError::Internal(format!("Cannot bind {}: {e}", config.bind_addr)))?;
    info!(
        "Listening on http://{} (media: {}, limit {} MB)",
        config.bind_addr,
        config.media_root.display(),
        config.max_upload_mb
    );

    axum::serve(listener, app(service))
        .await
        .map_err(|e| ServiceError::Internal(format!("Server error: {e}")))
}

// ── Views ────────────────────────────────────────────────────────────────

/// Full record as returned by the record endpoints.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: u64,
    pub original_filename: String,
    pub notebook_file: String,
    pub pdf_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub status: ConversionStatus,
    pub error_message: Option<String>,
    pub pdf_url: Option<String>,
}

impl RecordView {
    pub fn new(record: NotebookRecord, media: &MediaStorage) -> Self {
        let pdf_url = record.pdf_file.as_deref().map(|p| media.url(p));
        Self {
            id: record.id,
            original_filename: record.original_filename,
            notebook_file: media.url(&record.notebook_file),
            pdf_file: pdf_url.clone(),
            created_at: record.created_at,
            converted_at: record.converted_at,
            status: record.status,
            error_message: record.error_message,
            pdf_url,
        }
    }
}

/// Status-only view.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub id: u64,
    pub status: ConversionStatus,
    pub error_message: Option<String>,
    pub pdf_url: Option<String>,
}

impl StatusView {
    pub fn new(record: NotebookRecord, media: &MediaStorage) -> Self {
        Self {
            id: record.id,
            status: record.status,
            pdf_url: record.pdf_file.as_deref().map(|p| media.url(p)),
            error_message: record.error_message,
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// The multipart body itself could not be read.
    BadRequest { status: StatusCode, message: String },
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest { status, message } => (status, json!({ "detail": message })),
            ApiError::Service(err) => match err {
                ServiceError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
                }
                ServiceError::Validation { field, message } => {
                    (StatusCode::BAD_REQUEST, json!({ field: [message] }))
                }
                ServiceError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, json!({ "detail": err.to_string() }))
                }
                ServiceError::ConversionStart(inner) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to start conversion", "details": inner.to_string() }),
                ),
                other => {
                    warn!("Request failed: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "detail": other.to_string() }),
                    )
                }
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Ids are integers; anything else cannot name a record.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .map_err(|_| ApiError::Service(ServiceError::NotFound { id: 0 }))
}

// ── Handlers ─────────────────────────────────────────────────────────────

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    original_filename: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        file_name: None,
        bytes: None,
        original_filename: None,
    };

    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest {
        status: e.status(),
        message: e.body_text(),
    };

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        match field.name() {
            Some(FIELD_FILE) => {
                form.file_name = Some(field.file_name().unwrap_or_default().to_string());
                form.bytes = Some(field.bytes().await.map_err(bad)?.to_vec());
            }
            Some(FIELD_NAME) => {
                form.original_filename = Some(field.text().await.map_err(bad)?);
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn upload(
    State(service): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;

    let (Some(file_name), Some(bytes)) = (form.file_name, form.bytes) else {
        return Err(ServiceError::validation(FIELD_FILE, "No file was submitted.").into());
    };
    let original_filename = form.original_filename.unwrap_or_default();

    let record = service.upload(&original_filename, &file_name, &bytes).await?;
    let view = RecordView::new(record, service.media());
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub async fn list_records(State(service): State<AppState>) -> Json<Vec<RecordView>> {
    let media = service.media();
    Json(
        service
            .list()
            .await
            .into_iter()
            .map(|r| RecordView::new(r, media))
            .collect(),
    )
}

pub async fn get_record(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordView>, ApiError> {
    let record = service.get(parse_id(&id)?).await?;
    Ok(Json(RecordView::new(record, service.media())))
}

pub async fn delete_record(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_status(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let record = service.status(parse_id(&id)?).await?;
    Ok(Json(StatusView::new(record, service.media())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> NotebookRecord {
        NotebookRecord {
            id: 4,
            original_filename: "a.ipynb".into(),
            notebook_file: "notebooks/x.ipynb".into(),
            pdf_file: Some("pdfs/y.pdf".into()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            converted_at: None,
            status: ConversionStatus::Completed,
            error_message: None,
        }
    }

    #[test]
    fn record_view_uses_media_urls() {
        let media = MediaStorage::new("/srv/media", "/media");
        let v = serde_json::to_value(RecordView::new(record(), &media)).unwrap();
        assert_eq!(v["notebook_file"], "/media/notebooks/x.ipynb");
        assert_eq!(v["pdf_file"], "/media/pdfs/y.pdf");
        assert_eq!(v["pdf_url"], "/media/pdfs/y.pdf");
        assert_eq!(v["status"], "completed");
        assert_eq!(v["created_at"], "2024-01-02T03:04:05Z");
        assert!(v["converted_at"].is_null());
    }

    #[test]
    fn status_view_fields() {
        let media = MediaStorage::new("/srv/media", "/media");
        let v = serde_json::to_value(StatusView::new(record(), &media)).unwrap();
        let mut keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["error_message", "id", "pdf_url", "status"]);
    }

    #[test]
    fn non_numeric_id_is_not_found() {
        assert!(matches!(
            parse_id("abc"),
            Err(ApiError::Service(ServiceError::NotFound { .. }))
        ));
        assert_eq!(parse_id("12").ok(), Some(12));
    }
}

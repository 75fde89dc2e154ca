//! File HTTP Routes
//!
//! REST endpoints over the file flows, plus the public route that serves
//! blobs behind signed URLs.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{bearer_token, AuthError, Identity, JwtManager};
use crate::file_storage::deadline::within;
use crate::file_storage::signed_url::SIGNED_OBJECT_PATH;
use crate::file_storage::{
    ConsistencyWarning, DeleteOutcome, FileError, FileQuery, FileRecord, FileRef, FileService,
    SignedUrlSigner, StoreError, UploadRequest,
};
use crate::observability::{Event, Logger};

// ==================
// Shared State
// ==================

/// State shared across file handlers
pub struct StorageState {
    pub files: FileService,
    pub jwt: JwtManager,
    /// Verifies signed object links; must hold the Object Store's signing key
    pub signer: SignedUrlSigner,
}

impl StorageState {
    pub fn new(files: FileService, jwt: JwtManager, signer: SignedUrlSigner) -> Self {
        Self { files, jwt, signer }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct FilesListResponse {
    pub files: Vec<FileRecord>,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConsistencyWarning>,
}

#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// False when the record was already gone
    pub deleted: bool,
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ConsistencyWarning>,
}

#[derive(Debug, Deserialize)]
pub struct SignedObjectQuery {
    pub expires: i64,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ConsistencyWarning>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

// ==================
// Routes
// ==================

/// File management routes, nested under `/api/v1`
pub fn file_routes(state: Arc<StorageState>) -> Router {
    Router::new()
        .route("/files", post(upload_file_handler).get(list_files_handler))
        .route("/files/:id", get(get_file_handler).delete(delete_file_handler))
        .route("/files/:id/signed-url", post(create_signed_url_handler))
        .with_state(state)
}

/// Public route serving blobs to holders of a valid signed URL
pub fn signed_object_routes(state: Arc<StorageState>) -> Router {
    Router::new()
        .route(&format!("{}/*key", SIGNED_OBJECT_PATH), get(signed_object_handler))
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

fn error_response(code: u16, error: String, warning: Option<ConsistencyWarning>) -> ApiError {
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse {
            error,
            code,
            warning,
        }),
    )
}

fn file_error(e: FileError) -> ApiError {
    let warning = e.warning().cloned();
    error_response(e.status_code(), e.to_string(), warning)
}

fn auth_error(e: AuthError) -> ApiError {
    error_response(e.status_code(), e.to_string(), None)
}

fn bad_request(error: impl Into<String>) -> ApiError {
    error_response(400, error.into(), None)
}

/// Resolve the caller from the `Authorization: Bearer` header
fn identity_from_headers(state: &StorageState, headers: &HeaderMap) -> ApiResult<Identity> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| auth_error(AuthError::AuthenticationRequired))?
        .to_str()
        .map_err(|_| auth_error(AuthError::MalformedToken))?;

    let token = bearer_token(value).map_err(auth_error)?;
    state.jwt.identity_from_token(token).map_err(auth_error)
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| bad_request(format!("Invalid file id: {}", id)))
}

// ==================
// File Handlers
// ==================

async fn upload_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FileRecord>)> {
    let identity = identity_from_headers(&state, &headers)?;

    let mut file: Option<(String, String, Bytes)> = None;
    let mut project_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(e.status().as_u16(), e.body_text(), None))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(e.status().as_u16(), e.body_text(), None))?;
                file = Some((file_name, content_type, data));
            }
            Some("project_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| error_response(e.status().as_u16(), e.body_text(), None))?;
                project_id = Some(value);
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| bad_request("No file provided"))?;

    let record = state
        .files
        .upload()
        .upload(
            &identity,
            UploadRequest {
                display_name: &file_name,
                mime_type: &content_type,
                data: &data,
                project_id,
            },
        )
        .await
        .map_err(file_error)?;

    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_files_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> ApiResult<Json<FilesListResponse>> {
    let identity = identity_from_headers(&state, &headers)?;
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;

    let listing = state
        .files
        .listing()
        .list(&identity, query)
        .await
        .map_err(file_error)?;

    Ok(Json(FilesListResponse {
        total: listing.files.len(),
        files: listing.files,
        warnings: listing.warnings,
    }))
}

async fn get_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<FileRecord>> {
    let identity = identity_from_headers(&state, &headers)?;
    let id = parse_id(&id)?;

    let record = state
        .files
        .access()
        .resolve(&identity, FileRef::Id(id))
        .await
        .map_err(file_error)?;

    Ok(Json(record))
}

async fn create_signed_url_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<SignedUrlResponse>> {
    let identity = identity_from_headers(&state, &headers)?;
    let id = parse_id(&id)?;

    let download = state
        .files
        .access()
        .signed_download(&identity, FileRef::Id(id))
        .await
        .map_err(file_error)?;

    Ok(Json(SignedUrlResponse {
        url: download.url,
        expires_at: download.expires_at,
    }))
}

async fn delete_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let identity = identity_from_headers(&state, &headers)?;
    let id = parse_id(&id)?;

    let outcome = state
        .files
        .deletion()
        .delete(&identity, &id)
        .await
        .map_err(file_error)?;

    let response = match outcome {
        DeleteOutcome::Deleted { warning, .. } => DeleteResponse {
            deleted: true,
            id,
            warning,
        },
        DeleteOutcome::AlreadyAbsent => DeleteResponse {
            deleted: false,
            id,
            warning: None,
        },
    };
    Ok(Json(response))
}

// ==================
// Signed Object Handler
// ==================

async fn signed_object_handler(
    State(state): State<Arc<StorageState>>,
    Path(key): Path<String>,
    query: Result<Query<SignedObjectQuery>, QueryRejection>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 3], Bytes)> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    state
        .signer
        .verify(&key, query.expires, &query.token)
        .map_err(file_error)?;

    let stores = state.files.stores();
    let data = within(stores.call_timeout, stores.objects.get(&key))
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) | StoreError::InvalidKey(_) => {
                file_error(FileError::RecordNotFound(key.clone()))
            }
            other => error_response(502, other.to_string(), None),
        })?;

    // Content type and download name come from the metadata row when there is one
    let record = within(stores.call_timeout, stores.metadata.get_by_storage_key(&key))
        .await
        .ok()
        .flatten();
    let (content_type, file_name) = match record {
        Some(record) => (record.mime_type, record.display_name),
        None => (
            "application/octet-stream".to_string(),
            key.rsplit('/').next().unwrap_or("download").to_string(),
        ),
    };

    Logger::info(
        Event::SignedObjectServed,
        &[
            ("storage_key", key.as_str()),
            ("size_bytes", data.len().to_string().as_str()),
        ],
    );

    // Served as a download so uploaded markup never renders on this origin
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&file_name)),
        ],
        Bytes::from(data),
    ))
}

/// `Content-Disposition: attachment` with a quoted-string safe file name
fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            let keep = c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\');
            if keep {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

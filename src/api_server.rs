//! REST API server: routes authenticated requests to the orchestrator and
//! shapes its responses. Business logic lives in [`crate::orchestrator`];
//! this module only does request parsing, auth extraction, and response
//! formatting.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::error::DfsError;
use crate::orchestrator::ShardOrchestrator;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<ShardOrchestrator>,
    pub auth: Arc<AuthService>,
}

/// Maps the core error taxonomy (§7) to an HTTP status code and message.
impl IntoResponse for DfsError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            DfsError::AlreadyExists => (StatusCode::BAD_REQUEST, "File already exists".to_string()),
            DfsError::UsernameTaken => (StatusCode::CONFLICT, "Username already taken".to_string()),
            DfsError::NotFound => (StatusCode::NOT_FOUND, "File not found or shards missing".to_string()),
            DfsError::InvalidFilename(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            DfsError::Unrecoverable => (
                StatusCode::BAD_REQUEST,
                "Not enough shards to reconstruct the file".to_string(),
            ),
            DfsError::AuthFailure(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            DfsError::UploadFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        (status, message).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, DfsError> {
    headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| DfsError::AuthFailure("missing authorization header".to_string()))?
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| DfsError::AuthFailure("invalid authorization header".to_string()))
}

async fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<i64, DfsError> {
    let token = bearer_token(headers)?;
    state.auth.resolve_token(token)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i64,
}

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), DfsError> {
    let id = state.auth.register(&req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { id })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, DfsError> {
    let token = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

async fn upload_file(
    State(state): State<ApiState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, String), DfsError> {
    let owner_id = authenticate(&state, &headers).await?;

    let mut filename = None;
    let mut bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DfsError::Internal(format!("multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| DfsError::Internal(format!("multipart read error: {e}")))?,
            );
        }
    }
    let filename = filename.ok_or_else(|| DfsError::Internal("missing file field".to_string()))?;
    let bytes = bytes.ok_or_else(|| DfsError::Internal("missing file field".to_string()))?;

    state.orchestrator.upload(owner_id, &filename, &bytes).await?;
    Ok((StatusCode::OK, "File successfully encoded and stored".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: String,
}

async fn download_file(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<FilenameQuery>,
) -> Result<impl IntoResponse, DfsError> {
    let owner_id = authenticate(&state, &headers).await?;
    let bytes = state.orchestrator.retrieve(owner_id, &query.filename).await?;

    let content_disposition = format!("attachment; filename=\"{}\"", query.filename);
    let response_headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, content_disposition),
    ];
    Ok((response_headers, bytes))
}

async fn list_files(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<crate::orchestrator::FileListing>>, DfsError> {
    let owner_id = authenticate(&state, &headers).await?;
    Ok(Json(state.orchestrator.list(owner_id).await?))
}

async fn delete_file(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<FilenameQuery>,
) -> Result<(StatusCode, String), DfsError> {
    let owner_id = authenticate(&state, &headers).await?;
    state.orchestrator.delete(owner_id, &query.filename).await?;
    Ok((StatusCode::OK, "File deleted successfully".to_string()))
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/file", post(upload_file).get(download_file).delete(delete_file))
        .route("/file/list", get(list_files))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

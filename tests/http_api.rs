//! End-to-end HTTP surface tests: register, login, upload, list, download,
//! delete, and the degraded-read paths, all driven through the axum router
//! with an in-memory metadata store and temp-directory backends.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use shardmesh::api_server::{build_router, ApiState};
use shardmesh::auth::{AuthConfig, AuthService};
use shardmesh::backend::{BackendAdapter, FilesystemBackend};
use shardmesh::codec::TOTAL_SHARDS;
use shardmesh::database::{MetadataStore, SqliteMetadataStore};
use shardmesh::ShardOrchestrator;

struct Harness {
    app: axum::Router,
    backend_roots: Vec<std::path::PathBuf>,
}

async fn harness(tmp: &std::path::Path) -> Harness {
    let mut backends: Vec<Arc<dyn BackendAdapter>> = Vec::new();
    let mut backend_roots = Vec::new();
    for i in 0..TOTAL_SHARDS {
        let root = tmp.join(format!("loc-{i}"));
        backend_roots.push(root.clone());
        backends.push(Arc::new(FilesystemBackend::new(root).await.unwrap()));
    }
    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
    let orchestrator = Arc::new(
        ShardOrchestrator::new(backends, metadata.clone(), Duration::from_secs(5)).unwrap(),
    );
    let auth = Arc::new(AuthService::new(metadata, AuthConfig::default()));
    let app = build_router(ApiState { orchestrator, auth });
    Harness { app, backend_roots }
}

fn multipart_body(boundary: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn register_and_login(app: &axum::Router, username: &str) -> String {
    let creds = json!({"username": username, "password": "correct horse battery staple"}).to_string();
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(creds.clone()))
                .unwrap(),
        )
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(creds))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    value["token"].as_str().unwrap().to_string()
}

async fn upload(app: &axum::Router, token: &str, filename: &str, bytes: &[u8]) -> StatusCode {
    let boundary = "shardmesh-test-boundary";
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/file")
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(multipart_body(boundary, filename, bytes)))
                .unwrap(),
        )
        .await
        .unwrap();
    resp.status()
}

async fn download(app: &axum::Router, token: &str, filename: &str) -> (StatusCode, Vec<u8>) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/file?filename={filename}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn full_lifecycle_register_upload_list_download_delete() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let token = register_and_login(&harness.app, "carol").await;
    let payload = b"the quick brown fox jumps over the lazy dog".repeat(100);

    assert_eq!(upload(&harness.app, &token, "report.bin", &payload).await, StatusCode::OK);

    let list_resp = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/file/list")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(list_resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(list_resp.into_body(), usize::MAX).await.unwrap();
    let listing: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing[0]["original_filename"], "report.bin");
    assert_eq!(listing[0]["shards_retrievable"], TOTAL_SHARDS);

    let (status, bytes) = download(&harness.app, &token, "report.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, payload);

    let delete_resp = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/file?filename=report.bin")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), StatusCode::OK);

    let (status, _) = download(&harness.app, &token, "report.bin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let token = register_and_login(&harness.app, "dave").await;
    assert_eq!(upload(&harness.app, &token, "dup.bin", b"once").await, StatusCode::OK);
    assert_eq!(
        upload(&harness.app, &token, "dup.bin", b"twice").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn upload_with_path_traversal_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let token = register_and_login(&harness.app, "gina").await;

    assert_eq!(
        upload(&harness.app, &token, "../escape.bin", b"payload").await,
        StatusCode::BAD_REQUEST
    );

    assert!(!dir.path().parent().unwrap().join("escape.bin").exists());
}

#[tokio::test]
async fn download_self_heals_after_losing_one_data_shard() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let token = register_and_login(&harness.app, "erin").await;
    let payload = b"erasure coded payload data".repeat(50);
    assert_eq!(upload(&harness.app, &token, "shaky.bin", &payload).await, StatusCode::OK);

    // Drop every blob under the first backend location, simulating a lost
    // shard; two shards missing is still within the (4, 2) tolerance.
    let mut entries = tokio::fs::read_dir(&harness.backend_roots[0]).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        tokio::fs::remove_file(entry.path()).await.unwrap();
    }

    let (status, bytes) = download(&harness.app, &token, "shaky.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, payload);

    // The self-heal should have restored the missing blob.
    let mut entries = tokio::fs::read_dir(&harness.backend_roots[0]).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_some());
}

#[tokio::test]
async fn download_fails_once_unrecoverable() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let token = register_and_login(&harness.app, "frank").await;
    let payload = b"irrecoverable loss scenario".repeat(20);
    assert_eq!(upload(&harness.app, &token, "gone.bin", &payload).await, StatusCode::OK);

    for root in harness.backend_roots.iter().take(3) {
        let mut entries = tokio::fs::read_dir(root).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            tokio::fs::remove_file(entry.path()).await.unwrap();
        }
    }

    let (status, _) = download(&harness.app, &token, "gone.bin").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path()).await;
    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/file/list")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

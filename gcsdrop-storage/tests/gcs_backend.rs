//! GCS backend tests against a fake Cloud Storage JSON API
//!
//! The fake server understands the two calls the backend makes: metadata
//! lookups (`?fields=name`) and media downloads (`?alt=media`).

use axum::{
    body::{to_bytes, Body},
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::TryStreamExt;
use gcsdrop_storage::handlers::{download, DownloadState};
use gcsdrop_storage::storage::{locate, GcsStore, Lookup, ObjectStore, StorageError, TokenSource};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

const BUCKET: &str = "test-bucket";

#[derive(Default)]
struct FakeGcs {
    objects: HashMap<String, Bytes>,
    required_token: Option<String>,
    seen_paths: Mutex<Vec<String>>,
}

fn gcs_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message } })),
    )
        .into_response()
}

async fn object_handler(
    State(fake): State<Arc<FakeGcs>>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    fake.seen_paths.lock().push(uri.path().to_string());

    if let Some(token) = &fake.required_token {
        let expected = format!("Bearer {}", token);
        if headers.get(header::AUTHORIZATION).map(|v| v.as_bytes()) != Some(expected.as_bytes()) {
            return gcs_error(StatusCode::UNAUTHORIZED, "Anonymous caller does not have access");
        }
    }

    if bucket != BUCKET {
        return gcs_error(StatusCode::NOT_FOUND, "The specified bucket does not exist.");
    }
    if object.starts_with("forbidden") {
        return gcs_error(StatusCode::FORBIDDEN, "caller does not have storage.objects.get access");
    }
    if object.starts_with("flaky") {
        return gcs_error(StatusCode::SERVICE_UNAVAILABLE, "Backend Error");
    }

    let Some(data) = fake.objects.get(&object) else {
        return gcs_error(
            StatusCode::NOT_FOUND,
            &format!("No such object: {}/{}", bucket, object),
        );
    };

    match query.get("alt").map(String::as_str) {
        Some("media") => data.clone().into_response(),
        _ => Json(json!({ "name": object })).into_response(),
    }
}

/// Any other path answers like the listing and bucket resources do
async fn unrouted_handler(
    State(fake): State<Arc<FakeGcs>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    fake.seen_paths.lock().push(uri.path().to_string());
    let names: Vec<_> = fake.objects.keys().map(|name| json!({ "name": name })).collect();
    Json(json!({ "kind": "storage#objects", "items": names })).into_response()
}

async fn start_fake_gcs(fake: FakeGcs) -> (String, Arc<FakeGcs>) {
    let fake = Arc::new(fake);
    let router = Router::new()
        .route("/storage/v1/b/:bucket/o/:object", get(object_handler))
        .fallback(unrouted_handler)
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (endpoint, fake)
}

fn fake_with(objects: &[(&str, &'static [u8])]) -> FakeGcs {
    FakeGcs {
        objects: objects
            .iter()
            .map(|(k, v)| ((*k).to_string(), Bytes::from_static(v)))
            .collect(),
        ..Default::default()
    }
}

async fn read_all(store: &GcsStore, key: &str) -> Vec<u8> {
    let chunks: Vec<Bytes> = store.open(key).await.unwrap().try_collect().await.unwrap();
    chunks.concat()
}

#[tokio::test]
async fn test_exists_true_and_false() {
    let (endpoint, _fake) = start_fake_gcs(fake_with(&[("report.pdf", b"%PDF")])).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    assert!(store.exists("report.pdf").await.unwrap());
    assert!(!store.exists("missing.pdf").await.unwrap());
}

#[tokio::test]
async fn test_open_streams_media() {
    let (endpoint, _fake) = start_fake_gcs(fake_with(&[("blob.bin", b"\x00\x01\x02\xfe\xff")])).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    assert_eq!(read_all(&store, "blob.bin").await, b"\x00\x01\x02\xfe\xff");
}

#[tokio::test]
async fn test_open_missing_object() {
    let (endpoint, _fake) = start_fake_gcs(FakeGcs::default()).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    let result = store.open("missing").await;
    assert!(matches!(result, Err(StorageError::ObjectNotFound { .. })));
}

#[tokio::test]
async fn test_nested_key_is_single_encoded_segment() {
    let (endpoint, fake) = start_fake_gcs(fake_with(&[("docs/2024/a b.txt", b"nested")])).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    assert!(store.exists("docs/2024/a b.txt").await.unwrap());
    assert_eq!(read_all(&store, "docs/2024/a b.txt").await, b"nested");

    let paths = fake.seen_paths.lock().clone();
    assert!(paths
        .iter()
        .all(|p| p == "/storage/v1/b/test-bucket/o/docs%2F2024%2Fa%20b.txt"));
}

#[tokio::test]
async fn test_forbidden_is_access_denied() {
    let (endpoint, _fake) = start_fake_gcs(FakeGcs::default()).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    let err = store.exists("forbidden.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::AccessDenied { status: 403, .. }));
}

#[tokio::test]
async fn test_unexpected_status_is_backend_error() {
    let (endpoint, _fake) = start_fake_gcs(FakeGcs::default()).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    match store.exists("flaky.txt").await.unwrap_err() {
        StorageError::Backend { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Backend Error");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_bucket_is_an_error_not_absence() {
    let (endpoint, _fake) = start_fake_gcs(fake_with(&[("a.txt", b"a")])).await;
    let store = GcsStore::with_endpoint("no-such-bucket", endpoint, TokenSource::Anonymous);

    let err = store.exists("a.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidBucketName(_)));
}

#[tokio::test]
async fn test_empty_bucket_rejected_before_request() {
    let (endpoint, fake) = start_fake_gcs(FakeGcs::default()).await;
    let store = GcsStore::with_endpoint("", endpoint, TokenSource::Anonymous);

    assert!(matches!(
        store.exists("a.txt").await,
        Err(StorageError::InvalidBucketName(_))
    ));
    assert!(fake.seen_paths.lock().is_empty());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let fake = FakeGcs {
        required_token: Some("ya29.test".to_string()),
        ..fake_with(&[("secret.txt", b"classified")])
    };
    let (endpoint, _fake) = start_fake_gcs(fake).await;

    let anonymous = GcsStore::with_endpoint(BUCKET, endpoint.clone(), TokenSource::Anonymous);
    assert!(matches!(
        anonymous.exists("secret.txt").await,
        Err(StorageError::AccessDenied { status: 401, .. })
    ));

    let authed = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Static("ya29.test".to_string()));
    assert!(authed.exists("secret.txt").await.unwrap());
    assert_eq!(read_all(&authed, "secret.txt").await, b"classified");
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);
    let err = store.exists("a.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::Transport(_)));
}

#[tokio::test]
async fn test_locate_against_gcs() {
    let (endpoint, _fake) = start_fake_gcs(fake_with(&[("here.txt", b"present")])).await;
    let store = GcsStore::emulator(BUCKET, endpoint.trim_start_matches("http://"));

    assert!(matches!(locate(&store, "gone.txt").await.unwrap(), Lookup::NotFound));
    match locate(&store, "here.txt").await.unwrap() {
        Lookup::Found(stream) => {
            let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
            assert_eq!(chunks.concat(), b"present");
        }
        Lookup::NotFound => panic!("expected here.txt to be found"),
    }
}

#[tokio::test]
async fn test_dot_segment_keys_never_reach_backend() {
    let (endpoint, fake) = start_fake_gcs(fake_with(&[("payroll.csv", b"salaries")])).await;
    let store = GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous);

    for key in [".", ".."] {
        assert!(!store.exists(key).await.unwrap(), "exists({key:?})");
        assert!(matches!(
            store.open(key).await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(locate(&store, key).await.unwrap(), Lookup::NotFound));
    }

    assert!(fake.seen_paths.lock().is_empty());
}

#[tokio::test]
async fn test_download_dot_segment_is_not_found() {
    let (endpoint, fake) = start_fake_gcs(fake_with(&[("payroll.csv", b"salaries")])).await;
    let store: Arc<dyn ObjectStore> =
        Arc::new(GcsStore::with_endpoint(BUCKET, endpoint, TokenSource::Anonymous));
    let router = Router::new()
        .route("/download/:filename", get(download))
        .with_state(Arc::new(DownloadState::new(store)));

    for path in ["/download/.", "/download/..", "/download/%2E", "/download/%2e%2E"] {
        let response = router
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(std::str::from_utf8(&body).unwrap(), "Arquivo não encontrado");
    }

    assert!(fake.seen_paths.lock().is_empty());
}

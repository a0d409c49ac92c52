use photo_sync::app::{build_routes, AppState};
use photo_sync::config::{CorsPolicy, FailureReporting, RateLimit, UploadLimits};
use photo_sync::db::{create_in_memory_pool, Catalog};
use photo_sync::ingest::Ingestor;
use photo_sync::storage_layout::StorageLayout;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use warp::http::StatusCode;

const BOUNDARY: &str = "photo-sync-test-boundary";

/// Small limits so oversized and over-count batches stay cheap to build.
async fn app_state(temp: &TempDir) -> AppState {
    let catalog = Catalog::new(create_in_memory_pool().await.unwrap());
    let ingestor = Arc::new(Ingestor::new(
        Arc::new(catalog.clone()),
        StorageLayout::new(temp.path()),
        UploadLimits {
            max_file_size: 16,
            max_files: 3,
        },
    ));
    AppState {
        catalog,
        ingestor,
        started_at: Instant::now(),
        failure_reporting: FailureReporting::Detailed,
        static_dir: None,
        cors: CorsPolicy::AnyOrigin,
        api_rate_limit: RateLimit::new(0, 60),
        upload_rate_limit: RateLimit::new(0, 60),
    }
}

/// Parts are `(field, filename, content type, bytes)`.
fn multipart_body(parts: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(field, filename, content_type, data) in parts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, field, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> warp::test::RequestBuilder {
    warp::test::request()
        .method("POST")
        .path("/api/photos")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_upload_mixed_batch_reports_skipped_files() {
    let temp = TempDir::new().unwrap();
    let routes = build_routes(app_state(&temp).await);

    let body = multipart_body(&[
        ("photos", "a.jpg", "image/jpeg", &b"abcd"[..]),
        ("avatar", "x.jpg", "image/jpeg", &b"efgh"[..]),
        ("photos", "big.png", "image/png", &[0u8; 40][..]),
    ]);
    let response = upload_request(body).reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response.body());
    assert_eq!(body["success"], true);
    let photos = body["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["originalName"], "a.jpg");
    assert_eq!(photos[0]["mimeType"], "image/jpeg");
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["originalName"], "big.png");
    assert_eq!(failed[0]["reason"], "File is 40 bytes, the limit is 16 bytes");

    // The field outside `photos` was ignored rather than stored
    let listed = warp::test::request()
        .path("/api/photos")
        .reply(&routes)
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(json(listed.body())["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_upload_over_file_count_is_payload_too_large() {
    let temp = TempDir::new().unwrap();
    let routes = build_routes(app_state(&temp).await);

    let body = multipart_body(&[
        ("photos", "1.jpg", "image/jpeg", &b"one"[..]),
        ("photos", "2.jpg", "image/jpeg", &b"two"[..]),
        ("photos", "3.jpg", "image/jpeg", &b"three"[..]),
        ("photos", "4.jpg", "image/jpeg", &b"four"[..]),
    ]);
    let response = upload_request(body).reply(&routes).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json(response.body());
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 413);
    assert_eq!(body["error"], "At most 3 files can be uploaded at once");
}

#[tokio::test]
async fn test_upload_body_over_request_cap_is_rejected() {
    let temp = TempDir::new().unwrap();
    let state = app_state(&temp).await;
    let cap = state.ingestor.limits().max_request_size() as usize;
    let routes = build_routes(state);

    let oversized = vec![0u8; cap + 1];
    let body = multipart_body(&[("photos", "huge.jpg", "image/jpeg", oversized.as_slice())]);
    let response = upload_request(body).reply(&routes).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(response.body())["code"], 413);
}

#[tokio::test]
async fn test_non_numeric_photo_id_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let routes = build_routes(app_state(&temp).await);

    let response = warp::test::request()
        .path("/api/photos/abc")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response.body())["error"], "Invalid photo id: abc");
}

#[tokio::test]
async fn test_security_headers_on_success_and_error() {
    let temp = TempDir::new().unwrap();
    let routes = build_routes(app_state(&temp).await);

    for (path, status) in [
        ("/api/health", StatusCode::OK),
        ("/api/nothing-here", StatusCode::NOT_FOUND),
    ] {
        let response = warp::test::request().path(path).reply(&routes).await;
        assert_eq!(response.status(), status, "{}", path);
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert!(headers.contains_key("content-security-policy"));
    }
}

#[tokio::test]
async fn test_cors_follows_configured_policy() {
    let temp = TempDir::new().unwrap();
    let origin = "https://client.example.com";

    let open = build_routes(app_state(&temp).await);
    let response = warp::test::request()
        .path("/api/health")
        .header("origin", origin)
        .reply(&open)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));

    let mut state = app_state(&temp).await;
    state.cors = CorsPolicy::Disabled;
    let closed = build_routes(state);
    let response = warp::test::request()
        .path("/api/health")
        .header("origin", origin)
        .reply(&closed)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));

    let mut state = app_state(&temp).await;
    state.cors = CorsPolicy::Origins(vec!["https://photos.example.com".to_string()]);
    let listed = build_routes(state);
    let response = warp::test::request()
        .path("/api/health")
        .header("origin", origin)
        .reply(&listed)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_api_rate_limit_returns_too_many_requests() {
    let temp = TempDir::new().unwrap();
    let mut state = app_state(&temp).await;
    state.api_rate_limit = RateLimit::new(2, 60);
    let routes = build_routes(state);

    for _ in 0..2 {
        let response = warp::test::request()
            .path("/api/health")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = warp::test::request()
        .path("/api/health")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(
        json(response.body())["error"],
        "Too many requests, please try again later"
    );
}

#[tokio::test]
async fn test_upload_rate_limit_only_counts_uploads() {
    let temp = TempDir::new().unwrap();
    let mut state = app_state(&temp).await;
    state.upload_rate_limit = RateLimit::new(1, 60);
    let routes = build_routes(state);

    let body = || multipart_body(&[("photos", "a.jpg", "image/jpeg", &b"abcd"[..])]);

    let first = upload_request(body()).reply(&routes).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = upload_request(body()).reply(&routes).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let listed = warp::test::request()
        .path("/api/photos")
        .reply(&routes)
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(json(listed.body())["pagination"]["total"], 1);
}

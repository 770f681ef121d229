#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use faceswap_api::config::{ServerConfig, StorageConfig};
use faceswap_api::router::build_app_router;
use faceswap_api::state::AppState;
use faceswap_core::upload::UploadLimits;
use faceswap_engine::EngineConfig;

pub const BOUNDARY: &str = "faceswap-test-boundary";

/// Source limit used by [`test_config`].
pub const SOURCE_LIMIT: u64 = 1024;

/// Template limit used by [`test_config`].
pub const TEMPLATE_LIMIT: u64 = 4096;

/// Engine script that copies the `-t` file to the `-o` path.
pub const COPY_TEMPLATE: &str = r#"out=""
tpl=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -t) tpl="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cat "$tpl" > "$out"
"#;

/// Build a test `ServerConfig` rooted at `root`, with the engine checkout at
/// `root/facefusion` run through `sh`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        storage: StorageConfig {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            assets_dir: root.join("assets"),
            models_dir: root.join("models"),
            monthly_buckets: true,
        },
        limits: UploadLimits {
            source_bytes: SOURCE_LIMIT,
            template_bytes: TEMPLATE_LIMIT,
        },
        engine: EngineConfig {
            home: Some(root.join("facefusion")),
            interpreter: "sh".to_string(),
            models_dir: root.join("models"),
            timeout: Duration::from_secs(10),
            ..EngineConfig::default()
        },
        max_concurrent_jobs: 1,
        queue_timeout_secs: None,
    }
}

/// A running app whose engine is the shell script `engine_script`.
///
/// The assets root holds `portrait.png`; `secret.png` sits next to it,
/// outside the sandbox.
pub struct TestApp {
    pub dir: TempDir,
    pub router: Router,
}

pub fn build_test_app(engine_script: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("facefusion")).unwrap();
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("facefusion").join("facefusion.py"), engine_script).unwrap();
    std::fs::write(root.join("assets").join("portrait.png"), b"asset-png").unwrap();
    std::fs::write(root.join("secret.png"), b"secret").unwrap();

    let state = AppState::from_config(test_config(root)).unwrap();
    TestApp {
        router: build_app_router(state),
        dir,
    }
}

/// One multipart form part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    /// Field name, content type, bytes.
    File(&'a str, &'a str, &'a [u8]),
}

/// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart form to `/api/v1/swap`.
pub async fn post_swap(app: &TestApp, parts: &[Part<'_>]) -> Response<Body> {
    let body = multipart_body(parts);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/swap")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// Send a GET request.
pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

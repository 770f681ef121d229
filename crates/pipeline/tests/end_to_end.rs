//! Full ingest -> submit runs against a scripted engine checkout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use faceswap_core::error::CoreError;
use faceswap_core::layout::{PartitionScheme, StorageLayout};
use faceswap_core::media::{MediaKind, UploadCategory};
use faceswap_core::owner::OwnerId;
use faceswap_core::sandbox::AssetSandbox;
use faceswap_core::upload::UploadLimits;
use faceswap_engine::{EngineError, EngineLaunchStrategy, EngineSettings, FaceFusionInvoker};
use faceswap_pipeline::{Admission, JobError, JobRequest, Orchestrator, TargetSource};
use tempfile::TempDir;

/// Engine script that copies the `-t` argument's bytes to the `-o` path.
const COPY_TEMPLATE: &str = r#"out=""
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

/// Engine script that exits successfully without writing anything.
const WRITES_NOTHING: &str = "exit 0\n";

struct Fixture {
    dir: TempDir,
    orchestrator: Orchestrator,
}

fn fixture(strategy: impl FnOnce(&Path) -> EngineLaunchStrategy) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let home = root.join("facefusion");
    let assets = root.join("assets");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("portrait.png"), b"asset-png").unwrap();
    std::fs::write(root.join("secret.png"), b"secret").unwrap();

    let settings = EngineSettings {
        strategy: strategy(&home),
        models_dir: root.join("models"),
        timeout: Duration::from_secs(10),
    };

    let orchestrator = Orchestrator::new(
        StorageLayout::new(root.join("input"), root.join("output"), PartitionScheme::OwnerMonthly),
        AssetSandbox::new(&assets),
        UploadLimits::from_megabytes(1, 2),
        settings,
        Admission::new(1, None),
        FaceFusionInvoker,
    );
    Fixture { dir, orchestrator }
}

fn scripted(body: &'static str) -> impl FnOnce(&Path) -> EngineLaunchStrategy {
    move |home| {
        std::fs::write(home.join("facefusion.py"), body).unwrap();
        EngineLaunchStrategy::SourceCheckout {
            home: home.to_path_buf(),
            interpreter: "sh".to_string(),
            conda_env: None,
        }
    }
}

fn owner() -> OwnerId {
    OwnerId::parse("u1").unwrap()
}

async fn upload(
    orchestrator: &Orchestrator,
    category: UploadCategory,
    content_type: &str,
    data: &[u8],
) -> faceswap_core::types::StoredFile {
    orchestrator
        .ingest(&owner(), category, content_type, &mut &data[..])
        .await
        .unwrap()
}

#[tokio::test]
async fn jpeg_source_and_png_template_produce_png() {
    let fx = fixture(scripted(COPY_TEMPLATE));
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;
    let template = upload(&fx.orchestrator, UploadCategory::Template, "image/png", b"template-bytes").await;

    assert!(source.absolute_path.starts_with(fx.dir.path().join("input").join("u1")));

    let artifact = fx
        .orchestrator
        .submit(JobRequest {
            owner_id: owner(),
            source,
            target: TargetSource::UploadedFile(template),
        })
        .await
        .unwrap();

    assert_eq!(artifact.media_kind, MediaKind::Png);
    assert_eq!(artifact.media_kind.mime(), "image/png");
    assert!(artifact.output_path.is_absolute());
    assert_eq!(std::fs::read(&artifact.output_path).unwrap(), b"template-bytes");
}

#[tokio::test]
async fn named_asset_is_read_from_sandbox() {
    let fx = fixture(scripted(COPY_TEMPLATE));
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/png", b"face").await;

    let artifact = fx
        .orchestrator
        .submit(JobRequest {
            owner_id: owner(),
            source,
            target: TargetSource::NamedAsset("portrait.png".into()),
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read(&artifact.output_path).unwrap(), b"asset-png");
    let name = artifact.file_name();
    assert!(name.starts_with("portrait_") && name.ends_with(".png"), "{}", name);
}

#[tokio::test]
async fn engine_without_output_fails_with_no_output() {
    let fx = fixture(scripted(WRITES_NOTHING));
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;
    let template = upload(&fx.orchestrator, UploadCategory::Template, "image/png", b"tpl").await;

    let result = fx
        .orchestrator
        .submit(JobRequest {
            owner_id: owner(),
            source,
            target: TargetSource::UploadedFile(template),
        })
        .await;

    assert_matches!(result, Err(JobError::Engine(EngineError::NoOutput { .. })));
}

#[tokio::test]
async fn missing_engine_binary_is_unavailable() {
    let fx = fixture(|_| EngineLaunchStrategy::Installed {
        program: "facefusion-binary-that-does-not-exist".into(),
    });
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;

    let result = fx
        .orchestrator
        .submit(JobRequest {
            owner_id: owner(),
            source,
            target: TargetSource::NamedAsset("portrait.png".into()),
        })
        .await;

    assert_matches!(result, Err(JobError::Engine(EngineError::Unavailable { .. })));
}

#[tokio::test]
async fn asset_outside_sandbox_is_refused() {
    let fx = fixture(scripted(COPY_TEMPLATE));
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;

    let result = fx
        .orchestrator
        .submit(JobRequest {
            owner_id: owner(),
            source,
            target: TargetSource::NamedAsset("../secret.png".into()),
        })
        .await;

    assert_matches!(result, Err(JobError::Core(CoreError::InvalidTemplatePath(_))));
    assert!(!fx.dir.path().join("output").exists());
}

#[tokio::test]
async fn concurrent_jobs_get_distinct_outputs() {
    let fx = Arc::new(fixture(scripted(COPY_TEMPLATE)));

    let mut handles = Vec::new();
    for i in 0..3u8 {
        let fx = Arc::clone(&fx);
        handles.push(tokio::spawn(async move {
            let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;
            let template = upload(&fx.orchestrator, UploadCategory::Template, "image/png", &[b'a' + i]).await;
            fx.orchestrator
                .submit(JobRequest {
                    owner_id: owner(),
                    source,
                    target: TargetSource::UploadedFile(template),
                })
                .await
                .unwrap()
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().output_path);
    }
    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 3);
}

#[tokio::test]
async fn aborted_request_leaves_engine_running() {
    let script: &'static str = concat!("sleep 1\n", r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'late' > "$out"
"#);
    let fx = Arc::new(fixture(scripted(script)));
    let source = upload(&fx.orchestrator, UploadCategory::Source, "image/jpeg", b"face").await;

    let caller = {
        let fx = Arc::clone(&fx);
        tokio::spawn(async move {
            fx.orchestrator
                .submit(JobRequest {
                    owner_id: owner(),
                    source,
                    target: TargetSource::NamedAsset("portrait.png".into()),
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    caller.abort();

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let outputs = files_under(&fx.dir.path().join("output"));
    assert_eq!(outputs.len(), 1, "{:?}", outputs);
    assert_eq!(std::fs::read(&outputs[0]).unwrap(), b"late");
}

fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}

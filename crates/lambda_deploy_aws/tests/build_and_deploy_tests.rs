mod support;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lambda_deploy_aws::error::{BuildError, DeployError};
use lambda_deploy_aws::handlers::archive::{ArchiveOptions, CompressionStrategy};
use lambda_deploy_aws::handlers::deploy::build_and_deploy;
use serde_json::json;
use support::{manifest, FakeCloud};

fn offline_options() -> ArchiveOptions {
    ArchiveOptions {
        install_command: None,
        compression: CompressionStrategy::InProcess,
        ..ArchiveOptions::default()
    }
}

#[tokio::test]
async fn build_failure_aborts_before_any_region_is_contacted() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let connects = Arc::new(AtomicUsize::new(0));
    let manifest = manifest(&["us-east-1", "eu-west-1"], json!({}));

    let result = build_and_deploy(
        &manifest,
        &scratch.path().join("missing"),
        &offline_options(),
        None,
        |region| {
            let connects = connects.clone();
            async move {
                connects.fetch_add(1, Ordering::SeqCst);
                FakeCloud::new(&region).clients()
            }
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(DeployError::Build(BuildError::MissingSource(_)))
    ));
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn artifact_is_built_on_a_current_thread_runtime_and_shipped_to_every_region() {
    let source = tempfile::tempdir().expect("tempdir");
    fs::write(source.path().join("index.js"), "exports.handler = async () => 'ok';")
        .expect("write handler");
    fs::write(source.path().join("debug.log"), "noise").expect("write log");
    let package_dir = tempfile::tempdir().expect("tempdir");

    let east = FakeCloud::new("us-east-1");
    let west = FakeCloud::new("us-west-2");
    let clouds = vec![east.clone(), west.clone()];
    let manifest = manifest(&["us-east-1", "us-west-2"], json!({}));

    let report = build_and_deploy(
        &manifest,
        source.path(),
        &offline_options(),
        Some(package_dir.path()),
        |region| {
            let cloud = clouds
                .iter()
                .find(|cloud| cloud.region == region)
                .cloned()
                .expect("fake region");
            async move { cloud.clients() }
        },
    )
    .await
    .expect("deploy should run");

    assert!(report.is_success());
    assert_eq!(
        report
            .regions
            .iter()
            .map(|region| region.region.as_str())
            .collect::<Vec<_>>(),
        vec!["us-east-1", "us-west-2"]
    );

    let persisted = package_dir.path().join("orders-handler-development.zip");
    let size = fs::metadata(&persisted).expect("artifact persisted").len();
    let expected = format!("zip:{size}");
    assert_eq!(east.code_sources(), vec![expected.clone()]);
    assert_eq!(west.code_sources(), vec![expected]);
}

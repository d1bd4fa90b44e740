// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! End-to-end protect operations against an in-process Key Access Service.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tdf::keys::local::LocalMemoryKeyPair;
use tdf::keys::wrap::OaepDigest;
use tdf::package::layout::{artifact_path, StagedArtifact};
use tdf::protect::recover::recover_plaintext;
use tdf::protect::status::read_artifact_manifest;
use tdf::protect::{FailureReason, ProtectionConfig, ProtectionState, RetryPolicy};
use tdf::{ProtectionOrchestrator, ProtectionStatus};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KAS_PRIVATE: &str = include_str!("../testdata/kas_rsa2048_private.pem");
const KAS_PUBLIC: &str = include_str!("../testdata/kas_rsa2048_public.pem");
const WEAK_PUBLIC: &str = include_str!("../testdata/weak_rsa1024_public.pem");
const PLAINTEXT: &[u8] = b"Is this a dagger which I see before me, the handle toward my hand?";

struct MockKas {
    pem: String,
    field: &'static str,
    failures: usize,
    calls: AtomicUsize,
}

impl MockKas {
    fn new(pem: &str, field: &'static str, failures: usize) -> Arc<MockKas> {
        Arc::new(MockKas {
            pem: String::from(pem),
            field,
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn public_key(
    State(kas): State<Arc<MockKas>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let n = kas.calls.fetch_add(1, Ordering::SeqCst);
    if params.get("algorithm").map(String::as_str) != Some("rsa") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "algorithm" })));
    }
    if n < kas.failures {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "busy" })),
        );
    }
    let mut body = serde_json::Map::new();
    body.insert(String::from(kas.field), Value::from(kas.pem.clone()));
    (StatusCode::OK, Json(Value::Object(body)))
}

/// Serves the mock KAS on an ephemeral loopback port and returns its base URL.
async fn serve(kas: Arc<MockKas>) -> String {
    let app = Router::new()
        .route("/kas/v2/kas_public_key", get(public_key))
        .with_state(kas);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config_for(url: &str) -> ProtectionConfig {
    let mut config = ProtectionConfig::new(url);
    config.kas.allow_insecure_http = true;
    config.kas.timeout_secs = 5;
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 5,
    };
    config
}

fn write_asset(dir: &Path) -> PathBuf {
    let asset = dir.join("interview.mp4");
    fs::write(&asset, PLAINTEXT).unwrap();
    asset
}

fn kas_pair() -> LocalMemoryKeyPair {
    LocalMemoryKeyPair::from_pkcs8_pem(KAS_PRIVATE, OaepDigest::Sha1).unwrap()
}

#[tokio::test]
async fn protect_then_check_status_then_recover() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 0);
    let url = serve(kas.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();

    assert_eq!(orchestrator.check_status(&asset), ProtectionStatus::Unprotected);

    let started = Utc::now();
    let receipt = orchestrator.protect_file(&asset, "interview-42").await.unwrap();
    assert_eq!(kas.calls(), 1);
    assert_eq!(receipt.history.last(), Some(&ProtectionState::Protected));

    match orchestrator.check_status(&asset) {
        ProtectionStatus::Protected {
            location,
            protected_at,
        } => {
            assert_eq!(location, artifact_path(&asset));
            assert!(protected_at >= started);
        }
        s => panic!("Unexpected status: {:?}", s),
    }

    let manifest = read_artifact_manifest(&receipt.artifact).unwrap();
    assert_eq!(manifest, receipt.manifest);
    assert_eq!(manifest.meta.asset_id, "interview-42");
    assert_eq!(manifest.payload.mime_type, "video/mp4");
    assert_eq!(manifest.key_access().unwrap().url, url);
    assert_eq!(manifest.wrapped_key().unwrap().as_bytes().len(), 256);

    assert_eq!(fs::read(&asset).unwrap(), PLAINTEXT);
    assert_eq!(
        recover_plaintext(&receipt.artifact, &kas_pair()).unwrap(),
        PLAINTEXT
    );
}

#[tokio::test]
async fn protection_time_is_not_before_the_call() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 0);
    let url = serve(kas).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();

    for _ in 0..20 {
        let started = Utc::now();
        orchestrator.protect_file(&asset, "a").await.unwrap();
        match orchestrator.check_status(&asset) {
            ProtectionStatus::Protected { protected_at, .. } => {
                assert!(
                    protected_at >= started,
                    "{} is before {}",
                    protected_at,
                    started
                );
            }
            s => panic!("Unexpected status: {:?}", s),
        }
    }
}

#[tokio::test]
async fn public_key_field_must_match_the_custodian() {
    let kas = MockKas::new(KAS_PUBLIC, "public_key", 0);
    let url = serve(kas.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();
    let failure = orchestrator.protect_file(&asset, "a").await.unwrap_err();
    assert_eq!(failure.stage, ProtectionState::FetchingKey);
    assert_eq!(failure.reason(), FailureReason::InvalidCustodianResponse);
    assert_eq!(kas.calls(), 1);
    assert_eq!(orchestrator.check_status(&asset), ProtectionStatus::Unprotected);

    let mut config = config_for(&url);
    config.kas.public_key_field = String::from("public_key");
    let orchestrator = ProtectionOrchestrator::from_config(&config).unwrap();
    orchestrator.protect_file(&asset, "a").await.unwrap();
    assert!(orchestrator.check_status(&asset).is_protected());
}

#[tokio::test]
async fn busy_custodian_is_retried() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 2);
    let url = serve(kas.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();
    let receipt = orchestrator.protect_file(&asset, "a").await.unwrap();
    assert_eq!(receipt.fetch_attempts, 3);
    assert_eq!(kas.calls(), 3);
}

#[tokio::test]
async fn persistently_busy_custodian_is_unreachable() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 100);
    let url = serve(kas.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();
    let failure = orchestrator.protect_file(&asset, "a").await.unwrap_err();
    assert_eq!(failure.reason(), FailureReason::CustodianUnreachable);
    assert_eq!(failure.reason().message_key(), "custodian-unreachable");
    assert_eq!(kas.calls(), 3);
    assert_eq!(orchestrator.check_status(&asset), ProtectionStatus::Unprotected);
}

#[tokio::test]
async fn weak_custodian_key_is_rejected() {
    let kas = MockKas::new(WEAK_PUBLIC, "publicKey", 0);
    let url = serve(kas.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();
    let failure = orchestrator.protect_file(&asset, "a").await.unwrap_err();
    assert_eq!(failure.stage, ProtectionState::Wrapping);
    assert_eq!(failure.reason().message_key(), "custodian-key-too-weak");
    assert_eq!(kas.calls(), 1);
    assert_eq!(fs::read(&asset).unwrap(), PLAINTEXT);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn sha256_digest_round_trips() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 0);
    let url = serve(kas).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let mut config = config_for(&url);
    config.oaep_digest = OaepDigest::Sha256;
    let orchestrator = ProtectionOrchestrator::from_config(&config).unwrap();
    let receipt = orchestrator.protect_file(&asset, "a").await.unwrap();

    let pair = LocalMemoryKeyPair::from_pkcs8_pem(KAS_PRIVATE, OaepDigest::Sha256).unwrap();
    assert_eq!(recover_plaintext(&receipt.artifact, &pair).unwrap(), PLAINTEXT);
    assert!(recover_plaintext(&receipt.artifact, &kas_pair()).is_err());
}

#[tokio::test]
async fn configuration_from_file() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 0);
    let url = serve(kas).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let config_path = dir.path().join("tdf.json");
    let mut file = fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"{{ "custodian_url": "{}", "kas": {{ "allow_insecure_http": true }} }}"#,
        url
    )
    .unwrap();
    drop(file);

    let config = ProtectionConfig::from_file_path(&config_path).unwrap();
    let orchestrator = ProtectionOrchestrator::from_config(&config).unwrap();
    orchestrator.protect_file(&asset, "a").await.unwrap();
    assert!(orchestrator.check_status(&asset).is_protected());
}

#[tokio::test]
async fn interrupted_replacement_keeps_previous_artifact() {
    let kas = MockKas::new(KAS_PUBLIC, "publicKey", 0);
    let url = serve(kas).await;
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());

    let orchestrator = ProtectionOrchestrator::from_config(&config_for(&url)).unwrap();
    let receipt = orchestrator.protect_file(&asset, "a").await.unwrap();
    let before = fs::read(&receipt.artifact).unwrap();

    // A writer that stops between staging and the final rename.
    let staged = StagedArtifact::stage(&artifact_path(&asset), b"partial").unwrap();
    assert!(orchestrator.check_status(&asset).is_protected());
    drop(staged);

    assert_eq!(fs::read(&receipt.artifact).unwrap(), before);
    assert!(orchestrator.check_status(&asset).is_protected());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn interrupted_first_write_is_unprotected() {
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let orchestrator = ProtectionOrchestrator::new("https://kas.example.com", kas_pair());

    let staged = StagedArtifact::stage(&artifact_path(&asset), b"partial").unwrap();
    assert_eq!(orchestrator.check_status(&asset), ProtectionStatus::Unprotected);
    drop(staged);
    assert_eq!(orchestrator.check_status(&asset), ProtectionStatus::Unprotected);
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module sequences the protection pipeline.
//!
//! A protect operation moves through a fixed sequence of states:
//!
//! `Idle -> Encrypting -> FetchingKey -> Wrapping -> BuildingManifest -> Packaging -> Protected`
//!
//! Any non-terminal state can end in `Failed`. Each state consumes the output of the one before,
//! so there is no internal parallelism. Only the key fetch is retried. Encryption and packaging
//! are CPU-bound and run on the blocking thread pool, so awaiting a protect operation never stalls
//! the caller's executor.
//!
//! The source asset is only ever read. The artifact is staged in a temporary file and renamed into
//! place as the very last step, so a failed or abandoned operation leaves nothing that
//! [check_status](ProtectionOrchestrator::check_status) would report as protected.

pub mod config;
pub mod error;
pub mod recover;
pub mod status;

pub use config::{ProtectionConfig, RetryPolicy};
pub use error::{FailureReason, ProtectError};
pub use status::ProtectionStatus;

use crate::cipher::ContentCipher;
use crate::keys::cache::CachedKeySource;
#[cfg(feature = "kas")]
use crate::keys::http::KasKeyClient;
use crate::keys::material::{EntropySource, KeyMaterialGenerator, SystemEntropy};
use crate::keys::wrap::KeyWrapper;
use crate::keys::WrappingKeySource;
use crate::package::archive::ArchiveCodec;
use crate::package::layout::{artifact_path, StagedArtifact};
use crate::package::manifest::v1::Manifest;
use crate::package::manifest::{mime_type_for_path, ManifestBuilder};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::task::{self, JoinError, JoinHandle};

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Convenient result alias for this module, where errors are of type [ProtectError].
pub type Result<T> = std::result::Result<T, error::ProtectError>;

/// The states of a protect operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtectionState {
    Idle,
    Encrypting,
    FetchingKey,
    Wrapping,
    BuildingManifest,
    Packaging,
    Protected,
    Failed(FailureReason),
}

impl ProtectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtectionState::Protected | ProtectionState::Failed(_))
    }
}

impl fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionState::Idle => f.write_str("idle"),
            ProtectionState::Encrypting => f.write_str("encrypting"),
            ProtectionState::FetchingKey => f.write_str("fetching the custodian key"),
            ProtectionState::Wrapping => f.write_str("wrapping the content key"),
            ProtectionState::BuildingManifest => f.write_str("building the manifest"),
            ProtectionState::Packaging => f.write_str("packaging"),
            ProtectionState::Protected => f.write_str("protected"),
            ProtectionState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// The outcome of a successful protect operation.
#[derive(Clone, Debug)]
pub struct ProtectionReceipt {
    /// Where the artifact was written.
    pub artifact: PathBuf,

    /// The manifest embedded in the artifact.
    pub manifest: Manifest,

    pub protected_at: DateTime<Utc>,

    /// How many times the custodian key was requested, including the successful request.
    pub fetch_attempts: u32,

    /// Every state the operation passed through, from `Idle` to `Protected`.
    pub history: Vec<ProtectionState>,
}

/// The outcome of a failed protect operation.
#[derive(Error, Debug)]
#[error("Protection failed while {stage}: {error}")]
pub struct ProtectionFailure {
    /// The state in which the failure occurred.
    pub stage: ProtectionState,

    #[source]
    pub error: ProtectError,

    /// Every state the operation passed through, ending in `Failed`.
    pub history: Vec<ProtectionState>,
}

impl ProtectionFailure {
    pub fn reason(&self) -> FailureReason {
        self.error.reason()
    }
}

/// Records the state transitions of one protect operation.
struct StateTrail {
    history: Vec<ProtectionState>,
}

impl StateTrail {
    fn new() -> StateTrail {
        StateTrail {
            history: vec![ProtectionState::Idle],
        }
    }

    fn current(&self) -> ProtectionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ProtectionState::Idle)
    }

    fn enter(&mut self, state: ProtectionState) {
        debug!("Protection state {} -> {}", self.current(), state);
        self.history.push(state);
    }

    fn fail(mut self, error: ProtectError) -> ProtectionFailure {
        let stage = self.current();
        self.enter(ProtectionState::Failed(error.reason()));
        ProtectionFailure {
            stage,
            error,
            history: self.history,
        }
    }
}

fn joined<T>(result: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(ProtectError::TaskError(e.to_string())),
    }
}

type SharedGenerator = Arc<KeyMaterialGenerator<Box<dyn EntropySource>>>;

/// Runs protect operations against one custodian.
///
/// The orchestrator holds no mutable state other than the public key cache, so one instance can
/// serve concurrent operations on different assets. Callers must not protect the same asset twice
/// concurrently.
pub struct ProtectionOrchestrator<S: WrappingKeySource> {
    custodian_url: String,
    key_source: CachedKeySource<S>,
    generator: SharedGenerator,
    cipher: ContentCipher,
    wrapper: KeyWrapper,
    retry: RetryPolicy,
}

impl<S: WrappingKeySource> ProtectionOrchestrator<S> {
    /// Makes an orchestrator with default settings.
    pub fn new(custodian_url: &str, key_source: S) -> ProtectionOrchestrator<S> {
        ProtectionOrchestrator::with_config(&ProtectionConfig::new(custodian_url), key_source)
    }

    /// Makes an orchestrator that takes its custodian, retry policy, cache lifetime and OAEP
    /// digest from the given configuration.
    pub fn with_config(config: &ProtectionConfig, key_source: S) -> ProtectionOrchestrator<S> {
        let entropy: Box<dyn EntropySource> = Box::new(SystemEntropy::default());
        ProtectionOrchestrator {
            custodian_url: config.custodian_url.clone(),
            key_source: CachedKeySource::new(key_source, config.key_cache_ttl()),
            generator: Arc::new(KeyMaterialGenerator::with_entropy(entropy)),
            cipher: ContentCipher::default(),
            wrapper: KeyWrapper::new(config.oaep_digest),
            retry: config.retry.clone(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> ProtectionOrchestrator<S> {
        self.retry = retry;
        self
    }

    /// Replaces the source of randomness for key material.
    pub fn with_entropy<E: EntropySource + 'static>(mut self, entropy: E) -> ProtectionOrchestrator<S> {
        let entropy: Box<dyn EntropySource> = Box::new(entropy);
        self.generator = Arc::new(KeyMaterialGenerator::with_entropy(entropy));
        self
    }

    pub fn custodian_url(&self) -> &str {
        &self.custodian_url
    }

    pub fn key_source(&self) -> &CachedKeySource<S> {
        &self.key_source
    }

    /// Classifies the source asset at the given path. See [status::check_status].
    pub fn check_status(&self, asset: &Path) -> ProtectionStatus {
        status::check_status(asset)
    }

    /// Reads the source asset at the given path and protects it.
    pub async fn protect_file(
        &self,
        asset: &Path,
        asset_id: &str,
    ) -> std::result::Result<ProtectionReceipt, ProtectionFailure> {
        match tokio::fs::read(asset).await {
            Ok(plaintext) => self.protect(plaintext, asset_id, asset).await,
            Err(e) => Err(StateTrail::new().fail(e.into())),
        }
    }

    /// Protects the given plaintext of the source asset at `asset`, writing the artifact beside
    /// it. The asset path determines the artifact location and the payload MIME type.
    pub async fn protect(
        &self,
        plaintext: Vec<u8>,
        asset_id: &str,
        asset: &Path,
    ) -> std::result::Result<ProtectionReceipt, ProtectionFailure> {
        let mut trail = StateTrail::new();
        match self.run(&mut trail, plaintext, asset_id, asset).await {
            Ok(receipt) => Ok(receipt),
            Err(error) => {
                let failure = trail.fail(error);
                warn!(
                    "Protection of {} failed while {}: {}",
                    asset.display(),
                    failure.stage,
                    failure.error
                );
                Err(failure)
            }
        }
    }

    async fn run(
        &self,
        trail: &mut StateTrail,
        plaintext: Vec<u8>,
        asset_id: &str,
        asset: &Path,
    ) -> Result<ProtectionReceipt> {
        trail.enter(ProtectionState::Encrypting);
        let generator = Arc::clone(&self.generator);
        let cipher = self.cipher;
        let (key, iv, ciphertext) = joined(
            task::spawn_blocking(move || -> Result<_> {
                let key = generator.generate_key()?;
                let iv = generator.generate_iv()?;
                let ciphertext = cipher.encrypt(&plaintext, key.as_bytes(), iv.as_bytes())?;
                Ok((key, iv, ciphertext))
            })
            .await,
        )?;

        trail.enter(ProtectionState::FetchingKey);
        let (public_key, fetch_attempts) = self.fetch_public_key().await?;

        trail.enter(ProtectionState::Wrapping);
        let wrapped = match self.wrapper.wrap(&key, &public_key) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                if e.implicates_custodian_key() {
                    self.key_source.invalidate(&self.custodian_url);
                }
                return Err(e.into());
            }
        };
        drop(key);

        trail.enter(ProtectionState::BuildingManifest);
        let manifest = ManifestBuilder::new()
            .method(cipher.method())
            .mime_type(mime_type_for_path(asset))
            .build_manifest(&wrapped, &iv, asset_id, &self.custodian_url);
        let manifest_bytes = manifest.to_canonical_bytes()?;

        trail.enter(ProtectionState::Packaging);
        let destination = artifact_path(asset);
        let staged = joined(
            task::spawn_blocking(move || -> Result<StagedArtifact> {
                let staged = StagedArtifact::stage_with(&destination, |file| {
                    let mut writer =
                        ArchiveCodec.write_to(BufWriter::new(file), &manifest_bytes, &ciphertext)?;
                    writer.flush()?;
                    Ok(())
                })?;
                Ok(staged)
            })
            .await,
        )?;
        let artifact = staged.commit()?;

        trail.enter(ProtectionState::Protected);
        let protected_at = manifest.meta.protected_at_utc().unwrap_or_else(Utc::now);
        info!("Protected {} as {}", asset_id, artifact.display());
        Ok(ProtectionReceipt {
            artifact,
            manifest,
            protected_at,
            fetch_attempts,
            history: trail.history.clone(),
        })
    }

    /// Fetches the custodian public key, retrying transient failures with exponential backoff.
    async fn fetch_public_key(&self) -> Result<(String, u32)> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            match self.key_source.get_public(&self.custodian_url).await {
                Ok(pem) => return Ok((pem, attempt)),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.retry.backoff_after(attempt);
                    warn!(
                        "Custodian key fetch attempt {} of {} failed ({}), retrying in {:?}",
                        attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<S: WrappingKeySource + 'static> ProtectionOrchestrator<S> {
    /// Runs a protect operation as a detached task on the current runtime.
    pub fn spawn_protect(
        self: &Arc<Self>,
        plaintext: Vec<u8>,
        asset_id: String,
        asset: PathBuf,
    ) -> JoinHandle<std::result::Result<ProtectionReceipt, ProtectionFailure>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.protect(plaintext, &asset_id, &asset).await })
    }
}

#[cfg(feature = "kas")]
impl ProtectionOrchestrator<KasKeyClient> {
    /// Makes an orchestrator that fetches keys from the configured Key Access Service.
    pub fn from_config(config: &ProtectionConfig) -> Result<ProtectionOrchestrator<KasKeyClient>> {
        config.validate()?;
        let client = KasKeyClient::new(config.kas.clone())?;
        client.endpoint(&config.custodian_url)?;
        Ok(ProtectionOrchestrator::with_config(config, client))
    }
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Read-only classification of source assets by the presence of their protected artifact.
//!
//! Status checks never run a cryptographic step. They read at most the manifest entry of the
//! artifact, to confirm that it is complete and to recover the protection time.

use crate::package::archive::ArchiveCodec;
use crate::package::layout::artifact_path;
use crate::package::manifest::v1::Manifest;
use crate::package::Result;

use chrono::{DateTime, Utc};
use log::debug;

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// The protection status of a source asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtectionStatus {
    /// A complete artifact exists at `location`, protected at `protected_at`.
    Protected {
        location: PathBuf,
        protected_at: DateTime<Utc>,
    },

    /// It has been confirmed that no artifact exists.
    Unprotected,

    /// The probe failed, so protection can be neither confirmed nor ruled out.
    Unknown { reason: String },
}

impl ProtectionStatus {
    pub fn is_protected(&self) -> bool {
        matches!(self, ProtectionStatus::Protected { .. })
    }
}

/// Classifies the source asset at the given path.
///
/// A missing artifact is [ProtectionStatus::Unprotected]. A probe that fails for any other reason
/// (a permission error, say), and an artifact whose manifest cannot be read, are
/// [ProtectionStatus::Unknown].
pub fn check_status(asset: &Path) -> ProtectionStatus {
    let location = artifact_path(asset);
    let status = match fs::metadata(&location) {
        Err(e) if e.kind() == ErrorKind::NotFound => ProtectionStatus::Unprotected,
        Err(e) => ProtectionStatus::Unknown {
            reason: e.to_string(),
        },
        Ok(metadata) if !metadata.is_file() => ProtectionStatus::Unknown {
            reason: String::from("the artifact location is not a regular file"),
        },
        Ok(_) => match read_artifact_manifest(&location) {
            Ok(manifest) => match manifest.meta.protected_at_utc() {
                Some(protected_at) => ProtectionStatus::Protected {
                    location,
                    protected_at,
                },
                None => ProtectionStatus::Unknown {
                    reason: String::from("the manifest protection time is not valid"),
                },
            },
            Err(e) => ProtectionStatus::Unknown {
                reason: e.to_string(),
            },
        },
    };
    debug!("Status of {}: {:?}", asset.display(), status);
    status
}

/// Reads and validates only the manifest of the artifact at the given path.
pub fn read_artifact_manifest(artifact: &Path) -> Result<Manifest> {
    let reader = BufReader::new(File::open(artifact)?);
    let bytes = ArchiveCodec.read_manifest(reader)?;
    Manifest::from_bytes(&bytes)
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Placement of protected artifacts on the filesystem.
//!
//! The artifact for a source asset at `P` is `P` with `.tdf` appended, so `clip.mov` is protected
//! as `clip.mov.tdf`. Artifacts are first written to a hidden temporary file in the same directory,
//! then renamed into place. Readers therefore see either no artifact or a complete one.

use crate::package::error::{Error, PackageErrorKind};
use crate::package::Result;

use log::debug;
use tempfile::NamedTempFile;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension appended to the source asset name.
pub const ARTIFACT_EXTENSION: &str = "tdf";

/// Computes the artifact location for the source asset at the given path.
pub fn artifact_path(asset: &Path) -> PathBuf {
    let mut name = asset.as_os_str().to_owned();
    name.push(".");
    name.push(ARTIFACT_EXTENSION);
    PathBuf::from(name)
}

fn creation_error<E: std::fmt::Display>(e: E) -> Error {
    Error::PackageError(PackageErrorKind::ArchiveCreation(e.to_string()))
}

/// A fully written artifact that has not yet been moved to its final location.
///
/// Dropping a staged artifact without committing it deletes the temporary file.
#[derive(Debug)]
pub struct StagedArtifact {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedArtifact {
    /// Writes the artifact bytes to a temporary file beside the destination and flushes them to
    /// stable storage.
    pub fn stage(destination: &Path, bytes: &[u8]) -> Result<StagedArtifact> {
        StagedArtifact::stage_with(destination, |file| {
            file.write_all(bytes).map_err(creation_error)
        })
    }

    /// Like [StagedArtifact::stage], but hands the open temporary file to `write`, so that large
    /// artifacts can be streamed in rather than assembled in memory first.
    pub fn stage_with<F>(destination: &Path, write: F) -> Result<StagedArtifact>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        let directory = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".tdf-")
            .suffix(".partial")
            .tempfile_in(directory)
            .map_err(creation_error)?;
        write(temp.as_file_mut())?;
        temp.as_file().sync_all().map_err(creation_error)?;
        debug!("Staged artifact at {}", temp.path().display());
        Ok(StagedArtifact {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Atomically renames the staged file onto its destination, replacing any earlier artifact.
    pub fn commit(self) -> Result<PathBuf> {
        let destination = self.destination;
        self.temp
            .persist(&destination)
            .map_err(|e| creation_error(e.error))?;
        Ok(destination)
    }
}

/// Stages and commits in one step.
pub fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<PathBuf> {
    StagedArtifact::stage(destination, bytes)?.commit()
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for errors that can occur while building, writing
//! and reading manifests and protected artifacts.

use thiserror::Error;

/// Specific error types for errors that can occur within the package module.
#[derive(Error, Debug)]
pub enum Error {
    /// An error that has been re-badged from the `std::io` subsystem. This kind of error might arise
    /// if the artifact cannot be opened, or is deleted from disk while it is being processed.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Error coming from the serde_json crate, which can happen when a manifest JSON
    /// document is improperly formed.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Error coming from the zip crate, which happens when the container is not a readable ZIP
    /// archive at all.
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),

    /// This kind of error represents a malformation of the archive or the manifest.
    #[error(transparent)]
    PackageError(#[from] PackageErrorKind),
}

/// These error variants refer to errors that are raised directly by code in the package module
/// and its submodules, as opposed to errors that are simply being re-badged from underlying
/// subsystems such as I/O.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PackageErrorKind {
    /// The archive could not be packed or written to its destination.
    #[error("The protected artifact could not be created: {0}")]
    ArchiveCreation(String),

    /// The archive is readable as a container, but its contents are damaged.
    #[error("The protected artifact is not valid: {0}")]
    InvalidArchive(String),

    #[error("The protected artifact has no manifest entry.")]
    ManifestEntryMissing,

    #[error("The protected artifact has no payload entry.")]
    PayloadEntryMissing,

    #[error("The protected artifact contains an unexpected entry `{0}`.")]
    UnexpectedEntry(String),

    #[error("The manifest names an unsupported encryption method `{0}`.")]
    UnsupportedEncryptionMethod(String),

    #[error("The manifest describes an unsupported key access scheme: {0}")]
    UnsupportedKeyAccess(String),

    #[error("The manifest initialization vector is not 16 bytes of base64.")]
    InvalidIv,

    #[error("The manifest wrapped key is not valid base64.")]
    InvalidWrappedKey,
}

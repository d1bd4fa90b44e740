// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Error definitions/handling.

use thiserror::Error;

/// Errors in tdf-tool
#[derive(Error, Debug)]
pub enum Error {
    /// Error emanating from standard I/O.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// A protect operation ran and failed. The failure carries the stage it stopped in.
    #[error(transparent)]
    ProtectionFailed(#[from] tdf::protect::ProtectionFailure),

    /// Errors from configuration loading or artifact recovery.
    #[error(transparent)]
    ProtectError(#[from] tdf::protect::ProtectError),

    /// Errors coming from the artifact processing, due to the artifact being unreadable or
    /// malformed in some way.
    #[error(transparent)]
    PackageProcessingError(#[from] tdf::package::error::Error),

    /// Errors relating to the custodian key or to the wrapping of content keys.
    #[error(transparent)]
    KeyError(#[from] tdf::keys::error::KeyError),

    /// Errors relating to JSON processing.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Error emanating from the tdf-tool itself.
    #[error(transparent)]
    ToolError(#[from] ToolErrorKind),
}

/// Errors originating in the tdf-tool itself.
#[derive(Error, Debug)]
pub enum ToolErrorKind {
    /// There is some missing configuration for a command, such as a required environment variable or
    /// configuration file/option.
    #[error("Missing configuration")]
    MissingConfiguration,

    /// The OAEP digest named on the command-line is not one of `sha1` or `sha256`.
    #[error("Invalid OAEP digest: {0}")]
    InvalidOaepDigest(String),

    /// The protection status of an asset could not be determined.
    #[error("Protection status unknown: {0}")]
    StatusUnknown(String),
}

/// A Result type with the Err variant set as a ToolError
pub type Result<T> = std::result::Result<T, Error>;

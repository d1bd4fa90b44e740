// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Error definitions for protect operations, and their mapping to reasons that can be presented
//! to a user.

use crate::cipher::CipherError;
use crate::keys::error::KeyError;
use crate::package::error::{Error as PackageError, PackageErrorKind};

use thiserror::Error;

use std::fmt;

/// Errors that end a protect operation, or other operations of this module.
#[derive(Error, Debug)]
pub enum ProtectError {
    /// Errors relating to key material, the custodian, or key wrapping.
    #[error(transparent)]
    KeyError(#[from] KeyError),

    /// Errors from the content cipher.
    #[error(transparent)]
    CipherError(#[from] CipherError),

    /// Errors from building, writing or reading the artifact.
    #[error(transparent)]
    PackageError(#[from] PackageError),

    /// Error emanating from standard I/O, such as an unreadable source asset.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// The configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A background task running part of the pipeline panicked or was cancelled.
    #[error("The protection task did not complete: {0}")]
    TaskError(String),
}

impl ProtectError {
    /// Only an unreachable custodian is worth retrying. Every other failure points to a logic,
    /// configuration or security fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtectError::KeyError(e) if e.is_transient())
    }

    /// The reason to present to the user for this failure.
    pub fn reason(&self) -> FailureReason {
        match self {
            ProtectError::KeyError(e) => match e {
                KeyError::KeyGeneration | KeyError::IvGeneration => {
                    FailureReason::KeyGenerationFailed
                }
                KeyError::InvalidCustodianUrl(_) => FailureReason::InvalidCustodianUrl,
                KeyError::CustodianUnreachable(_) => FailureReason::CustodianUnreachable,
                KeyError::InvalidCustodianResponse(_) => FailureReason::InvalidCustodianResponse,
                KeyError::InvalidPem | KeyError::InvalidKeyData(_) => {
                    FailureReason::InvalidCustodianKey
                }
                KeyError::WeakKey { .. } => FailureReason::CustodianKeyTooWeak,
                KeyError::KeyWrap(_) | KeyError::KeyUnwrap(_) => FailureReason::KeyWrapFailed,
                KeyError::InvalidWrappedKeySize { .. } => FailureReason::WrappedKeySizeMismatch,
                KeyError::IoError(_) => FailureReason::StorageError,
            },
            ProtectError::CipherError(_) => FailureReason::EncryptionFailed,
            ProtectError::PackageError(e) => match e {
                PackageError::PackageError(PackageErrorKind::ArchiveCreation(_)) => {
                    FailureReason::ArchiveCreationFailed
                }
                PackageError::IoError(_) => FailureReason::StorageError,
                _ => FailureReason::InvalidArchive,
            },
            ProtectError::IoError(_) => FailureReason::StorageError,
            ProtectError::ConfigError(_) => FailureReason::InvalidConfiguration,
            ProtectError::TaskError(_) => FailureReason::Interrupted,
        }
    }
}

/// A closed set of failure reasons. Each has a stable message key that user interfaces can
/// localize, and which tells the user whether to retry or to reconfigure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    KeyGenerationFailed,
    EncryptionFailed,
    InvalidCustodianUrl,
    CustodianUnreachable,
    InvalidCustodianResponse,
    InvalidCustodianKey,
    CustodianKeyTooWeak,
    KeyWrapFailed,
    WrappedKeySizeMismatch,
    ArchiveCreationFailed,
    InvalidArchive,
    StorageError,
    InvalidConfiguration,
    Interrupted,
}

impl FailureReason {
    pub fn message_key(&self) -> &'static str {
        match self {
            FailureReason::KeyGenerationFailed => "key-generation-failed",
            FailureReason::EncryptionFailed => "encryption-failed",
            FailureReason::InvalidCustodianUrl => "custodian-url-invalid",
            FailureReason::CustodianUnreachable => "custodian-unreachable",
            FailureReason::InvalidCustodianResponse => "custodian-response-invalid",
            FailureReason::InvalidCustodianKey => "custodian-key-invalid",
            FailureReason::CustodianKeyTooWeak => "custodian-key-too-weak",
            FailureReason::KeyWrapFailed => "key-wrap-failed",
            FailureReason::WrappedKeySizeMismatch => "wrapped-key-size-mismatch",
            FailureReason::ArchiveCreationFailed => "archive-creation-failed",
            FailureReason::InvalidArchive => "archive-invalid",
            FailureReason::StorageError => "storage-error",
            FailureReason::InvalidConfiguration => "configuration-invalid",
            FailureReason::Interrupted => "protection-interrupted",
        }
    }

    /// Whether the user can sensibly retry later without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::CustodianUnreachable)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_key())
    }
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module provides the error definitions for errors that can occur while generating key
//! material, talking to the Key Access Service, or wrapping content keys.

use thiserror::Error;

/// Specific error types for errors that can occur within the key handling protocols.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The entropy source failed while producing a content encryption key. There is no fallback
    /// to a weaker source.
    #[error("The secure random source failed to produce a content encryption key.")]
    KeyGeneration,

    /// The entropy source failed while producing an initialization vector.
    #[error("The secure random source failed to produce an initialization vector.")]
    IvGeneration,

    /// The custodian base URL could not be parsed, or uses a scheme that is not permitted.
    #[error("The custodian URL `{0}` is not valid.")]
    InvalidCustodianUrl(String),

    /// The custodian could not be reached, or answered with a status other than 200. This is
    /// the only key error that is worth retrying.
    #[error("The custodian could not be reached: {0}")]
    CustodianUnreachable(String),

    /// The custodian answered 200, but the body did not carry a public key in the expected field.
    #[error("The custodian response was not understood: {0}")]
    InvalidCustodianResponse(String),

    /// The public key is not a decodable PEM document.
    #[error("The custodian public key is not valid PEM.")]
    InvalidPem,

    /// The PEM document decoded, but does not hold an RSA public key.
    #[error("The custodian public key data is not an RSA public key: {0}")]
    InvalidKeyData(String),

    /// The custodian key modulus is shorter than the minimum accepted strength.
    #[error("The custodian key is too weak ({bits} bits, at least {minimum} required).")]
    WeakKey { bits: usize, minimum: usize },

    /// The RSA-OAEP primitive failed while wrapping.
    #[error("Wrapping the content key failed: {0}")]
    KeyWrap(String),

    /// The RSA-OAEP primitive failed while unwrapping.
    #[error("Unwrapping the content key failed: {0}")]
    KeyUnwrap(String),

    /// The wrapped key does not have the length implied by the custodian key modulus. This points
    /// to a key or protocol mismatch and is never retried.
    #[error("The wrapped key is {actual} bytes, but {expected} bytes were expected.")]
    InvalidWrappedKeySize { expected: usize, actual: usize },

    /// Error emanating from standard I/O.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl KeyError {
    /// Returns true for failures that are transient by nature and may be retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, KeyError::CustodianUnreachable(_))
    }

    /// Returns true for failures that implicate the custodian public key itself. A cached copy
    /// of such a key must not be served again.
    pub fn implicates_custodian_key(&self) -> bool {
        matches!(
            self,
            KeyError::InvalidPem
                | KeyError::InvalidKeyData(_)
                | KeyError::WeakKey { .. }
                | KeyError::InvalidWrappedKeySize { .. }
        )
    }
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module defines the key handling protocols that are needed to produce protected artifacts.
//! The top-level module defines the protocols as traits, and the various sub-modules implement
//! these traits in some useful ways.
//!
//! There are two relevant types of key: _content encryption keys_ and _wrapping keys_.
//!
//! Content encryption keys (DEKs) are one-time AES-128 keys that encrypt a single asset. They are
//! generated locally for every protect operation, held only in memory, and destroyed as soon as
//! they have been wrapped. The wrapped form embedded in the manifest is the only durable
//! representation of a DEK.
//!
//! Wrapping keys are asymmetric RSA keys owned by a Key Access Service (KAS), the custodian. The
//! custodian publishes the public part over HTTPS; the private part never leaves the custodian,
//! which uses it to unwrap the DEK when a license server decides that playback is allowed.
//!
//! The traits in this module model how wrapping keys are sourced and how wrapped keys are exposed
//! again. The orchestrator is generic over [WrappingKeySource], so the HTTP client in [http], the
//! cache in [cache] and the in-memory pair in [local] can be combined freely.

pub mod cache;
pub mod error;
#[cfg(feature = "kas")]
pub mod http;
pub mod local;
pub mod material;
pub mod wrap;

use async_trait::async_trait;
use std::sync::Arc;

use material::ContentEncryptionKey;

/// Convenient result alias for this module, where errors are of type [error::KeyError].
pub type Result<T> = std::result::Result<T, error::KeyError>;

/// This trait is implemented by objects that can yield the public part of a custodian's wrapping
/// key pair.
///
/// The public key is returned as a PEM document, either a SubjectPublicKeyInfo (`PUBLIC KEY`) or
/// a PKCS#1 `RSA PUBLIC KEY`. It is passed verbatim to [wrap::KeyWrapper::wrap], which performs
/// all validation of the key class and strength.
#[async_trait]
pub trait WrappingKeySource: Send + Sync {
    /// Gets the current public wrapping key of the custodian located at the given base URL.
    async fn get_public(&self, custodian_url: &str) -> Result<String>;
}

#[async_trait]
impl<T: WrappingKeySource + ?Sized> WrappingKeySource for Arc<T> {
    async fn get_public(&self, custodian_url: &str) -> Result<String> {
        (**self).get_public(custodian_url).await
    }
}

/// This trait is implemented by objects that hold the private part of a wrapping key pair and are
/// therefore able to recover a content encryption key from its wrapped form.
///
/// In production only the custodian can do this. Implementations in this crate exist for
/// development and verification of artifacts.
pub trait EncryptionKeyExposure {
    /// Decrypts ("unwraps") the given wrapped key and returns the content encryption key.
    fn expose(&self, wrapped: &[u8]) -> Result<ContentEncryptionKey>;
}

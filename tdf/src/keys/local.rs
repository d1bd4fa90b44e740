// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements the key handling protocols in terms of an RSA key pair that is simply
//! held in local process memory. It stands in for a custodian in development and test
//! environments, and lets the recovery path verify artifacts end to end.

use super::error::KeyError;
use super::material::ContentEncryptionKey;
use super::wrap::OaepDigest;
use super::{EncryptionKeyExposure, Result, WrappingKeySource};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey as RsaPriv, RsaPublicKey as RsaPub};

/// An RSA key pair in local process memory.
///
/// Local key pairs should only be used in dev/test environments, because the private part of the
/// key pair is stored in the process memory, and the public part is not subject to any form of
/// certification.
#[derive(Debug)]
pub struct LocalMemoryKeyPair {
    private_key: RsaPriv,
    public_key: RsaPub,
    digest: OaepDigest,
}

impl LocalMemoryKeyPair {
    /// Creates a random key pair of the given strength in local memory.
    pub fn generate(bits: usize, digest: OaepDigest) -> Result<LocalMemoryKeyPair> {
        let mut rng = OsRng;
        let private_key =
            RsaPriv::new(&mut rng, bits).map_err(|e| KeyError::InvalidKeyData(e.to_string()))?;
        let public_key = RsaPub::from(&private_key);
        Ok(LocalMemoryKeyPair {
            private_key,
            public_key,
            digest,
        })
    }

    /// Loads a key pair from a PKCS#8 PEM-encoded RSA private key.
    pub fn from_pkcs8_pem(pem: &str, digest: OaepDigest) -> Result<LocalMemoryKeyPair> {
        let private_key =
            RsaPriv::from_pkcs8_pem(pem).map_err(|e| KeyError::InvalidKeyData(e.to_string()))?;
        let public_key = RsaPub::from(&private_key);
        Ok(LocalMemoryKeyPair {
            private_key,
            public_key,
            digest,
        })
    }

    /// The public part of the pair as a SubjectPublicKeyInfo PEM document.
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidKeyData(e.to_string()))
    }
}

#[async_trait]
impl WrappingKeySource for LocalMemoryKeyPair {
    async fn get_public(&self, _custodian_url: &str) -> Result<String> {
        self.public_key_pem()
    }
}

impl EncryptionKeyExposure for LocalMemoryKeyPair {
    fn expose(&self, wrapped: &[u8]) -> Result<ContentEncryptionKey> {
        let mut unwrapped = self
            .private_key
            .decrypt(self.digest.padding(), wrapped)
            .map_err(|e| KeyError::KeyUnwrap(e.to_string()))?;
        let key = ContentEncryptionKey::from_slice(&unwrapped);
        zeroize::Zeroize::zeroize(&mut unwrapped);
        key.ok_or_else(|| KeyError::KeyUnwrap(String::from("unwrapped key has the wrong length")))
    }
}

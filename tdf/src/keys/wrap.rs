// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements wrapping of content encryption keys under a custodian's RSA public key.
//!
//! The wrapping algorithm is RSA-OAEP. SHA-1 is the default OAEP digest because the target
//! licensing protocol requires it. It is a compatibility constraint, and [OaepDigest::Sha256] is
//! available for consumers that accept it.

use super::error::KeyError;
use super::material::ContentEncryptionKey;
use super::Result;

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::der::pem as pem_rfc7468;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// The smallest custodian modulus, in bits, that keys may be wrapped under.
pub const MIN_MODULUS_BITS: usize = 2048;

/// The digest used inside the OAEP padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OaepDigest {
    Sha1,
    Sha256,
}

impl Default for OaepDigest {
    fn default() -> Self {
        OaepDigest::Sha1
    }
}

impl OaepDigest {
    pub(crate) fn padding(&self) -> Oaep {
        match self {
            OaepDigest::Sha1 => Oaep::new::<sha1::Sha1>(),
            OaepDigest::Sha256 => Oaep::new::<sha2::Sha256>(),
        }
    }
}

/// A content encryption key after wrapping. Its length always equals the custodian modulus size
/// in bytes (256 bytes for RSA-2048).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The base64 form that is embedded in the manifest.
    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> std::result::Result<WrappedKey, base64::DecodeError> {
        Ok(WrappedKey(base64::decode(encoded)?))
    }
}

/// Wraps content encryption keys with RSA-OAEP, after validating the custodian key.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyWrapper {
    digest: OaepDigest,
}

impl KeyWrapper {
    pub fn new(digest: OaepDigest) -> KeyWrapper {
        KeyWrapper { digest }
    }

    pub fn digest(&self) -> OaepDigest {
        self.digest
    }

    /// Wraps the given key under the PEM-encoded RSA public key.
    ///
    /// The key is parsed and its class checked first. Keys whose modulus is below
    /// [MIN_MODULUS_BITS] are rejected with [KeyError::WeakKey] before any OAEP operation. The
    /// output is then checked against the modulus size, and any mismatch is a fatal
    /// [KeyError::InvalidWrappedKeySize].
    pub fn wrap(&self, dek: &ContentEncryptionKey, public_key_pem: &str) -> Result<WrappedKey> {
        let public_key = parse_public_key_pem(public_key_pem)?;

        let bits = public_key.n().bits();
        if bits < MIN_MODULUS_BITS {
            return Err(KeyError::WeakKey {
                bits,
                minimum: MIN_MODULUS_BITS,
            });
        }

        let mut rng = OsRng;
        let wrapped = public_key
            .encrypt(&mut rng, self.digest.padding(), dek.as_bytes())
            .map_err(|e| KeyError::KeyWrap(e.to_string()))?;

        check_wrapped_len(&public_key, wrapped.len())?;
        Ok(WrappedKey(wrapped))
    }
}

fn check_wrapped_len(public_key: &RsaPublicKey, actual: usize) -> Result<()> {
    let expected = public_key.size();
    if actual != expected {
        return Err(KeyError::InvalidWrappedKeySize { expected, actual });
    }
    Ok(())
}

/// Parses an RSA public key from PEM.
///
/// Both SubjectPublicKeyInfo (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) documents are accepted.
/// A document that cannot be decoded is [KeyError::InvalidPem]. A document with any other label
/// (a private key or a certificate, say), or whose contents are not an RSA key, is
/// [KeyError::InvalidKeyData].
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey> {
    let (label, der) =
        pem_rfc7468::decode_vec(pem.trim().as_bytes()).map_err(|_| KeyError::InvalidPem)?;
    if der.is_empty() {
        return Err(KeyError::InvalidPem);
    }
    match label {
        "PUBLIC KEY" => RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| KeyError::InvalidKeyData(e.to_string())),
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_der(&der)
            .map_err(|e| KeyError::InvalidKeyData(e.to_string())),
        other => Err(KeyError::InvalidKeyData(format!(
            "unexpected PEM label `{}`",
            other
        ))),
    }
}

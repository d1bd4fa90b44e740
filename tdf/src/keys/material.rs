// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Generation and ownership of the per-asset key material: the content encryption key (DEK) and
//! the CBC initialization vector (IV).

use super::error::KeyError;
use super::Result;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use std::fmt;

/// Length of a content encryption key in bytes (AES-128).
pub const KEY_LEN: usize = 16;

/// Length of an initialization vector in bytes (one AES block).
pub const IV_LEN: usize = 16;

/// A one-time AES-128 content encryption key.
///
/// The key is not `Clone`, never prints its bytes, and is zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentEncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl ContentEncryptionKey {
    /// Makes a key from raw bytes, for example when a wrapped key has been exposed again.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> ContentEncryptionKey {
        ContentEncryptionKey { bytes }
    }

    /// Makes a key from a slice, which must be exactly [KEY_LEN] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<ContentEncryptionKey> {
        let mut key = [0_u8; KEY_LEN];
        if bytes.len() != KEY_LEN {
            return None;
        }
        key.copy_from_slice(bytes);
        Some(ContentEncryptionKey { bytes: key })
    }

    /// Borrows the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for ContentEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentEncryptionKey(<redacted>)")
    }
}

/// The CBC initialization vector for one protect operation. IVs are not secret: this value is
/// stored in clear, base64-encoded, inside the manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitializationVector([u8; IV_LEN]);

impl InitializationVector {
    pub fn from_bytes(bytes: [u8; IV_LEN]) -> InitializationVector {
        InitializationVector(bytes)
    }

    /// Makes an IV from a slice, which must be exactly [IV_LEN] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<InitializationVector> {
        let mut iv = [0_u8; IV_LEN];
        if bytes.len() != IV_LEN {
            return None;
        }
        iv.copy_from_slice(bytes);
        Some(InitializationVector(iv))
    }

    pub fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::encode(self.0)
    }
}

/// The entropy source could not produce the requested bytes.
#[derive(Debug, Clone, Copy)]
pub struct EntropyUnavailable;

/// A source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fills the whole of `dest` with random bytes, or reports failure. Implementations must not
    /// fall back to a weaker source.
    fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), EntropyUnavailable>;
}

impl<E: EntropySource + ?Sized> EntropySource for Box<E> {
    fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), EntropyUnavailable> {
        (**self).fill(dest)
    }
}

/// The operating system CSPRNG, as exposed by `ring`.
pub struct SystemEntropy {
    rng: SystemRandom,
}

impl SystemEntropy {
    pub fn new() -> SystemEntropy {
        SystemEntropy {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        SystemEntropy::new()
    }
}

impl EntropySource for SystemEntropy {
    fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), EntropyUnavailable> {
        self.rng.fill(dest).map_err(|_| EntropyUnavailable)
    }
}

/// Produces fresh DEKs and IVs for each protect operation.
pub struct KeyMaterialGenerator<E: EntropySource = SystemEntropy> {
    entropy: E,
}

impl KeyMaterialGenerator<SystemEntropy> {
    /// Creates a generator backed by the operating system CSPRNG.
    pub fn new() -> KeyMaterialGenerator<SystemEntropy> {
        KeyMaterialGenerator {
            entropy: SystemEntropy::new(),
        }
    }
}

impl Default for KeyMaterialGenerator<SystemEntropy> {
    fn default() -> Self {
        KeyMaterialGenerator::new()
    }
}

impl<E: EntropySource> KeyMaterialGenerator<E> {
    /// Creates a generator backed by the given entropy source.
    pub fn with_entropy(entropy: E) -> KeyMaterialGenerator<E> {
        KeyMaterialGenerator { entropy }
    }

    /// Generates a random 16-byte content encryption key.
    pub fn generate_key(&self) -> Result<ContentEncryptionKey> {
        let mut key = ContentEncryptionKey::from_bytes([0_u8; KEY_LEN]);
        self.entropy
            .fill(&mut key.bytes)
            .map_err(|_| KeyError::KeyGeneration)?;
        Ok(key)
    }

    /// Generates a random 16-byte initialization vector.
    pub fn generate_iv(&self) -> Result<InitializationVector> {
        let mut iv = [0_u8; IV_LEN];
        self.entropy
            .fill(&mut iv)
            .map_err(|_| KeyError::IvGeneration)?;
        Ok(InitializationVector(iv))
    }
}

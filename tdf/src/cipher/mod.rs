// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements the symmetric content cipher.
//!
//! Payloads are encrypted with AES-128 in CBC mode with PKCS#7 padding. CBC is dictated by the
//! downstream playback protocol, which expects CBC-compatible segment encryption. Encryption is
//! deterministic for a given (plaintext, key, IV) triple.

use crate::keys::material::{IV_LEN, KEY_LEN};

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Errors raised by the content cipher. Size checks happen before any cipher call.
#[derive(Error, Debug, PartialEq)]
pub enum CipherError {
    #[error("The content key must be 16 bytes, but {0} bytes were given.")]
    InvalidKeySize(usize),

    #[error("The initialization vector must be 16 bytes, but {0} bytes were given.")]
    InvalidIvSize(usize),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// Convenient result alias for this module.
pub type Result<T> = std::result::Result<T, CipherError>;

/// The symmetric encryption methods known to this crate. The manifest carries the historical
/// string tag of the method, while code matches on this closed enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// AES with a 128-bit key in CBC mode, PKCS#7 padded.
    #[serde(rename = "AES-128-CBC")]
    Aes128Cbc,
}

impl EncryptionMethod {
    /// The tag written into the manifest for this method.
    pub fn tag(&self) -> &'static str {
        match self {
            EncryptionMethod::Aes128Cbc => "AES-128-CBC",
        }
    }
}

impl Default for EncryptionMethod {
    fn default() -> Self {
        EncryptionMethod::Aes128Cbc
    }
}

/// Encrypts and decrypts payloads with a given [EncryptionMethod].
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentCipher {
    method: EncryptionMethod,
}

impl ContentCipher {
    pub fn new(method: EncryptionMethod) -> ContentCipher {
        ContentCipher { method }
    }

    pub fn method(&self) -> EncryptionMethod {
        self.method
    }

    /// Encrypts the plaintext under the given key and IV.
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        check_sizes(key, iv)?;
        match self.method {
            EncryptionMethod::Aes128Cbc => {
                let encryptor = Aes128CbcEnc::new_from_slices(key, iv)
                    .map_err(|e| CipherError::Encryption(e.to_string()))?;
                Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
        }
    }

    /// Decrypts the ciphertext under the given key and IV. This is the exact inverse of
    /// [ContentCipher::encrypt].
    pub fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        check_sizes(key, iv)?;
        match self.method {
            EncryptionMethod::Aes128Cbc => {
                let decryptor = Aes128CbcDec::new_from_slices(key, iv)
                    .map_err(|e| CipherError::Decryption(e.to_string()))?;
                decryptor
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| CipherError::Decryption(String::from("bad padding or length")))
            }
        }
    }
}

fn check_sizes(key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeySize(key.len()));
    }
    if iv.len() != IV_LEN {
        return Err(CipherError::InvalidIvSize(iv.len()));
    }
    Ok(())
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Recovery of the plaintext from a protected artifact, given access to the private wrapping key.
//!
//! In production, only the license server can unwrap a content key. This module is its local
//! counterpart, used during development and to verify that artifacts decrypt end to end.

use super::Result;
use crate::cipher::ContentCipher;
use crate::keys::EncryptionKeyExposure;
use crate::package::archive::ArchiveCodec;
use crate::package::manifest::v1::Manifest;

use log::debug;

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Decrypts the artifact at the given path.
pub fn recover_plaintext<K: EncryptionKeyExposure>(artifact: &Path, exposure: &K) -> Result<Vec<u8>> {
    let reader = BufReader::new(File::open(artifact)?);
    recover_from_reader(reader, exposure)
}

/// Decrypts an artifact held in memory.
pub fn recover_from_bytes<K: EncryptionKeyExposure>(archive: &[u8], exposure: &K) -> Result<Vec<u8>> {
    recover_from_reader(Cursor::new(archive), exposure)
}

fn recover_from_reader<R: Read + Seek, K: EncryptionKeyExposure>(
    reader: R,
    exposure: &K,
) -> Result<Vec<u8>> {
    let (manifest_bytes, ciphertext) = ArchiveCodec.read(reader)?;
    let manifest = Manifest::from_bytes(&manifest_bytes)?;
    debug!(
        "Recovering asset {} protected at {}",
        manifest.meta.asset_id, manifest.meta.protected_at
    );

    let iv = manifest.iv()?;
    let wrapped = manifest.wrapped_key()?;
    let key = exposure.expose(wrapped.as_bytes())?;
    let cipher = ContentCipher::new(manifest.encryption_information.method.algorithm);
    let plaintext = cipher.decrypt(&ciphertext, key.as_bytes(), iv.as_bytes())?;
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::error::KeyError;
    use crate::keys::local::LocalMemoryKeyPair;
    use crate::keys::material::{ContentEncryptionKey, InitializationVector};
    use crate::keys::wrap::{KeyWrapper, OaepDigest};
    use crate::package::manifest::ManifestBuilder;
    use crate::protect::error::ProtectError;

    const KAS_PRIVATE: &str = include_str!("../../testdata/kas_rsa2048_private.pem");
    const KAS_PUBLIC: &str = include_str!("../../testdata/kas_rsa2048_public.pem");
    const OTHER_PRIVATE: &str = include_str!("../../testdata/kas_rsa3072_private.pem");
    const PLAINTEXT: &[u8] = b"I have thee not, and yet I see thee still.";

    fn protect_in_memory() -> Vec<u8> {
        let key = ContentEncryptionKey::from_bytes([0x2b; 16]);
        let iv = InitializationVector::from_bytes([0x7e; 16]);
        let ciphertext = ContentCipher::default()
            .encrypt(PLAINTEXT, key.as_bytes(), iv.as_bytes())
            .unwrap();
        let wrapped = KeyWrapper::default().wrap(&key, KAS_PUBLIC).unwrap();
        let manifest = ManifestBuilder::new()
            .build(&wrapped, &iv, "asset-1", "https://kas.example.com")
            .unwrap();
        ArchiveCodec.write(&manifest, &ciphertext).unwrap()
    }

    #[test]
    fn test_recover_from_bytes() {
        let pair = LocalMemoryKeyPair::from_pkcs8_pem(KAS_PRIVATE, OaepDigest::Sha1).unwrap();
        let recovered = recover_from_bytes(&protect_in_memory(), &pair).unwrap();
        assert_eq!(recovered, PLAINTEXT);
    }

    #[test]
    fn test_recover_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("clip.mov.tdf");
        std::fs::write(&artifact, protect_in_memory()).unwrap();
        let pair = LocalMemoryKeyPair::from_pkcs8_pem(KAS_PRIVATE, OaepDigest::Sha1).unwrap();
        assert_eq!(recover_plaintext(&artifact, &pair).unwrap(), PLAINTEXT);
    }

    #[test]
    fn test_wrong_private_key() {
        let pair = LocalMemoryKeyPair::from_pkcs8_pem(OTHER_PRIVATE, OaepDigest::Sha1).unwrap();
        match recover_from_bytes(&protect_in_memory(), &pair).unwrap_err() {
            ProtectError::KeyError(KeyError::KeyUnwrap(_)) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }

    #[test]
    fn test_missing_artifact() {
        let pair = LocalMemoryKeyPair::from_pkcs8_pem(KAS_PRIVATE, OaepDigest::Sha1).unwrap();
        match recover_plaintext(Path::new("/nonexistent/clip.mov.tdf"), &pair).unwrap_err() {
            ProtectError::IoError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }
}

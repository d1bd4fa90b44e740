// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements Version 1 of the manifest JSON document.
//!
//! Field declaration order is the canonical key order of the document. Serialization is compact,
//! so two manifests with identical contents are byte-identical.

use crate::cipher::EncryptionMethod;
use crate::keys::material::InitializationVector;
use crate::keys::wrap::WrappedKey;
use crate::package::error::{Error, PackageErrorKind};
use crate::package::Result;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the content key is split between key access entries. Only a single, unsplit key is
/// produced, but the historical tag is kept for wire compatibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScheme {
    Split,
}

/// How a key access entry carries the content key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAccessType {
    /// The content key is embedded, wrapped under the custodian public key.
    Wrapped,
}

/// The protocol spoken by the custodian named in a key access entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyProtocol {
    Kas,
}

/// How the payload is located.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadType {
    /// The payload is a separate entry of the same archive, named by [Payload::url].
    Reference,
}

/// Describes where the wrapped content key is held and who can unwrap it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAccess {
    #[serde(rename = "type")]
    pub access_type: KeyAccessType,

    /// Base URL of the custodian that holds the private wrapping key.
    pub url: String,

    pub protocol: KeyProtocol,

    /// The content key, RSA-OAEP wrapped and base64-encoded.
    pub wrapped_key: String,
}

/// The symmetric encryption applied to the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub algorithm: EncryptionMethod,

    /// The base64-encoded 16-byte initialization vector.
    pub iv: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInformation {
    #[serde(rename = "type")]
    pub scheme: KeyScheme,

    pub key_access: Vec<KeyAccess>,

    pub method: Method,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(rename = "type")]
    pub payload_type: PayloadType,

    /// Location of the ciphertext, relative to the manifest.
    pub url: String,

    /// MIME type of the source asset.
    pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// The opaque identifier of the source asset.
    pub asset_id: String,

    /// Time of protection, RFC 3339 in UTC with millisecond precision.
    pub protected_at: String,
}

impl Meta {
    /// Parses the protection timestamp.
    pub fn protected_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.protected_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// The root level of the manifest document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub encryption_information: EncryptionInformation,
    pub payload: Payload,
    pub meta: Meta,
}

impl Manifest {
    /// Serializes the manifest in canonical form.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses and validates a manifest.
    ///
    /// Unknown method or key access tags are reported as such, rather than as generic JSON
    /// errors, so that a reader can tell a newer manifest from a damaged one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Manifest> {
        let document: Value = serde_json::from_slice(bytes)?;
        check_tags(&document)?;
        let manifest: Manifest = serde_json::from_value(document)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The single key access entry.
    pub fn key_access(&self) -> Result<&KeyAccess> {
        match self.encryption_information.key_access.as_slice() {
            [only] => Ok(only),
            entries => Err(Error::PackageError(PackageErrorKind::UnsupportedKeyAccess(
                format!("expected one key access entry, found {}", entries.len()),
            ))),
        }
    }

    pub fn iv(&self) -> Result<InitializationVector> {
        base64::decode(&self.encryption_information.method.iv)
            .ok()
            .and_then(|bytes| InitializationVector::from_slice(&bytes))
            .ok_or(Error::PackageError(PackageErrorKind::InvalidIv))
    }

    pub fn wrapped_key(&self) -> Result<WrappedKey> {
        let key_access = self.key_access()?;
        match WrappedKey::from_base64(&key_access.wrapped_key) {
            Ok(wrapped) if !wrapped.as_bytes().is_empty() => Ok(wrapped),
            _ => Err(Error::PackageError(PackageErrorKind::InvalidWrappedKey)),
        }
    }

    fn validate(&self) -> Result<()> {
        self.iv()?;
        self.wrapped_key()?;
        Ok(())
    }
}

fn check_tags(document: &Value) -> Result<()> {
    if let Some(tag) = document
        .pointer("/encryptionInformation/method/algorithm")
        .and_then(Value::as_str)
    {
        if serde_json::from_value::<EncryptionMethod>(Value::from(tag)).is_err() {
            return Err(Error::PackageError(
                PackageErrorKind::UnsupportedEncryptionMethod(String::from(tag)),
            ));
        }
    }

    check_tag::<KeyScheme>(document, "/encryptionInformation/type")?;
    if let Some(entries) = document
        .pointer("/encryptionInformation/keyAccess")
        .and_then(Value::as_array)
    {
        for entry in entries {
            check_tag::<KeyAccessType>(entry, "/type")?;
            check_tag::<KeyProtocol>(entry, "/protocol")?;
        }
    }
    Ok(())
}

fn check_tag<T: serde::de::DeserializeOwned>(document: &Value, pointer: &str) -> Result<()> {
    match document.pointer(pointer).and_then(Value::as_str) {
        Some(tag) if serde_json::from_value::<T>(Value::from(tag)).is_err() => Err(
            Error::PackageError(PackageErrorKind::UnsupportedKeyAccess(format!(
                "unknown tag `{}`",
                tag
            ))),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{"encryptionInformation":{"type":"split","keyAccess":[{"type":"wrapped","url":"https://kas.example.com","protocol":"kas","wrappedKey":"AAEC"}],"method":{"algorithm":"AES-128-CBC","iv":"AAAAAAAAAAAAAAAAAAAAAA=="}},"payload":{"type":"reference","url":"0.payload","mimeType":"video/quicktime"},"meta":{"assetId":"asset-1","protectedAt":"2021-06-01T12:00:00.000Z"}}"#;

    fn expect_kind(bytes: &str, kind: PackageErrorKind) {
        match Manifest::from_bytes(bytes.as_bytes()).unwrap_err() {
            Error::PackageError(k) => assert_eq!(kind, k),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }

    #[test]
    fn test_parse_and_reserialize() {
        let manifest = Manifest::from_bytes(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.meta.asset_id, "asset-1");
        assert_eq!(manifest.payload.url, "0.payload");
        assert_eq!(
            manifest.encryption_information.method.algorithm,
            EncryptionMethod::Aes128Cbc
        );
        assert_eq!(manifest.key_access().unwrap().url, "https://kas.example.com");
        assert_eq!(manifest.wrapped_key().unwrap().as_bytes(), &[0_u8, 1, 2]);
        assert_eq!(manifest.iv().unwrap().as_bytes(), &[0_u8; 16]);
        assert_eq!(
            manifest.to_canonical_bytes().unwrap(),
            MANIFEST.as_bytes().to_vec()
        );
    }

    #[test]
    fn test_protected_at() {
        let manifest = Manifest::from_bytes(MANIFEST.as_bytes()).unwrap();
        let t = manifest.meta.protected_at_utc().unwrap();
        assert_eq!(t.to_rfc3339(), "2021-06-01T12:00:00+00:00");

        let mut meta = manifest.meta.clone();
        meta.protected_at = String::from("yesterday");
        assert!(meta.protected_at_utc().is_none());
    }

    #[test]
    fn test_unsupported_method() {
        expect_kind(
            &MANIFEST.replace("AES-128-CBC", "AES-256-GCM"),
            PackageErrorKind::UnsupportedEncryptionMethod(String::from("AES-256-GCM")),
        );
    }

    #[test]
    fn test_unsupported_key_access() {
        for (from, to) in [
            (r#""type":"wrapped""#, r#""type":"remote""#),
            (r#""protocol":"kas""#, r#""protocol":"kms""#),
            (r#""type":"split""#, r#""type":"shared""#),
        ]
        .iter()
        {
            match Manifest::from_bytes(MANIFEST.replace(from, to).as_bytes()).unwrap_err() {
                Error::PackageError(PackageErrorKind::UnsupportedKeyAccess(_)) => (),
                e => panic!("Unexpected error type: {:?}", e),
            }
        }
    }

    #[test]
    fn test_key_access_must_be_single() {
        let empty = MANIFEST.replace(
            r#""keyAccess":[{"type":"wrapped","url":"https://kas.example.com","protocol":"kas","wrappedKey":"AAEC"}]"#,
            r#""keyAccess":[]"#,
        );
        match Manifest::from_bytes(empty.as_bytes()).unwrap_err() {
            Error::PackageError(PackageErrorKind::UnsupportedKeyAccess(_)) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }

    #[test]
    fn test_invalid_iv() {
        expect_kind(
            &MANIFEST.replace("AAAAAAAAAAAAAAAAAAAAAA==", "AAAA"),
            PackageErrorKind::InvalidIv,
        );
        expect_kind(
            &MANIFEST.replace("AAAAAAAAAAAAAAAAAAAAAA==", "!!"),
            PackageErrorKind::InvalidIv,
        );
    }

    #[test]
    fn test_invalid_wrapped_key() {
        expect_kind(
            &MANIFEST.replace(r#""wrappedKey":"AAEC""#, r#""wrappedKey":"%%%""#),
            PackageErrorKind::InvalidWrappedKey,
        );
        expect_kind(
            &MANIFEST.replace(r#""wrappedKey":"AAEC""#, r#""wrappedKey":"""#),
            PackageErrorKind::InvalidWrappedKey,
        );
    }

    #[test]
    fn test_malformed_json() {
        match Manifest::from_bytes(b"{\"payload\":").unwrap_err() {
            Error::JsonError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
        match Manifest::from_bytes(b"{}").unwrap_err() {
            Error::JsonError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }
}

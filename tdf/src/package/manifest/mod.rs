// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements the manifest for protected artifacts. The manifest is a JSON document,
//! and exactly one manifest is embedded as the first entry of every artifact. It tells a license
//! server which custodian can unwrap the content key, and tells a player how to decrypt the
//! payload.

pub mod v1;

use crate::cipher::EncryptionMethod;
use crate::keys::material::InitializationVector;
use crate::keys::wrap::WrappedKey;
use crate::package::archive::PAYLOAD_ENTRY;
use crate::package::Result;
use v1::{
    EncryptionInformation, KeyAccess, KeyAccessType, KeyProtocol, KeyScheme, Manifest, Meta,
    Method, Payload, PayloadType,
};

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use std::path::Path;

/// MIME type used when the asset extension is not recognised.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Assembles manifests. Building has no side effects other than reading the clock when no
/// protection time has been given.
#[derive(Clone, Debug)]
pub struct ManifestBuilder {
    method: EncryptionMethod,
    mime_type: String,
    protected_at: Option<DateTime<Utc>>,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        ManifestBuilder::new()
    }
}

impl ManifestBuilder {
    pub fn new() -> ManifestBuilder {
        ManifestBuilder {
            method: EncryptionMethod::default(),
            mime_type: String::from(DEFAULT_MIME_TYPE),
            protected_at: None,
        }
    }

    pub fn method(mut self, method: EncryptionMethod) -> ManifestBuilder {
        self.method = method;
        self
    }

    pub fn mime_type(mut self, mime_type: &str) -> ManifestBuilder {
        self.mime_type = String::from(mime_type);
        self
    }

    /// Fixes the protection time. Otherwise the current time is taken when building. Either way
    /// the recorded time is rounded up to the next whole millisecond.
    pub fn protected_at(mut self, protected_at: DateTime<Utc>) -> ManifestBuilder {
        self.protected_at = Some(protected_at);
        self
    }

    /// Builds the manifest document.
    pub fn build_manifest(
        &self,
        wrapped_key: &WrappedKey,
        iv: &InitializationVector,
        asset_id: &str,
        custodian_url: &str,
    ) -> Manifest {
        let protected_at = ceil_to_millis(self.protected_at.unwrap_or_else(Utc::now));
        Manifest {
            encryption_information: EncryptionInformation {
                scheme: KeyScheme::Split,
                key_access: vec![KeyAccess {
                    access_type: KeyAccessType::Wrapped,
                    url: String::from(custodian_url),
                    protocol: KeyProtocol::Kas,
                    wrapped_key: wrapped_key.to_base64(),
                }],
                method: Method {
                    algorithm: self.method,
                    iv: iv.to_base64(),
                },
            },
            payload: Payload {
                payload_type: PayloadType::Reference,
                url: String::from(PAYLOAD_ENTRY),
                mime_type: self.mime_type.clone(),
            },
            meta: Meta {
                asset_id: String::from(asset_id),
                protected_at: protected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }

    /// Builds the manifest and serializes it in canonical form.
    pub fn build(
        &self,
        wrapped_key: &WrappedKey,
        iv: &InitializationVector,
        asset_id: &str,
        custodian_url: &str,
    ) -> Result<Vec<u8>> {
        self.build_manifest(wrapped_key, iv, asset_id, custodian_url)
            .to_canonical_bytes()
    }
}

/// Rounds up to the millisecond, so a recorded time is never earlier than the instant it records.
fn ceil_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    let excess = time.timestamp_subsec_nanos() % 1_000_000;
    if excess == 0 {
        time
    } else {
        time + Duration::nanoseconds(i64::from(1_000_000 - excess))
    }
}

/// Guesses the MIME type of a source asset from its file extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return DEFAULT_MIME_TYPE,
    };
    match extension.as_str() {
        "mov" | "qt" => "video/quicktime",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        _ => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const EXPECTED: &str = r#"{"encryptionInformation":{"type":"split","keyAccess":[{"type":"wrapped","url":"https://kas.example.com","protocol":"kas","wrappedKey":"AAEC"}],"method":{"algorithm":"AES-128-CBC","iv":"AAAAAAAAAAAAAAAAAAAAAA=="}},"payload":{"type":"reference","url":"0.payload","mimeType":"video/quicktime"},"meta":{"assetId":"asset-1","protectedAt":"2021-06-01T12:00:00.000Z"}}"#;

    fn wrapped() -> WrappedKey {
        WrappedKey::from_base64("AAEC").unwrap()
    }

    fn iv() -> InitializationVector {
        InitializationVector::from_bytes([0_u8; 16])
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_canonical_bytes() {
        let bytes = ManifestBuilder::new()
            .mime_type("video/quicktime")
            .protected_at(noon())
            .build(&wrapped(), &iv(), "asset-1", "https://kas.example.com")
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), EXPECTED);
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let builder = ManifestBuilder::new().protected_at(noon());
        let first = builder
            .build(&wrapped(), &iv(), "asset-1", "https://kas.example.com")
            .unwrap();
        let second = builder
            .build(&wrapped(), &iv(), "asset-1", "https://kas.example.com")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_builds_differ_only_in_timestamp() {
        let first = ManifestBuilder::new()
            .build_manifest(&wrapped(), &iv(), "asset-1", "https://kas.example.com");
        let mut second = ManifestBuilder::new()
            .protected_at(noon())
            .build_manifest(&wrapped(), &iv(), "asset-1", "https://kas.example.com");
        assert_ne!(first.meta.protected_at, second.meta.protected_at);
        second.meta.protected_at = first.meta.protected_at.clone();
        assert_eq!(
            first.to_canonical_bytes().unwrap(),
            second.to_canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_built_manifest_parses() {
        let bytes = ManifestBuilder::new()
            .build(&wrapped(), &iv(), "asset-1", "https://kas.example.com")
            .unwrap();
        let manifest = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(manifest.meta.asset_id, "asset-1");
        assert_eq!(manifest.payload.mime_type, DEFAULT_MIME_TYPE);
        assert!(manifest.meta.protected_at_utc().is_some());
        assert!(manifest.meta.protected_at.ends_with('Z'));
    }

    #[test]
    fn test_key_access_and_iv_encoding() {
        let manifest = ManifestBuilder::new().build_manifest(
            &wrapped(),
            &iv(),
            "asset-1",
            "https://kas.example.com",
        );
        assert_eq!(manifest.key_access().unwrap().wrapped_key, "AAEC");
        assert_eq!(manifest.encryption_information.method.iv.len(), 24);
    }

    #[test]
    fn test_protection_time_rounds_up_to_the_millisecond() {
        let read = Utc
            .with_ymd_and_hms(2021, 6, 1, 12, 0, 0)
            .unwrap()
            .with_nanosecond(649_418_639)
            .unwrap();
        let manifest = ManifestBuilder::new()
            .protected_at(read)
            .build_manifest(&wrapped(), &iv(), "asset-1", "https://kas.example.com");
        assert_eq!(manifest.meta.protected_at, "2021-06-01T12:00:00.650Z");
        assert!(manifest.meta.protected_at_utc().unwrap() >= read);

        let exact = noon().with_nanosecond(649_000_000).unwrap();
        assert_eq!(ceil_to_millis(exact), exact);
    }

    #[test]
    fn test_clock_time_is_not_before_the_build() {
        for _ in 0..20 {
            let started = Utc::now();
            let manifest = ManifestBuilder::new().build_manifest(
                &wrapped(),
                &iv(),
                "asset-1",
                "https://kas.example.com",
            );
            assert!(manifest.meta.protected_at_utc().unwrap() >= started);
        }
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for_path(Path::new("/tmp/clip.mov")), "video/quicktime");
        assert_eq!(mime_type_for_path(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(mime_type_for_path(Path::new("take.m4a")), "audio/mp4");
        assert_eq!(mime_type_for_path(Path::new("still.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("notes.xyz")), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for_path(Path::new("README")), DEFAULT_MIME_TYPE);
    }
}

// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Configuration values that are injected into a [super::ProtectionOrchestrator] at construction.
//!
//! A configuration can be assembled in code, or loaded from a JSON document such as the
//! following, in which every field other than `custodian_url` is optional:
//!
//! ```json
//! {
//!     "custodian_url": "https://kas.example.com",
//!     "kas": { "public_key_field": "publicKey", "timeout_secs": 30 },
//!     "retry": { "max_attempts": 3, "initial_backoff_ms": 250 },
//!     "key_cache_ttl_secs": 300,
//!     "oaep_digest": "sha1"
//! }
//! ```

use super::error::ProtectError;
use super::Result;
use crate::keys::wrap::OaepDigest;

use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// The well-known path, relative to the custodian base URL, of the public key endpoint.
pub const DEFAULT_KEY_PATH: &str = "kas/v2/kas_public_key";

/// The JSON field in which the custodian returns its PEM public key. Client and server must agree
/// on this name. Older custodians use `public_key`, which can be selected through
/// [KasSettings::public_key_field].
pub const DEFAULT_PUBLIC_KEY_FIELD: &str = "publicKey";

pub const DEFAULT_KAS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 300;

/// How the Key Access Service is contacted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KasSettings {
    /// Path of the public key endpoint, joined onto the custodian base URL.
    pub key_path: String,

    /// The field of the JSON response body that carries the PEM public key.
    pub public_key_field: String,

    /// Timeout for the whole key fetch request, in seconds.
    pub timeout_secs: u64,

    /// Permits plain `http` custodian URLs. Only ever useful against a local test custodian.
    pub allow_insecure_http: bool,
}

impl Default for KasSettings {
    fn default() -> Self {
        KasSettings {
            key_path: String::from(DEFAULT_KEY_PATH),
            public_key_field: String::from(DEFAULT_PUBLIC_KEY_FIELD),
            timeout_secs: DEFAULT_KAS_TIMEOUT_SECS,
            allow_insecure_http: false,
        }
    }
}

impl KasSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry behaviour for the key fetch, which is the only pipeline stage that is ever retried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of fetch attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay after the first failed attempt. The delay doubles after each further failure.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            initial_backoff_ms: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// The delay to observe after the given (1-based) failed attempt.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1_u64 << exponent))
    }
}

/// The complete configuration of a protection orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Base URL of the Key Access Service that custodies the wrapping key.
    pub custodian_url: String,

    #[serde(default)]
    pub kas: KasSettings,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Lifetime of a cached custodian public key. Zero disables caching.
    #[serde(default = "default_key_cache_ttl_secs")]
    pub key_cache_ttl_secs: u64,

    #[serde(default)]
    pub oaep_digest: OaepDigest,
}

fn default_key_cache_ttl_secs() -> u64 {
    DEFAULT_KEY_CACHE_TTL_SECS
}

impl ProtectionConfig {
    /// Makes a configuration with default settings for the given custodian.
    pub fn new(custodian_url: &str) -> ProtectionConfig {
        ProtectionConfig {
            custodian_url: String::from(custodian_url),
            kas: KasSettings::default(),
            retry: RetryPolicy::default(),
            key_cache_ttl_secs: DEFAULT_KEY_CACHE_TTL_SECS,
            oaep_digest: OaepDigest::default(),
        }
    }

    /// Loads a configuration from the JSON file at the given path.
    pub fn from_file_path<P: AsRef<Path>>(file_path: P) -> Result<ProtectionConfig> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let config: ProtectionConfig = serde_json::from_reader(reader)
            .map_err(|e| ProtectError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.custodian_url.trim().is_empty() {
            return Err(ProtectError::ConfigError(String::from(
                "the custodian URL must not be empty",
            )));
        }
        if self.kas.public_key_field.is_empty() {
            return Err(ProtectError::ConfigError(String::from(
                "the public key field name must not be empty",
            )));
        }
        Ok(())
    }

    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_document_takes_defaults() {
        let config: ProtectionConfig =
            serde_json::from_str(r#"{ "custodian_url": "https://kas.example.com" }"#).unwrap();
        assert_eq!(config, ProtectionConfig::new("https://kas.example.com"));
        assert_eq!(config.kas.key_path, "kas/v2/kas_public_key");
        assert_eq!(config.kas.public_key_field, "publicKey");
        assert_eq!(config.oaep_digest, OaepDigest::Sha1);
        assert_eq!(config.key_cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_full_document() {
        let config: ProtectionConfig = serde_json::from_str(
            r#"{
                "custodian_url": "https://kas.example.com/tenant",
                "kas": { "public_key_field": "public_key", "allow_insecure_http": true },
                "retry": { "max_attempts": 5 },
                "key_cache_ttl_secs": 0,
                "oaep_digest": "sha256"
            }"#,
        )
        .unwrap();
        assert_eq!(config.kas.public_key_field, "public_key");
        assert_eq!(config.kas.key_path, DEFAULT_KEY_PATH);
        assert!(config.kas.allow_insecure_http);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
        assert_eq!(config.key_cache_ttl_secs, 0);
        assert_eq!(config.oaep_digest, OaepDigest::Sha256);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(250));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(1000));
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
        let zero = RetryPolicy {
            max_attempts: 0,
            initial_backoff_ms: 10,
        };
        assert_eq!(zero.attempts(), 1);
    }

    #[test]
    fn test_from_file_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "custodian_url": "https://kas.example.com" }"#)
            .unwrap();
        let config = ProtectionConfig::from_file_path(file.path()).unwrap();
        assert_eq!(config.custodian_url, "https://kas.example.com");
    }

    #[test]
    fn test_from_file_path_rejects_bad_documents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "kas": {} }"#).unwrap();
        match ProtectionConfig::from_file_path(file.path()).unwrap_err() {
            ProtectError::ConfigError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "custodian_url": "  " }"#).unwrap();
        match ProtectionConfig::from_file_path(file.path()).unwrap_err() {
            ProtectError::ConfigError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        match ProtectionConfig::from_file_path("/nonexistent/tdf/config.json").unwrap_err() {
            ProtectError::IoError(_) => (),
            e => panic!("Unexpected error type: {:?}", e),
        }
    }
}

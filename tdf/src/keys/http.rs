// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements retrieval of the custodian's public wrapping key in terms of the
//! HTTP/REST contract of a Key Access Service (KAS).
//!
//! The contract is a single request:
//!
//! ```text
//! GET {custodian base URL}/kas/v2/kas_public_key?algorithm=rsa
//!
//! 200 OK
//! { "publicKey": "-----BEGIN PUBLIC KEY-----\n..." }
//! ```
//!
//! The key path and the name of the response field are configurable through
//! [KasSettings](crate::protect::config::KasSettings), and must match the custodian deployment.

use super::error::KeyError;
use super::{Result, WrappingKeySource};
use crate::protect::config::KasSettings;

use async_trait::async_trait;
use log::debug;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

/// The asymmetric algorithm family requested from the custodian.
const ALGORITHM_RSA: &str = "rsa";

/// A client for the public key endpoint of a Key Access Service.
#[derive(Clone, Debug)]
pub struct KasKeyClient {
    client: Client,
    settings: KasSettings,
}

impl KasKeyClient {
    /// Makes a client with the given settings. The request timeout is applied to every fetch.
    pub fn new(settings: KasSettings) -> Result<KasKeyClient> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| KeyError::CustodianUnreachable(e.to_string()))?;
        Ok(KasKeyClient { client, settings })
    }

    pub fn settings(&self) -> &KasSettings {
        &self.settings
    }

    /// Computes the full URL of the public key endpoint for the given custodian base URL.
    ///
    /// The base URL must be absolute and use `https`, or `http` when that has been explicitly
    /// allowed. Any query or fragment on the base URL is discarded.
    pub fn endpoint(&self, custodian_url: &str) -> Result<Url> {
        let invalid = || KeyError::InvalidCustodianUrl(String::from(custodian_url));

        let mut base = Url::parse(custodian_url.trim()).map_err(|_| invalid())?;
        let scheme_permitted = match base.scheme() {
            "https" => true,
            "http" => self.settings.allow_insecure_http,
            _ => false,
        };
        if !scheme_permitted || base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(invalid());
        }

        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut endpoint = base
            .join(self.settings.key_path.trim_start_matches('/'))
            .map_err(|_| invalid())?;
        endpoint
            .query_pairs_mut()
            .append_pair("algorithm", ALGORITHM_RSA);
        Ok(endpoint)
    }

    /// Fetches the custodian's current RSA public key as a PEM string.
    ///
    /// Network failures and any status other than 200 are [KeyError::CustodianUnreachable]. A 200
    /// response without a non-empty string in the configured field is
    /// [KeyError::InvalidCustodianResponse].
    pub async fn fetch_public_key(&self, custodian_url: &str) -> Result<String> {
        let endpoint = self.endpoint(custodian_url)?;
        debug!("Fetching custodian public key from {}", endpoint);

        let response = self
            .client
            .get(endpoint)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KeyError::CustodianUnreachable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(KeyError::CustodianUnreachable(format!(
                "the custodian answered with HTTP status {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| KeyError::InvalidCustodianResponse(e.to_string()))?;
        public_key_from_body(&body, &self.settings.public_key_field)
    }
}

/// Extracts the PEM public key from a response body.
fn public_key_from_body(body: &Value, field: &str) -> Result<String> {
    match body.get(field).and_then(Value::as_str) {
        Some(pem) if !pem.trim().is_empty() => Ok(String::from(pem)),
        Some(_) => Err(KeyError::InvalidCustodianResponse(format!(
            "the `{}` field is empty",
            field
        ))),
        None => Err(KeyError::InvalidCustodianResponse(format!(
            "the response has no `{}` string field",
            field
        ))),
    }
}

#[async_trait]
impl WrappingKeySource for KasKeyClient {
    async fn get_public(&self, custodian_url: &str) -> Result<String> {
        self.fetch_public_key(custodian_url).await
    }
}

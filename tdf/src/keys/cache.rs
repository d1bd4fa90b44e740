// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! A caching decorator for any [WrappingKeySource].
//!
//! Cached keys expire after a fixed time-to-live, and can be invalidated explicitly. The
//! orchestrator invalidates the entry for a custodian whenever wrapping against the cached key
//! fails for a key-related reason, so that a rotated custodian key is fetched again.

use super::{Result, WrappingKeySource};

use async_trait::async_trait;
use log::{debug, warn};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct CachedKey {
    pem: String,
    fetched_at: Instant,
}

/// Caches public keys from an inner source, keyed by custodian URL.
pub struct CachedKeySource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedKey>>,
}

impl<S: WrappingKeySource> CachedKeySource<S> {
    /// Wraps the given source. A zero `ttl` disables caching, so every call reaches the source.
    pub fn new(inner: S, ttl: Duration) -> CachedKeySource<S> {
        CachedKeySource {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drops any cached key for the given custodian.
    pub fn invalidate(&self, custodian_url: &str) {
        if self.entries().remove(custodian_url).is_some() {
            warn!("Discarded cached public key for {}", custodian_url);
        }
    }

    /// Drops every cached key.
    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedKey>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lookup(&self, custodian_url: &str) -> Option<String> {
        let mut entries = self.entries();
        let expired = match entries.get(custodian_url) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => return Some(entry.pem.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(custodian_url);
        }
        None
    }

    fn store(&self, custodian_url: &str, pem: &str) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries().insert(
            String::from(custodian_url),
            CachedKey {
                pem: String::from(pem),
                fetched_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<S: WrappingKeySource> WrappingKeySource for CachedKeySource<S> {
    async fn get_public(&self, custodian_url: &str) -> Result<String> {
        if let Some(pem) = self.lookup(custodian_url) {
            debug!("Using cached public key for {}", custodian_url);
            return Ok(pem);
        }
        let pem = self.inner.get_public(custodian_url).await?;
        self.store(custodian_url, &pem);
        Ok(pem)
    }
}

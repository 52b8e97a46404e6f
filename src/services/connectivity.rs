// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reachability probes for the remote store.
//!
//! A link being up is not enough: captive portals and dead Wi-Fi must
//! report unreachable, so the HTTP probe only accepts a `204 No Content`
//! from a validation endpoint and never follows redirects.

use crate::config::Config;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Point-in-time reachability of the remote store. Results are not cached.
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probes a generate-204 endpoint over HTTP.
#[derive(Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SyncError::RemoteUnavailable(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.probe_url, config.probe_timeout)
    }
}

#[async_trait]
impl ConnectivityOracle for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::NO_CONTENT => true,
            Ok(response) => {
                tracing::debug!(
                    status = response.status().as_u16(),
                    "Connectivity probe got unexpected status (captive portal?)"
                );
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}

/// Reachability flag driven by the host.
///
/// Mobile hosts already receive validated-network callbacks from the
/// platform; they forward them here instead of probing.
#[derive(Debug, Default)]
pub struct ManualOracle {
    reachable: AtomicBool,
}

impl ManualOracle {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityOracle for ManualOracle {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

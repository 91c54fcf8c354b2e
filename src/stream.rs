//! CrowdSec LAPI decision stream.
//!
//! Polls the bouncer stream endpoint on a fixed interval and forwards each
//! non-empty delivery as a [`StreamBatch`].

use crate::config::CrowdSecConfig;
use crate::decision::{canonical_value, StreamBatch};
use crate::error::RemoteError;
use crate::signal::ShutdownToken;
use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A decision as returned by the LAPI.
#[derive(Debug, Clone, Deserialize)]
pub struct LapiDecision {
    #[serde(default)]
    pub scope: Option<String>,
    pub value: String,
}

/// Stream endpoint response. Either list may be `null`.
#[derive(Debug, Default, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    new: Option<Vec<LapiDecision>>,
    #[serde(default)]
    deleted: Option<Vec<LapiDecision>>,
}

/// Polling client for the LAPI decision stream.
pub struct DecisionStream {
    client: Client,
    url: String,
    api_key: String,
    scopes: String,
    interval: Duration,
    startup: bool,
}

impl DecisionStream {
    /// Create a new stream client.
    pub fn new(config: &CrowdSecConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!(
                "crowdsec-cloudflare-bouncer/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/v1/decisions/stream", config.lapi_url.trim_end_matches('/')),
            api_key: config.lapi_key.clone(),
            scopes: config.scopes.join(","),
            interval: Duration::from_secs(config.update_frequency_seconds),
            startup: true,
        })
    }

    /// Fetch one delivery.
    ///
    /// The first successful call requests the full set of active decisions;
    /// later calls only return changes since the previous call.
    pub async fn poll(&mut self) -> Result<StreamBatch, RemoteError> {
        let startup = if self.startup { "true" } else { "false" };
        debug!(url = %self.url, startup, "Polling decision stream");

        let response = self
            .client
            .get(&self.url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("startup", startup), ("scopes", self.scopes.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), body));
        }

        let stream: StreamResponse = response.json().await.map_err(|e| {
            RemoteError::InvalidResponse(format!("Failed to parse stream response: {}", e))
        })?;

        self.startup = false;
        Ok(to_batch(stream))
    }

    /// Poll until shutdown, forwarding batches to `batches`.
    pub async fn run(mut self, batches: mpsc::Sender<StreamBatch>, mut shutdown: ShutdownToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(url = %self.url, interval = ?self.interval, "Decision stream started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Decision stream stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let batch = match self.poll().await {
                        Ok(batch) => batch,
                        Err(e) => {
                            warn!(error = %e, "Failed to poll decision stream");
                            continue;
                        }
                    };

                    if batch.is_empty() || shutdown.is_cancelled() {
                        continue;
                    }

                    info!(
                        new = batch.new.len(),
                        deleted = batch.deleted.len(),
                        "Received decisions"
                    );
                    if batches.send(batch).await.is_err() {
                        debug!("Collector gone, stopping decision stream");
                        break;
                    }
                }
            }
        }
    }
}

/// Canonicalise values, dropping those that are not IPs or networks.
fn to_batch(response: StreamResponse) -> StreamBatch {
    StreamBatch {
        new: canonical_values(response.new.unwrap_or_default()),
        deleted: canonical_values(response.deleted.unwrap_or_default()),
    }
}

fn canonical_values(decisions: Vec<LapiDecision>) -> Vec<String> {
    decisions
        .into_iter()
        .filter_map(|decision| match canonical_value(&decision.value) {
            Some(value) => Some(value),
            None => {
                warn!(
                    value = %decision.value,
                    scope = ?decision.scope,
                    "Skipping decision with invalid IP value"
                );
                None
            }
        })
        .collect()
}

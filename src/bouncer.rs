//! Bouncer wiring: list setup, decision stream, collector and flush scheduler.

use crate::collector;
use crate::config::Config;
use crate::gateway::cloudflare::CloudflareClient;
use crate::retry::RetryPolicy;
use crate::scheduler::FlushScheduler;
use crate::signal::Shutdown;
use crate::state::ReconciliationState;
use crate::stream::DecisionStream;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Stream batches buffered between the stream poller and the collector.
const STREAM_BUFFER: usize = 64;

/// CrowdSec to Cloudflare bouncer.
pub struct Bouncer {
    config: Arc<Config>,
    cloudflare: Arc<CloudflareClient>,
    stream: DecisionStream,
    state: Arc<ReconciliationState>,
}

impl Bouncer {
    /// Create a new bouncer. No network calls are made until [`run`](Self::run).
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let cloudflare = Arc::new(CloudflareClient::new(&config.cloudflare)?);
        let stream = DecisionStream::new(&config.crowdsec)?;
        let state = Arc::new(ReconciliationState::new(
            config.cloudflare.item_comment.clone(),
        ));

        info!(
            list = %config.cloudflare.ip_list_name,
            zone = ?config.cloudflare.zone_id,
            "Bouncer initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            cloudflare,
            stream,
            state,
        })
    }

    /// Shared reconciliation state.
    pub fn state(&self) -> Arc<ReconciliationState> {
        self.state.clone()
    }

    /// Prepare the remote list, then sync decisions until shutdown or a fatal
    /// flush error.
    pub async fn run(self, shutdown: &Shutdown) -> anyhow::Result<()> {
        let cloudflare_config = &self.config.cloudflare;
        let list_id = self
            .cloudflare
            .prepare_list(
                &cloudflare_config.ip_list_name,
                &cloudflare_config.ip_list_description,
                cloudflare_config.rule_action,
            )
            .await
            .context("Failed to set up Cloudflare IP list")?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let stream_task = tokio::spawn(self.stream.run(tx, shutdown.token()));
        let collector_task = tokio::spawn(collector::run(
            rx,
            self.state.clone(),
            shutdown.token(),
        ));

        let scheduler = FlushScheduler::new(
            self.state.clone(),
            self.cloudflare.clone(),
            list_id,
            Duration::from_secs(cloudflare_config.update_frequency_seconds),
            RetryPolicy::from(&self.config.retry),
        );
        let result = scheduler.run(shutdown.token()).await;

        // A fatal flush error must stop the other loops too.
        shutdown.trigger();
        for (name, task) in [("stream", stream_task), ("collector", collector_task)] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "Task ended abnormally");
            }
        }

        result.context("Flush loop stopped")?;
        info!("Bouncer stopped");
        Ok(())
    }
}

//! Flush scheduler: periodically drains the reconciliation state into batched
//! remote list calls.

use crate::error::{FlushError, RemoteError};
use crate::gateway::ListGateway;
use crate::retry::{Backoff, RetryDecision, RetryPolicy};
use crate::signal::ShutdownToken;
use crate::state::{FlushBatch, ReconciliationState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of one flush attempt that did not stop the loop.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Idle,
    /// All calls succeeded.
    Synced { added: usize, deleted: usize },
    /// Skipped because a previous failure is still backing off.
    Deferred { failures: u32 },
    /// A retryable call failed; its batch is pending again.
    Requeued {
        error: RemoteError,
        retry_in: Duration,
    },
}

/// Drains pending decisions on a fixed interval and applies them to a remote list.
pub struct FlushScheduler {
    state: Arc<ReconciliationState>,
    gateway: Arc<dyn ListGateway>,
    list_id: String,
    interval: Duration,
    backoff: Backoff,
}

impl FlushScheduler {
    pub fn new(
        state: Arc<ReconciliationState>,
        gateway: Arc<dyn ListGateway>,
        list_id: impl Into<String>,
        interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            state,
            gateway,
            list_id: list_id.into(),
            interval,
            backoff: Backoff::new(policy),
        }
    }

    /// Run one flush cycle: orphan lookup, then deletions, then additions.
    pub async fn flush_once(&mut self) -> Result<FlushOutcome, FlushError> {
        if !self.backoff.ready(Instant::now()) {
            return Ok(FlushOutcome::Deferred {
                failures: self.backoff.failures(),
            });
        }

        let orphans = self.state.orphan_count();
        if orphans > 0 {
            debug!(orphans, "Looking up deleted items with unknown remote IDs");
            match self.gateway.list_items(&self.list_id).await {
                Ok(items) => {
                    let found = self.state.resolve_orphans(&items);
                    debug!(orphans, found, "Orphan lookup complete");
                }
                Err(error) => return self.handle_failure(error),
            }
        }

        let FlushBatch { adds, deletes } = self.state.drain_for_flush();
        if adds.is_empty() && deletes.is_empty() {
            self.backoff.reset();
            return Ok(FlushOutcome::Idle);
        }

        let deleted = deletes.len();
        if !deletes.is_empty() {
            info!(
                gateway = self.gateway.name(),
                count = deleted,
                "Deleting items from remote list"
            );
            if let Err(error) = self.gateway.delete_items(&self.list_id, &deletes).await {
                self.state.requeue_deletes(deletes);
                self.state.requeue_adds(adds);
                return self.handle_failure(error);
            }
        }

        let added = adds.len();
        if !adds.is_empty() {
            info!(
                gateway = self.gateway.name(),
                count = added,
                "Adding items to remote list"
            );
            match self.gateway.create_items(&self.list_id, &adds).await {
                Ok(items) => {
                    let summary = self.state.confirm_adds(&items);
                    debug!(
                        indexed = summary.indexed,
                        requeued_for_delete = summary.requeued_for_delete,
                        missing = summary.missing,
                        orphans_found = summary.orphans_found,
                        "Recorded remote IDs"
                    );
                }
                Err(error) => {
                    // The create may have landed before the error surfaced.
                    self.state.requeue_attempted_adds(adds);
                    return self.handle_failure(error);
                }
            }
        }

        self.backoff.reset();
        Ok(FlushOutcome::Synced { added, deleted })
    }

    fn handle_failure(&mut self, error: RemoteError) -> Result<FlushOutcome, FlushError> {
        if !error.is_retryable() {
            return Err(FlushError::Fatal(error));
        }

        match self.backoff.record_failure(Instant::now()) {
            RetryDecision::RetryIn(retry_in) => {
                warn!(
                    error = %error,
                    failures = self.backoff.failures(),
                    retry_in = ?retry_in,
                    "Flush failed, batch re-queued"
                );
                Ok(FlushOutcome::Requeued { error, retry_in })
            }
            RetryDecision::GiveUp { age } => Err(FlushError::RetryExhausted { age, source: error }),
        }
    }

    /// Flush on every tick until shutdown or a fatal error.
    pub async fn run(mut self, mut shutdown: ShutdownToken) -> Result<(), FlushError> {
        let start = Instant::now() + self.interval;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            list_id = %self.list_id,
            interval = ?self.interval,
            "Flush scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let (pending_adds, pending_deletes) = self.state.pending_counts();
                    info!(pending_adds, pending_deletes, "Flush scheduler stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.flush_once().await? {
                        FlushOutcome::Synced { added, deleted } => {
                            info!(added, deleted, indexed = self.state.indexed_count(), "Flush complete");
                        }
                        FlushOutcome::Deferred { failures } => {
                            debug!(failures, "Flush deferred by backoff");
                        }
                        FlushOutcome::Idle | FlushOutcome::Requeued { .. } => {}
                    }
                }
            }
        }
    }
}

//! Batch collector: folds decision-stream batches into the reconciliation state.

use crate::decision::{DecisionKind, StreamBatch};
use crate::signal::ShutdownToken;
use crate::state::{Ledger, ReconciliationState, Resolution};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Counts from folding one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// New items queued for creation.
    pub queued_adds: usize,
    /// Remote IDs queued for deletion.
    pub queued_deletes: usize,
    /// Not yet applied adds withdrawn by a later deletion.
    pub cancelled: usize,
    /// Decisions with nothing to do (duplicates, unknown IPs, already listed).
    pub ignored: usize,
}

/// Apply a batch to the ledger, deletions before additions.
pub(crate) fn fold(ledger: &mut Ledger, batch: &StreamBatch, comment: &str) -> FoldStats {
    let mut stats = FoldStats::default();

    for decision in batch.decisions() {
        let resolution = match decision.kind {
            DecisionKind::Deleted => ledger.record_deleted(&decision.value),
            DecisionKind::New => ledger.record_new(&decision.value, comment),
        };

        match (decision.kind, resolution) {
            (DecisionKind::New, Resolution::Queued) => stats.queued_adds += 1,
            (DecisionKind::Deleted, Resolution::Queued) => stats.queued_deletes += 1,
            (_, Resolution::Cancelled) => stats.cancelled += 1,
            (_, Resolution::Skipped) => {
                if decision.kind == DecisionKind::Deleted {
                    debug!(ip = %decision.value, "No remote item for deleted decision");
                }
                stats.ignored += 1;
            }
        }
    }

    stats
}

/// Consume batches until the stream closes or shutdown is requested.
pub async fn run(
    mut batches: mpsc::Receiver<StreamBatch>,
    state: Arc<ReconciliationState>,
    mut shutdown: ShutdownToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Collector stopping");
                break;
            }
            batch = batches.recv() => {
                let Some(batch) = batch else {
                    info!("Decision stream closed");
                    break;
                };

                let stats = state.record_decisions(&batch);
                debug!(
                    decisions = batch.len(),
                    queued_adds = stats.queued_adds,
                    queued_deletes = stats.queued_deletes,
                    cancelled = stats.cancelled,
                    ignored = stats.ignored,
                    "Processed decisions from stream"
                );
            }
        }
    }
}

//! Reconciliation state shared between the decision collector and the flush scheduler.
//!
//! Holds decisions accumulated since the last flush together with the index of
//! IPs already present on the remote list. All access goes through a single
//! mutex that is never held across an `.await`, so a flush in flight never
//! blocks the collector.
//!
//! A create call may take effect remotely even when it reports an error, and
//! the remote side may not echo every created item back. IPs in that state are
//! kept as *unconfirmed*. Deleting an unconfirmed IP turns it into an
//! *orphan*: its remote ID is unknown, so the scheduler looks the list up and
//! queues the delete once the item is found.

use crate::collector::{self, FoldStats};
use crate::decision::{
    canonical_value, ItemCreateRequest, ItemDeleteRequest, ListItem, StreamBatch,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// List lookups an orphan survives without being found remotely. A create
/// that timed out may still land after the first lookup.
const ORPHAN_LOOKUPS: u32 = 3;

/// Result of applying a single decision to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// A new request was queued for the next flush.
    Queued,
    /// An earlier, not yet applied, add was withdrawn.
    Cancelled,
    /// Nothing to do.
    Skipped,
}

/// Mutable bookkeeping behind the state lock.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pending_adds: HashSet<ItemCreateRequest>,
    pending_deletes: HashSet<ItemDeleteRequest>,
    /// IP -> remote ID for items known to exist on the remote list.
    index: HashMap<String, String>,
    /// IPs of the add batch currently being created remotely.
    in_flight: HashSet<String>,
    /// In-flight IPs that were deleted before their create call returned.
    cancelled: HashSet<String>,
    /// IPs that may exist remotely without a known remote ID.
    unconfirmed: HashSet<String>,
    /// Deleted IPs that may still exist remotely, with remaining lookups.
    orphaned: HashMap<String, u32>,
}

impl Ledger {
    pub(crate) fn record_deleted(&mut self, ip: &str) -> Resolution {
        let mut resolution = Resolution::Skipped;

        if let Some(id) = self.index.remove(ip) {
            self.pending_deletes.insert(ItemDeleteRequest { id });
            resolution = Resolution::Queued;
        }

        let before = self.pending_adds.len();
        self.pending_adds.retain(|add| add.ip != ip);
        if self.pending_adds.len() != before && resolution == Resolution::Skipped {
            resolution = Resolution::Cancelled;
        }

        if self.in_flight.contains(ip) {
            self.cancelled.insert(ip.to_string());
            if resolution == Resolution::Skipped {
                resolution = Resolution::Cancelled;
            }
        } else if self.unconfirmed.remove(ip) {
            self.orphan(ip.to_string());
            if resolution == Resolution::Skipped {
                resolution = Resolution::Cancelled;
            }
        }

        resolution
    }

    pub(crate) fn record_new(&mut self, ip: &str, comment: &str) -> Resolution {
        if self.in_flight.contains(ip) {
            // The in-flight create will land; only undo a deletion seen meanwhile.
            self.cancelled.remove(ip);
            return Resolution::Skipped;
        }

        if self.index.contains_key(ip) {
            return Resolution::Skipped;
        }

        if self.orphaned.remove(ip).is_some() {
            // Still listed remotely until the lookup finds it; re-adding
            // makes the create response report its ID.
            self.unconfirmed.insert(ip.to_string());
        }

        let inserted = self.pending_adds.insert(ItemCreateRequest {
            ip: ip.to_string(),
            comment: comment.to_string(),
        });

        if inserted {
            Resolution::Queued
        } else {
            Resolution::Skipped
        }
    }

    fn orphan(&mut self, ip: String) {
        self.unconfirmed.remove(&ip);
        self.orphaned.insert(ip, ORPHAN_LOOKUPS);
    }

    /// Put adds from a failed flush back into the pending set. `attempted`
    /// is set when the create call was sent and may have taken effect.
    fn requeue(&mut self, adds: Vec<ItemCreateRequest>, attempted: bool) -> usize {
        let mut requeued = 0;

        for add in adds {
            let maybe_remote = attempted || self.unconfirmed.contains(&add.ip);

            if self.cancelled.contains(&add.ip) {
                if maybe_remote {
                    self.orphan(add.ip);
                }
                continue;
            }
            if self.index.contains_key(&add.ip) {
                continue;
            }

            if maybe_remote {
                self.unconfirmed.insert(add.ip.clone());
            }
            if self.pending_adds.insert(add) {
                requeued += 1;
            }
        }

        self.in_flight.clear();
        self.cancelled.clear();
        requeued
    }
}

/// Canonical form of an IP as reported by the remote side.
fn remote_ip(item: &ListItem) -> String {
    canonical_value(&item.ip).unwrap_or_else(|| item.ip.clone())
}

/// Requests drained from the state for one flush cycle. Both lists are
/// deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushBatch {
    pub adds: Vec<ItemCreateRequest>,
    pub deletes: Vec<ItemDeleteRequest>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of recording the items returned by a create call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmSummary {
    /// Items inserted into the index.
    pub indexed: usize,
    /// Items deleted while in flight, now queued for removal.
    pub requeued_for_delete: usize,
    /// In-flight IPs the remote side did not return.
    pub missing: usize,
    /// Orphans found in the response, now queued for removal.
    pub orphans_found: usize,
}

/// Thread-safe reconciliation state.
pub struct ReconciliationState {
    ledger: Mutex<Ledger>,
    comment: String,
}

impl ReconciliationState {
    /// Create empty state. `comment` annotates every item created remotely.
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            comment: comment.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic while holding the lock cannot leave the sets half-updated in
        // a way later decisions would misread, so keep going.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold a stream batch into the pending sets.
    pub fn record_decisions(&self, batch: &StreamBatch) -> FoldStats {
        let mut ledger = self.lock();
        collector::fold(&mut ledger, batch, &self.comment)
    }

    /// Take everything pending and reset the pending sets.
    ///
    /// The drained adds become the in-flight batch until [`confirm_adds`] or
    /// [`requeue_adds`] is called.
    ///
    /// [`confirm_adds`]: Self::confirm_adds
    /// [`requeue_adds`]: Self::requeue_adds
    pub fn drain_for_flush(&self) -> FlushBatch {
        let mut ledger = self.lock();

        let mut adds: Vec<ItemCreateRequest> =
            std::mem::take(&mut ledger.pending_adds).into_iter().collect();
        let mut deletes: Vec<ItemDeleteRequest> =
            std::mem::take(&mut ledger.pending_deletes).into_iter().collect();
        adds.sort();
        deletes.sort();

        ledger.in_flight = adds.iter().map(|add| add.ip.clone()).collect();
        ledger.cancelled.clear();

        FlushBatch { adds, deletes }
    }

    /// Record remote IDs for the in-flight batch.
    ///
    /// Items not belonging to the in-flight batch are ignored unless they
    /// match an orphan, so a gateway may return the whole remote list.
    /// In-flight IPs the response leaves out stay unconfirmed.
    pub fn confirm_adds(&self, items: &[ListItem]) -> ConfirmSummary {
        let mut guard = self.lock();
        let ledger = &mut *guard;
        let mut summary = ConfirmSummary::default();
        let mut seen = HashSet::new();

        for item in items {
            let ip = remote_ip(item);

            if !ledger.in_flight.contains(&ip) {
                if ledger.orphaned.remove(&ip).is_some() {
                    ledger.pending_deletes.insert(ItemDeleteRequest {
                        id: item.id.clone(),
                    });
                    summary.orphans_found += 1;
                }
                continue;
            }
            if !seen.insert(ip.clone()) {
                continue;
            }

            ledger.unconfirmed.remove(&ip);
            if ledger.cancelled.contains(&ip) {
                ledger.pending_deletes.insert(ItemDeleteRequest {
                    id: item.id.clone(),
                });
                summary.requeued_for_delete += 1;
            } else {
                ledger.index.insert(ip, item.id.clone());
                summary.indexed += 1;
            }
        }

        let missing: Vec<String> = ledger
            .in_flight
            .iter()
            .filter(|ip| !seen.contains(*ip))
            .cloned()
            .collect();
        summary.missing = missing.len();
        if summary.missing > 0 {
            warn!(
                missing = summary.missing,
                "Remote list did not return IDs for some created items"
            );
        }
        for ip in missing {
            if ledger.cancelled.contains(&ip) {
                ledger.orphan(ip);
            } else {
                ledger.unconfirmed.insert(ip);
            }
        }

        ledger.in_flight.clear();
        ledger.cancelled.clear();
        summary
    }

    /// Put an add batch that was never sent back into the pending set. Adds
    /// deleted meanwhile are dropped. Returns the number re-queued.
    pub fn requeue_adds(&self, adds: Vec<ItemCreateRequest>) -> usize {
        self.lock().requeue(adds, false)
    }

    /// Put back an add batch whose create call failed after being sent. The
    /// IPs stay unconfirmed until a later response reports their IDs, and
    /// those deleted meanwhile become orphans.
    pub fn requeue_attempted_adds(&self, adds: Vec<ItemCreateRequest>) -> usize {
        self.lock().requeue(adds, true)
    }

    /// Number of deleted IPs whose remote item still has to be looked up.
    pub fn orphan_count(&self) -> usize {
        self.lock().orphaned.len()
    }

    /// Queue deletes for orphans found in a full listing of the remote list.
    ///
    /// Orphans not found use up one lookup and are dropped once none remain.
    /// Returns the number of deletes queued.
    pub fn resolve_orphans(&self, items: &[ListItem]) -> usize {
        let mut guard = self.lock();
        let ledger = &mut *guard;
        let mut found = 0;

        for item in items {
            if ledger.orphaned.remove(&remote_ip(item)).is_some() {
                ledger.pending_deletes.insert(ItemDeleteRequest {
                    id: item.id.clone(),
                });
                found += 1;
            }
        }

        ledger.orphaned.retain(|ip, lookups| {
            *lookups = lookups.saturating_sub(1);
            if *lookups == 0 {
                debug!(ip = %ip, "Orphaned item not found on remote list, giving up");
            }
            *lookups > 0
        });

        found
    }

    /// Put a failed delete batch back into the pending set.
    pub fn requeue_deletes(&self, deletes: Vec<ItemDeleteRequest>) -> usize {
        let mut ledger = self.lock();
        let before = ledger.pending_deletes.len();
        ledger.pending_deletes.extend(deletes);
        ledger.pending_deletes.len() - before
    }

    /// Number of pending (adds, deletes).
    pub fn pending_counts(&self) -> (usize, usize) {
        let ledger = self.lock();
        (ledger.pending_adds.len(), ledger.pending_deletes.len())
    }

    /// Number of IPs known to be on the remote list.
    pub fn indexed_count(&self) -> usize {
        self.lock().index.len()
    }

    /// Remote ID of an indexed IP.
    pub fn remote_id(&self, ip: &str) -> Option<String> {
        self.lock().index.get(ip).cloned()
    }
}

// src/tracker.rs

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::db::history::HistoryStore;
use crate::domain::diff::OrderDiff;
use crate::domain::history::{build_change_log, LogEntry};
use crate::domain::order::{CombinedOrder, Snapshot};
use crate::domain::reconcile::reconcile;
use crate::domain::rules::DiffRules;
use crate::domain::timeline::{derive_timeline, Timeline};

/// What one sync round did.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    /// Changes per reference number against the last stored snapshot.
    pub diffs: BTreeMap<String, OrderDiff>,
    /// Orders seen for the first time (baseline snapshot recorded).
    pub baselines: Vec<String>,
    /// Orders whose new snapshot was stored.
    pub appended: Vec<String>,
    /// Orders whose snapshot could not be stored.
    pub failed_writes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderTimeline {
    pub reference_number: String,
    pub timeline: Timeline,
}

pub struct OrderTracker<S> {
    store: S,
    rules: Arc<DiffRules>,
    // Serializes read-compare-append so two syncs can't both append the
    // same change or interleave their snapshots.
    sync_lock: Mutex<()>,
}

impl<S: HistoryStore> OrderTracker<S> {
    pub fn new(store: S, rules: Arc<DiffRules>) -> Self {
        Self {
            store,
            rules,
            sync_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compare freshly fetched orders with their stored history and append a
    /// snapshot for every order that is new or changed.
    ///
    /// Storage failures are logged and listed in the report; they never abort
    /// the round.
    pub fn sync(&self, fresh: &[CombinedOrder], now_ms: i64) -> SyncReport {
        let _guard = self.sync_lock.lock().unwrap_or_else(|e| e.into_inner());

        let unique = latest_per_reference(fresh);
        let fresh = unique.as_slice();
        let mut report = SyncReport::default();
        let mut previous = Vec::with_capacity(fresh.len());

        for order in fresh {
            let rn = order.reference_number();
            match self.store.latest_snapshot(rn) {
                Some(last) => previous.push(last.data),
                None => {
                    report.baselines.push(rn.to_string());
                    self.append(order, now_ms, &mut report);
                }
            }
        }

        report.diffs = reconcile(&previous, fresh, &self.rules.ignore);

        for order in fresh {
            let rn = order.reference_number();
            if report.diffs.contains_key(rn) && !report.appended.iter().any(|a| a == rn) {
                self.append(order, now_ms, &mut report);
            }
        }

        info!(
            orders = fresh.len(),
            baselines = report.baselines.len(),
            changed = report.diffs.len(),
            failed = report.failed_writes.len(),
            "sync complete"
        );
        report
    }

    fn append(&self, order: &CombinedOrder, now_ms: i64, report: &mut SyncReport) {
        let rn = order.reference_number().to_string();
        let snapshot = Snapshot::new(now_ms, order.clone());

        match self.store.append_snapshot(&rn, &snapshot) {
            Ok(()) => report.appended.push(rn),
            Err(e) => {
                error!(reference_number = %rn, error = %e, "failed to store snapshot");
                report.failed_writes.push(rn);
            }
        }
    }

    pub fn change_log(&self, reference_number: &str) -> Vec<LogEntry> {
        let history = self.store.load_history(reference_number);
        build_change_log(&history, &self.rules)
    }

    /// Timeline of the most recent stored snapshot.
    pub fn timeline(&self, reference_number: &str) -> Option<Timeline> {
        self.store
            .latest_snapshot(reference_number)
            .map(|s| derive_timeline(&s.data))
    }

    pub fn timelines(&self, orders: &[CombinedOrder]) -> Vec<OrderTimeline> {
        orders
            .iter()
            .map(|o| OrderTimeline {
                reference_number: o.reference_number().to_string(),
                timeline: derive_timeline(o),
            })
            .collect()
    }
}

/// One order per reference number, the last occurrence winning, in order of
/// first appearance.
fn latest_per_reference(orders: &[CombinedOrder]) -> Vec<CombinedOrder> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<CombinedOrder> = Vec::with_capacity(orders.len());

    for order in orders {
        match slot.get(order.reference_number()) {
            Some(&i) => unique[i] = order.clone(),
            None => {
                slot.insert(order.reference_number(), unique.len());
                unique.push(order.clone());
            }
        }
    }
    unique
}

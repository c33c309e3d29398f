// src/domain/reconcile.rs

use std::collections::{BTreeMap, HashMap};

use crate::domain::diff::{diff_values, IgnoreRules, OrderDiff};
use crate::domain::order::CombinedOrder;

/// Compare two order collections matched by reference number.
///
/// Only orders present in both collections are compared. Orders that
/// disappeared and orders seen for the first time produce nothing here;
/// first sightings are handled by baseline snapshots instead. Orders without
/// changes are left out of the result.
pub fn reconcile(
    old_orders: &[CombinedOrder],
    new_orders: &[CombinedOrder],
    rules: &IgnoreRules,
) -> BTreeMap<String, OrderDiff> {
    // Later duplicates overwrite earlier ones.
    let new_by_ref: HashMap<&str, &CombinedOrder> = new_orders
        .iter()
        .map(|o| (o.reference_number(), o))
        .collect();

    let mut all_diffs = BTreeMap::new();
    for old in old_orders {
        let rn = old.reference_number();
        let Some(new) = new_by_ref.get(rn) else {
            continue;
        };

        let order_diff = diff_values(&old.to_value(), &new.to_value(), rules);
        if !order_diff.is_empty() {
            all_diffs.insert(rn.to_string(), order_diff);
        }
    }
    all_diffs
}

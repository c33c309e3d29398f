// src/domain/order.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// order
//  ├── referenceNumber
//  ├── orderStatus
//  ├── vin
//  └── ... (vendor fields, kept verbatim)
// details
//  └── tasks
//       ├── registration.orderDetails.orderBookedDate
//       ├── finalPayment.data.etaToDeliveryCenter
//       └── scheduling.apptDateTimeAddressStr

/// The order list entry as returned by the vendor.
///
/// Only the reference number is required. Every other field is carried
/// through untouched so the differ sees exactly what the vendor sent,
/// including explicit `null`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(rename = "referenceNumber")]
    pub reference_number: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OrderSummary {
    #[cfg(test)]
    pub fn new(reference_number: impl Into<String>) -> Self {
        Self {
            reference_number: reference_number.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style setter, mostly useful when assembling fixtures.
    #[cfg(test)]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Vehicle order status, or "" when missing or not a string.
    pub fn order_status(&self) -> &str {
        self.fields
            .get("orderStatus")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn vin(&self) -> Option<&Value> {
        self.fields.get("vin")
    }
}

/// An order summary merged with its task/status details document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedOrder {
    pub order: OrderSummary,
    #[serde(default)]
    pub details: Value,
}

impl CombinedOrder {
    pub fn new(order: OrderSummary, details: Value) -> Self {
        Self { order, details }
    }

    pub fn reference_number(&self) -> &str {
        &self.order.reference_number
    }

    /// The full `{order, details}` tree as walked by the differ.
    pub fn to_value(&self) -> Value {
        let mut order = Map::with_capacity(self.order.fields.len() + 1);
        order.insert(
            "referenceNumber".to_string(),
            Value::String(self.order.reference_number.clone()),
        );
        for (k, v) in &self.order.fields {
            order.insert(k.clone(), v.clone());
        }

        let mut root = Map::with_capacity(2);
        root.insert("order".to_string(), Value::Object(order));
        root.insert("details".to_string(), self.details.clone());
        Value::Object(root)
    }

    /// Look up a nested details field by path segments.
    /// Missing intermediates simply yield `None`.
    pub fn details_at(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.details, |node, key| node.as_object()?.get(*key))
    }
}

/// One timestamped capture of a combined order. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub data: CombinedOrder,
}

impl Snapshot {
    pub fn new(timestamp: i64, data: CombinedOrder) -> Self {
        Self { timestamp, data }
    }
}

// src/domain/rules.rs

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::diff::IgnoreRules;
use crate::errors::ServerError;

/// Volatile vendor fields that change on nearly every fetch without meaning
/// anything to the customer. Entries ending in `.` cover a whole subtree.
pub const DEFAULT_IGNORED_PATHS: &[&str] = &[
    "details.tasks.registration.orderDetails.vin",
    "details.tasks.registration.regData.orderDetails.vin",
    "details.tasks.finalPayment.data.vin",
    "details.tasks.tradeIn.isMatched",
    "details.tasks.registration.isMatched",
    "details.tasks.registration.orderDetails.vehicleModelYear",
    "details.state",
    "details.strings",
    "details.scheduling.card",
    "details.scheduling.strings",
    "details.tasks.carbonCredit.card",
    "details.tasks.carbonCredit.strings.",
    "details.tasks.finalPayment.card.",
    "details.tasks.finalPayment.strings.",
    "details.tasks.scheduling.card.",
    "details.tasks.scheduling.strings.",
    "details.tasks.scheduling.isDeliveryEstimatesEnabled",
    "details.tasks.registration.orderDetails.isAvailableForMatch",
    "details.tasks.finalPayment.data.isAvailableForMatch",
    "details.tasks.finalPayment.data.deliveryReadinessDetail.",
    "details.tasks.finalPayment.data.deliveryReadiness.",
    "details.tasks.finalPayment.data.agreementDetails",
    "details.tasks.finalPayment.data.vehicleId",
    "details.tasks.deliveryAcceptance.gates",
    "details.tasks.deliveryAcceptance.card.",
    "details.tasks.deliveryAcceptance.strings.",
    "details.tasks.deliveryDetails.regData.reggieRegistrationStatus",
    "details.tasks.deliveryDetails.strings.",
    "details.tasks.deliveryDetails.card.",
    "details.tasks.registration.card.",
    "details.tasks.registration.regData.reggieRegistrationStatus",
    "details.tasks.registration.strings.",
    "details.tasks.finalPayment.complete",
    "details.tasks.finalPayment.data.finalPaymentStatus",
    "details.tasks.scheduling.apptDateTimeAddressStr",
    "details.tasks.scheduling.isInventoryOrMatched",
    "details.tasks.finalPayment.data.hasFinalInvoice",
    "details.tasks.finalPayment.data.hasActiveInvoice",
    "details.tasks.finalPayment.data.selfSchedulingDetails.deliveryLocationId",
    "details.tasks.finalPayment.data.selfSchedulingDetails.",
    "details.tasks.financing.card.",
    "details.tasks.financing.strings.",
    "details.tasks.tradeIn.card.",
    "details.tasks.tradeIn.strings.",
];

/// Human readable names for the fields customers care about most.
pub const DEFAULT_FIELD_LABELS: &[(&str, &str)] = &[
    ("order.orderStatus", "Order Status"),
    ("order.vin", "VIN"),
    ("order.modelCode", "Model"),
    ("order.mktOptions", "Configuration Options"),
    ("order.isB2b", "Business Order"),
    ("details.tasks.registration.orderDetails.orderBookedDate", "Order Booked Date"),
    ("details.tasks.registration.orderDetails.reservationDate", "Reservation Date"),
    ("details.tasks.registration.orderDetails.vehicleRoutingLocation", "Routing Location"),
    ("details.tasks.registration.orderDetails.vehicleOdometer", "Odometer"),
    ("details.tasks.registration.expectedRegDate", "Expected Registration Date"),
    ("details.tasks.finalPayment.data.etaToDeliveryCenter", "ETA to Delivery Center"),
    ("details.tasks.finalPayment.data.paymentDetails", "Payment Details"),
    ("details.tasks.finalPayment.data.amountDue", "Amount Due"),
    ("details.tasks.scheduling.deliveryWindowDisplay", "Delivery Window"),
    ("details.tasks.scheduling.deliveryAddressTitle", "Delivery Location"),
    ("details.tasks.scheduling.appointmentDate", "Delivery Appointment"),
    ("details.tasks.deliveryDetails.regData.regStatus", "Registration Status"),
    ("details.tasks.tradeIn.complete", "Trade-In Complete"),
    ("details.tasks.financing.complete", "Financing Complete"),
];

/// Path → label lookup with the raw path as fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLabels(HashMap<String, String>);

impl FieldLabels {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self(labels)
    }

    pub fn label_for<'a>(&'a self, path: &'a str) -> &'a str {
        self.0.get(path).map(String::as_str).unwrap_or(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Everything the differ and the change log need to be configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRules {
    pub ignore: IgnoreRules,
    pub labels: FieldLabels,
}

impl Default for DiffRules {
    fn default() -> Self {
        Self {
            ignore: IgnoreRules::new(DEFAULT_IGNORED_PATHS.iter().copied()),
            labels: FieldLabels::new(
                DEFAULT_FIELD_LABELS
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }
}

/// On-disk rule overrides. A missing section keeps the built-in table.
#[derive(Debug, Deserialize)]
struct RulesFile {
    ignore: Option<Vec<String>>,
    labels: Option<HashMap<String, String>>,
}

impl DiffRules {
    #[cfg(test)]
    pub fn new(ignore: IgnoreRules, labels: FieldLabels) -> Self {
        Self { ignore, labels }
    }

    pub fn from_json(text: &str) -> Result<Self, ServerError> {
        let file: RulesFile = serde_json::from_str(text)
            .map_err(|e| ServerError::Config(format!("invalid rules file: {e}")))?;

        let mut rules = Self::default();
        if let Some(ignore) = file.ignore {
            rules.ignore = IgnoreRules::new(ignore);
        }
        if let Some(labels) = file.labels {
            rules.labels = FieldLabels::new(labels);
        }
        Ok(rules)
    }

    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("failed to read rules file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}

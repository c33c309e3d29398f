// src/domain/timeline.rs

//! Delivery-stage timeline for a single order.
//!
//! Each stage is judged on its own predicate, so vendor data can mark a later
//! stage complete while an earlier one is not. The current stage is simply the
//! last complete one. We keep that behaviour rather than forcing a strict
//! progression, since the vendor data is the source of truth.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

use crate::domain::order::CombinedOrder;

const BOOKED_DATE: &[&str] = &["tasks", "registration", "orderDetails", "orderBookedDate"];
const ETA_TO_DELIVERY_CENTER: &[&str] = &["tasks", "finalPayment", "data", "etaToDeliveryCenter"];
const APPOINTMENT: &[&str] = &["tasks", "scheduling", "apptDateTimeAddressStr"];

/// Same shape as a JS `Date.toDateString()`, e.g. "Tue Mar 05 2024".
const DISPLAY_DATE_FORMAT: &str = "%a %b %d %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Placed,
    VinAssigned,
    InTransit,
    ReadyForDelivery,
    Delivered,
}

/// How a stage decides it is complete.
#[derive(Debug, Clone, Copy)]
pub enum Completion {
    /// Booked date present, or the order status mentions the given word.
    BookedOrStatus(&'static str),
    /// The order summary carries a VIN.
    VinPresent,
    /// The details field at this path is present.
    DetailPresent(&'static [&'static str]),
    /// The order status mentions the given word.
    StatusContains(&'static str),
}

/// Where a completed stage gets its display date from.
#[derive(Debug, Clone, Copy)]
pub enum DateSource {
    Nothing,
    Timestamp(&'static [&'static str]),
    AppointmentDate,
}

#[derive(Debug, Clone, Copy)]
pub struct StageDef {
    pub stage: Stage,
    pub label: &'static str,
    pub completion: Completion,
    pub date: DateSource,
}

pub const STAGES: [StageDef; 5] = [
    StageDef {
        stage: Stage::Placed,
        label: "Order Placed",
        completion: Completion::BookedOrStatus("book"),
        date: DateSource::Timestamp(BOOKED_DATE),
    },
    StageDef {
        stage: Stage::VinAssigned,
        label: "VIN Assigned",
        completion: Completion::VinPresent,
        date: DateSource::Nothing,
    },
    StageDef {
        stage: Stage::InTransit,
        label: "In Transit",
        completion: Completion::DetailPresent(ETA_TO_DELIVERY_CENTER),
        date: DateSource::Timestamp(ETA_TO_DELIVERY_CENTER),
    },
    StageDef {
        stage: Stage::ReadyForDelivery,
        label: "Ready for Delivery",
        completion: Completion::DetailPresent(APPOINTMENT),
        date: DateSource::AppointmentDate,
    },
    StageDef {
        stage: Stage::Delivered,
        label: "Delivered",
        completion: Completion::StatusContains("delivered"),
        date: DateSource::AppointmentDate,
    },
];

impl StageDef {
    pub fn is_complete(&self, order: &CombinedOrder) -> bool {
        match self.completion {
            Completion::BookedOrStatus(word) => {
                is_present(order.details_at(BOOKED_DATE)) || status_contains(order, word)
            }
            Completion::VinPresent => is_present(order.order.vin()),
            Completion::DetailPresent(path) => is_present(order.details_at(path)),
            Completion::StatusContains(word) => status_contains(order, word),
        }
    }

    pub fn display_date(&self, order: &CombinedOrder) -> Option<String> {
        match self.date {
            DateSource::Nothing => None,
            DateSource::Timestamp(path) => order
                .details_at(path)
                .and_then(parse_timestamp)
                .map(|dt| dt.format(DISPLAY_DATE_FORMAT).to_string()),
            DateSource::AppointmentDate => order
                .details_at(APPOINTMENT)
                .and_then(Value::as_str)
                .and_then(find_month_day_year)
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStatus {
    pub id: Stage,
    pub label: &'static str,
    pub complete: bool,
    pub current: bool,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub stages: Vec<StageStatus>,
    /// Serialized as `-1` when no stage is complete.
    #[serde(serialize_with = "index_or_minus_one")]
    pub current_stage_index: Option<usize>,
}

#[cfg(test)]
impl Timeline {
    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage_index.map(|i| self.stages[i].id)
    }
}

fn index_or_minus_one<S: Serializer>(index: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => s.serialize_i64(*i as i64),
        None => s.serialize_i64(-1),
    }
}

pub fn derive_timeline(order: &CombinedOrder) -> Timeline {
    let complete: Vec<bool> = STAGES.iter().map(|def| def.is_complete(order)).collect();

    // Scan from the last stage back; the first hit is current.
    let current_stage_index = complete.iter().rposition(|done| *done);

    let stages = STAGES
        .iter()
        .zip(&complete)
        .enumerate()
        .map(|(i, (def, &done))| StageStatus {
            id: def.stage,
            label: def.label,
            complete: done,
            current: current_stage_index == Some(i),
            date: if done { def.display_date(order) } else { None },
        })
        .collect();

    Timeline {
        stages,
        current_stage_index,
    }
}

/// Vendor convention for "present": null, false, 0 and "" all count as missing.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn status_contains(order: &CombinedOrder, word: &str) -> bool {
    order.order.order_status().to_lowercase().contains(word)
}

/// Epoch milliseconds, RFC 3339, a naive ISO date-time, or a bare date.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(ndt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        }
        _ => None,
    }
}

/// `Month D, YYYY` on word boundaries, e.g. "March 5, 2024".
const MONTH_DAY_YEAR: &str = r"\b[A-Za-z]+ [0-9]{1,2}, [0-9]{4}\b";

static MONTH_DAY_YEAR_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// First substring shaped like `March 5, 2024`.
pub fn find_month_day_year(text: &str) -> Option<&str> {
    let re = MONTH_DAY_YEAR_RE
        .get_or_init(|| {
            Regex::new(MONTH_DAY_YEAR)
                .map_err(|e| warn!(error = %e, "date pattern failed to compile"))
                .ok()
        })
        .as_ref()?;
    re.find(text).map(|m| m.as_str())
}

// src/domain/history.rs

use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

use crate::domain::diff::{canonical_json, canonical_json_pretty, diff_values};
use crate::domain::order::Snapshot;
use crate::domain::rules::DiffRules;

/// Compact JSON longer than this is pretty-printed instead.
const INLINE_JSON_LIMIT: usize = 75;

/// Wall-clock rendering of a snapshot timestamp (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedAt {
    /// e.g. "October 16, 2026"
    pub date: String,
    /// e.g. "14:05"
    pub time: String,
}

impl RecordedAt {
    pub fn from_millis(timestamp: i64) -> Self {
        match DateTime::from_timestamp_millis(timestamp) {
            Some(dt) => Self {
                date: dt.format("%B %-d, %Y").to_string(),
                time: dt.format("%H:%M").to_string(),
            },
            None => Self {
                date: timestamp.to_string(),
                time: String::new(),
            },
        }
    }
}

/// One changed field, labeled and pre-formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLine {
    pub path: String,
    pub label: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub old_display: String,
    pub new_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// The oldest snapshot: the state everything else is compared to.
    Baseline {
        timestamp: i64,
        recorded_at: RecordedAt,
    },
    Changes {
        timestamp: i64,
        recorded_at: RecordedAt,
        changes: Vec<ChangeLine>,
    },
}

#[cfg(test)]
impl LogEntry {
    pub fn timestamp(&self) -> i64 {
        match self {
            LogEntry::Baseline { timestamp, .. } | LogEntry::Changes { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, LogEntry::Baseline { .. })
    }

    pub fn changes(&self) -> &[ChangeLine] {
        match self {
            LogEntry::Baseline { .. } => &[],
            LogEntry::Changes { changes, .. } => changes,
        }
    }
}

/// Build the change log for a history stored oldest first.
///
/// Entries come out newest first. Each snapshot is diffed against the one
/// recorded just before it; snapshots that differ only in ignored fields
/// produce no entry at all.
pub fn build_change_log(history: &[Snapshot], rules: &DiffRules) -> Vec<LogEntry> {
    let mut entries = Vec::with_capacity(history.len());

    for (i, snapshot) in history.iter().enumerate().rev() {
        let recorded_at = RecordedAt::from_millis(snapshot.timestamp);

        let Some(previous) = i.checked_sub(1).map(|p| &history[p]) else {
            entries.push(LogEntry::Baseline {
                timestamp: snapshot.timestamp,
                recorded_at,
            });
            continue;
        };

        let order_diff = diff_values(
            &previous.data.to_value(),
            &snapshot.data.to_value(),
            &rules.ignore,
        );
        if order_diff.is_empty() {
            continue;
        }

        let changes = order_diff
            .into_iter()
            .map(|(path, change)| ChangeLine {
                label: rules.labels.label_for(&path).to_string(),
                old_display: format_value(change.old.as_ref()),
                new_display: format_value(change.new.as_ref()),
                path,
                old: change.old,
                new: change.new,
            })
            .collect();

        entries.push(LogEntry::Changes {
            timestamp: snapshot.timestamp,
            recorded_at,
            changes,
        });
    }

    entries
}

pub fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => {
            let compact = canonical_json(v);
            if compact.len() > INLINE_JSON_LIMIT {
                canonical_json_pretty(v)
            } else {
                compact
            }
        }
        Some(Value::String(s)) if s.is_empty() => "\"\" (empty string)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(v @ Value::Number(_)) => canonical_json(v),
    }
}

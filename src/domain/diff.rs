// src/domain/diff.rs

//! Structural diff of two JSON trees.
//!
//! The walk is keyed by the union of both sides' object keys and produces a
//! flat map of dotted paths to `(old, new)` pairs. Objects are recursed into,
//! arrays are compared as whole values by their serialized text, and anything
//! else is a leaf. Paths covered by [`IgnoreRules`] are skipped entirely.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashSet};

/// Paths excluded from diff output.
///
/// An entry ending in `.` suppresses every path that starts with it (a whole
/// subtree). Any other entry suppresses exactly that path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRules {
    exact: HashSet<String>,
    subtrees: Vec<String>,
}

impl IgnoreRules {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules = Self::default();
        for entry in entries {
            rules.insert(entry.into());
        }
        rules
    }

    /// Rules that suppress nothing.
    #[cfg(test)]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: String) {
        if entry.ends_with('.') {
            if !self.subtrees.contains(&entry) {
                self.subtrees.push(entry);
            }
        } else {
            self.exact.insert(entry);
        }
    }

    pub fn is_suppressed(&self, path: &str) -> bool {
        self.exact.contains(path) || self.subtrees.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.subtrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single changed leaf. `None` means the key was absent on that side,
/// which is not the same thing as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

#[cfg(test)]
impl FieldChange {
    /// The same change seen from the other direction.
    pub fn reversed(&self) -> Self {
        Self {
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }
}

/// Changed paths of one comparison, iterated in path order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderDiff(BTreeMap<String, FieldChange>);

impl OrderDiff {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<&FieldChange> {
        self.0.get(path)
    }

    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.0.iter()
    }

    #[cfg(test)]
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn record(&mut self, path: String, old: Option<&Value>, new: Option<&Value>) {
        self.0.insert(
            path,
            FieldChange {
                old: old.cloned(),
                new: new.cloned(),
            },
        );
    }
}

impl IntoIterator for OrderDiff {
    type Item = (String, FieldChange);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Diff two present values.
pub fn diff_values(old: &Value, new: &Value, rules: &IgnoreRules) -> OrderDiff {
    diff(Some(old), Some(new), rules)
}

/// Diff two possibly-absent values. Anything that is not an object at the
/// root contributes no keys, so it behaves like an empty mapping.
pub fn diff(old: Option<&Value>, new: Option<&Value>, rules: &IgnoreRules) -> OrderDiff {
    let mut out = OrderDiff::default();
    walk(as_mapping(old), as_mapping(new), "", rules, &mut out);
    out
}

fn as_mapping(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

fn walk(
    old: Option<&Map<String, Value>>,
    new: Option<&Map<String, Value>>,
    parent: &str,
    rules: &IgnoreRules,
    out: &mut OrderDiff,
) {
    for key in union_keys(old, new) {
        let path = if parent.is_empty() {
            key.to_string()
        } else {
            format!("{parent}.{key}")
        };

        if rules.is_suppressed(&path) {
            continue;
        }

        let old_val = old.and_then(|m| m.get(key));
        let new_val = new.and_then(|m| m.get(key));

        if same_value(old_val, new_val) {
            continue;
        }

        match (old_val, new_val) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                walk(Some(a), Some(b), &path, rules, out);
            }
            (Some(a @ Value::Array(_)), Some(b @ Value::Array(_))) => {
                if !arrays_equal(a, b) {
                    out.record(path, old_val, new_val);
                }
            }
            _ => out.record(path, old_val, new_val),
        }
    }
}

/// Old side's keys in order, then keys only the new side has.
fn union_keys<'a>(
    old: Option<&'a Map<String, Value>>,
    new: Option<&'a Map<String, Value>>,
) -> Vec<&'a str> {
    let mut keys: Vec<&str> = old
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    if let Some(new) = new {
        for key in new.keys() {
            if !old.is_some_and(|m| m.contains_key(key)) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Identity for scalars. Objects and arrays are never "the same value" here;
/// they go through recursion or serialized comparison instead.
fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x == y,
        (Some(Value::String(x)), Some(Value::String(y))) => x == y,
        (Some(Value::Number(x)), Some(Value::Number(y))) => numbers_equal(x, y),
        _ => false,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    x.as_f64() == y.as_f64()
}

/// Arrays are equal only if their compact JSON text matches: element order
/// and key order inside contained objects both count.
fn arrays_equal(a: &Value, b: &Value) -> bool {
    canonical_json(a) == canonical_json(b)
}

/// Compact JSON text with integral floats written as integers, so `1.0`
/// prints as `1` the same way the vendor's own JSON does.
pub fn canonical_json(value: &Value) -> String {
    integral_floats_as_ints(value).to_string()
}

/// Pretty-printed counterpart of [`canonical_json`].
pub fn canonical_json_pretty(value: &Value) -> String {
    let value = integral_floats_as_ints(value);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

// Below 2^53 every integral f64 converts to i64 exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn integral_floats_as_ints(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Value::from(f as i64),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(integral_floats_as_ints).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), integral_floats_as_ints(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

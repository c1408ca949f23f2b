//! In-memory ordering of read rows
//!
//! Field sorts are stable and deterministic. Vector reads order by cosine
//! similarity, most similar first.

use std::cmp::Ordering;

use serde_json::Value;

use crate::command::SortField;
use crate::filter::{date_millis, resolve_path};

use super::store::Row;

/// Sorts rows for sorted and vector reads
pub struct RowSorter;

impl RowSorter {
    /// Sorts rows by the given fields, first field most significant.
    pub fn sort_by_fields(rows: &mut [Row], fields: &[SortField]) {
        rows.sort_by(|a, b| {
            for field in fields {
                let a_val = a
                    .document
                    .as_ref()
                    .and_then(|d| resolve_path(d, field.path.segments()));
                let b_val = b
                    .document
                    .as_ref()
                    .and_then(|d| resolve_path(d, field.path.segments()));

                let ordering = Self::compare_values(a_val, b_val);
                let ordering = if field.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Sorts rows by similarity of their `$vector` field to `query`.
    ///
    /// Rows without a vector of the same dimension sort last.
    pub fn sort_by_similarity(rows: &mut [Row], query: &[f32]) {
        let score = |row: &Row| {
            row.document
                .as_ref()
                .and_then(|d| d.get("$vector"))
                .and_then(|v| cosine_similarity(query, v))
        };
        rows.sort_by(|a, b| match (score(a), score(b)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing < null < bool < number < string < date < array < object
    /// - For same types, natural ordering
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let a_type = type_order(a_val);
                let b_type = type_order(b_val);
                if a_type != b_type {
                    return a_type.cmp(&b_type);
                }

                match (a_val, b_val) {
                    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                    (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        _ => {
                            let x = x.as_f64().unwrap_or(0.0);
                            let y = y.as_f64().unwrap_or(0.0);
                            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                        }
                    },
                    (Value::String(x), Value::String(y)) => x.cmp(y),
                    _ => match (date_millis(a_val), date_millis(b_val)) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        // Arrays and objects not compared
                        _ => Ordering::Equal,
                    },
                }
            }
        }
    }
}

fn type_order(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Object(_) if date_millis(value).is_some() => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Cosine similarity of `query` and a JSON number array.
pub fn cosine_similarity(query: &[f32], vector: &Value) -> Option<f32> {
    let items = vector.as_array()?;
    if items.len() != query.len() || query.is_empty() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut query_norm = 0.0f32;
    let mut row_norm = 0.0f32;
    for (q, item) in query.iter().zip(items) {
        let v = item.as_f64()? as f32;
        dot += q * v;
        query_norm += q * q;
        row_norm += v * v;
    }
    if query_norm == 0.0 || row_norm == 0.0 {
        return None;
    }
    Some(dot / (query_norm.sqrt() * row_norm.sqrt()))
}

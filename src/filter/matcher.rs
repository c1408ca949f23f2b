//! In-memory evaluation of expressions against JSON documents
//!
//! No type coercion across kinds: a text operand never matches a number.
//! A scalar operand matches an array field when any element matches.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::value::{DocumentId, IdentityCoercer, TypedValue};

use super::expression::{Expression, LogicalOperator};
use super::predicate::{Operator, Predicate};

/// Evaluates expressions against documents
pub struct ExpressionMatcher<'a> {
    identity: &'a dyn IdentityCoercer,
}

impl<'a> ExpressionMatcher<'a> {
    pub fn new(identity: &'a dyn IdentityCoercer) -> Self {
        Self { identity }
    }

    /// Checks if a document satisfies the expression
    pub fn matches(&self, document: &Value, expression: &Expression) -> bool {
        match expression {
            Expression::Leaf(predicates) => predicates
                .iter()
                .all(|p| self.matches_predicate(document, p)),
            Expression::Branch { children, .. } if children.is_empty() => true,
            Expression::Branch {
                operator: LogicalOperator::And,
                children,
            } => children.iter().all(|c| self.matches(document, c)),
            Expression::Branch {
                operator: LogicalOperator::Or,
                children,
            } => children.iter().any(|c| self.matches(document, c)),
        }
    }

    /// Checks if a document satisfies a single predicate
    pub fn matches_predicate(&self, document: &Value, predicate: &Predicate) -> bool {
        let actual = resolve_path(document, predicate.field.segments());

        if predicate.is_identity() {
            let id = actual.and_then(|v| self.identity.coerce(v).ok());
            return match (&predicate.operator, &predicate.operand) {
                (Operator::Eq, TypedValue::Id(expected)) => id.as_ref() == Some(expected),
                (Operator::Ne, TypedValue::Id(expected)) => id.as_ref() != Some(expected),
                (Operator::In, TypedValue::Ids(ids)) => id.map_or(false, |i| ids.contains(&i)),
                (Operator::Nin, TypedValue::Ids(ids)) => !id.map_or(false, |i| ids.contains(&i)),
                _ => false,
            };
        }

        match predicate.operator {
            Operator::Exists => {
                matches!(predicate.operand, TypedValue::Exists(wanted) if wanted == actual.is_some())
            }
            Operator::Eq => actual.map_or(false, |v| contains_match(v, &predicate.operand)),
            Operator::Ne => !actual.map_or(false, |v| contains_match(v, &predicate.operand)),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                actual.map_or(false, |v| range_match(v, predicate.operator, &predicate.operand))
            }
            Operator::In => actual.map_or(false, |v| in_match(v, &predicate.operand)),
            Operator::Nin => !actual.map_or(false, |v| in_match(v, &predicate.operand)),
            Operator::All => match (actual, &predicate.operand) {
                (Some(Value::Array(items)), TypedValue::Values(wanted)) => wanted
                    .iter()
                    .all(|w| items.iter().any(|item| literal_eq(item, w))),
                _ => false,
            },
            Operator::Size => match (actual, &predicate.operand) {
                (Some(Value::Array(items)), TypedValue::Size(n)) => items.len() as u64 == *n,
                _ => false,
            },
        }
    }

    /// Identity of a document, per the configured coercer
    pub fn document_id(&self, document: &Value) -> Option<DocumentId> {
        self.identity.extract(document)
    }
}

/// Walks a dotted path. Numeric segments index into arrays.
pub fn resolve_path<'v, 'p>(
    document: &'v Value,
    segments: impl Iterator<Item = &'p str>,
) -> Option<&'v Value> {
    let mut current = document;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Equality, or membership when the field is an array and the operand is not
fn contains_match(actual: &Value, operand: &TypedValue) -> bool {
    if literal_eq(actual, operand) {
        return true;
    }
    match (actual, operand) {
        (Value::Array(_), TypedValue::Array(_)) => false,
        (Value::Array(items), _) => items.iter().any(|item| literal_eq(item, operand)),
        _ => false,
    }
}

fn in_match(actual: &Value, operand: &TypedValue) -> bool {
    match operand {
        TypedValue::Values(values) => values.iter().any(|v| contains_match(actual, v)),
        _ => false,
    }
}

fn range_match(actual: &Value, operator: Operator, operand: &TypedValue) -> bool {
    let check = |value: &Value| {
        compare(value, operand).map_or(false, |ordering| match operator {
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            _ => false,
        })
    };
    match actual {
        Value::Array(items) => items.iter().any(check),
        other => check(other),
    }
}

/// Exact typed equality between a document value and an operand
fn literal_eq(actual: &Value, operand: &TypedValue) -> bool {
    match (actual, operand) {
        (Value::String(a), TypedValue::Text(b)) => a == b,
        (Value::Number(a), TypedValue::Number(b)) => numbers_equal(a, b),
        (Value::Bool(a), TypedValue::Boolean(b)) => a == b,
        (Value::Null, TypedValue::Null) => true,
        (Value::Array(a), TypedValue::Array(b)) => a == b,
        (Value::Object(a), TypedValue::SubDocument(b)) => a == b,
        (Value::Object(_), TypedValue::Date(b)) => {
            date_millis(actual) == Some(b.timestamp_millis())
        }
        _ => false,
    }
}

fn compare(actual: &Value, operand: &TypedValue) -> Option<Ordering> {
    match (actual, operand) {
        (Value::String(a), TypedValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Number(a), TypedValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Object(_), TypedValue::Date(b)) => {
            Some(date_millis(actual)?.cmp(&b.timestamp_millis()))
        }
        _ => None,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_f64() == b.as_f64(),
    }
}

/// Epoch millis of a `{"$date": ms}` document value
pub(crate) fn date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("$date")?.as_i64(),
        _ => None,
    }
}

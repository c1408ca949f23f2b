//! Lowering of predicates to store-native conditions
//!
//! Documents are shredded into column families keyed by field path. Each
//! predicate lowers to exactly one condition on one of those columns. This
//! is the only place that matches on operand kinds for storage purposes.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;

use serde::Serialize;
use serde_json::Value;

use crate::value::{hash_json, DocumentId, TypedValue};

use super::errors::{FilterError, FilterResult};
use super::predicate::{Operator, Predicate};

/// Shredded column families of a document row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Key,
    ExistKeys,
    ArraySize,
    ArrayContains,
    QueryTextValues,
    QueryDblValues,
    QueryBoolValues,
    QueryNullValues,
    QueryTimestampValues,
    ArrayEquals,
    SubDocEquals,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Key => "key",
            Column::ExistKeys => "exist_keys",
            Column::ArraySize => "array_size",
            Column::ArrayContains => "array_contains",
            Column::QueryTextValues => "query_text_values",
            Column::QueryDblValues => "query_dbl_values",
            Column::QueryBoolValues => "query_bool_values",
            Column::QueryNullValues => "query_null_values",
            Column::QueryTimestampValues => "query_timestamp_values",
            Column::ArrayEquals => "array_equals",
            Column::SubDocEquals => "sub_doc_equals",
        }
    }
}

/// Relation of a store condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    ContainsAll,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Ne => "!=",
            Relation::Gt => ">",
            Relation::Gte => ">=",
            Relation::Lt => "<",
            Relation::Lte => "<=",
            Relation::In => "IN",
            Relation::NotIn => "NOT IN",
            Relation::Contains => "CONTAINS",
            Relation::NotContains => "NOT CONTAINS",
            Relation::ContainsAll => "CONTAINS ALL",
        }
    }
}

/// One condition against a shredded column.
///
/// `path` is the map key inside the column family; it is `None` for the
/// primary key and for set columns queried by membership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreCondition {
    pub column: Column,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub relation: Relation,
    pub value: Value,
}

impl fmt::Display for StoreCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "{}['{}'] {} {}",
                self.column.as_str(),
                path,
                self.relation.as_str(),
                self.value
            ),
            None => write!(
                f,
                "{} {} {}",
                self.column.as_str(),
                self.relation.as_str(),
                self.value
            ),
        }
    }
}

/// Lowers a predicate to its store condition.
pub fn lower(predicate: &Predicate) -> FilterResult<StoreCondition> {
    let path = predicate.field.as_str();
    let op = predicate.operator;

    let (column, keyed, relation, value) = match &predicate.operand {
        TypedValue::Id(id) => (Column::Key, false, comparison(op, false), key_value(id)),
        TypedValue::Ids(ids) => (
            Column::Key,
            false,
            membership(op),
            Value::Array(ids.iter().map(key_value).collect()),
        ),
        TypedValue::Text(s) => (
            Column::QueryTextValues,
            true,
            comparison(op, true),
            Value::String(s.clone()),
        ),
        TypedValue::Number(n) => (
            Column::QueryDblValues,
            true,
            comparison(op, true),
            Value::Number(n.clone()),
        ),
        TypedValue::Boolean(b) => (
            Column::QueryBoolValues,
            true,
            comparison(op, false),
            Value::Bool(*b),
        ),
        TypedValue::Date(d) => (
            Column::QueryTimestampValues,
            true,
            comparison(op, true),
            Value::from(d.timestamp_millis()),
        ),
        TypedValue::Null => (
            Column::QueryNullValues,
            false,
            containment(op),
            Value::String(path.to_string()),
        ),
        TypedValue::Array(items) => (
            Column::ArrayEquals,
            true,
            comparison(op, false),
            Value::String(digest(&Value::Array(items.clone()))),
        ),
        TypedValue::SubDocument(map) => (
            Column::SubDocEquals,
            true,
            comparison(op, false),
            Value::String(digest(&Value::Object(map.clone()))),
        ),
        TypedValue::Values(values) => (
            Column::ArrayContains,
            false,
            match op {
                Operator::All => Some(Relation::ContainsAll),
                other => membership(other),
            },
            Value::Array(values.iter().map(|v| contains_entry(path, v)).collect()),
        ),
        TypedValue::Size(n) => (
            Column::ArraySize,
            true,
            (op == Operator::Size).then_some(Relation::Eq),
            Value::from(*n),
        ),
        TypedValue::Exists(exists) => (
            Column::ExistKeys,
            false,
            (op == Operator::Exists).then_some(if *exists {
                Relation::Contains
            } else {
                Relation::NotContains
            }),
            Value::String(path.to_string()),
        ),
    };

    let relation = relation.ok_or_else(|| {
        FilterError::invalid_operand(
            path,
            format!(
                "{} has no store condition for a {} operand",
                op,
                predicate.operand.type_name()
            ),
        )
    })?;

    Ok(StoreCondition {
        column,
        path: keyed.then(|| path.to_string()),
        relation,
        value,
    })
}

/// Lowers every predicate of a leaf
pub fn lower_all(predicates: &[Predicate]) -> FilterResult<Vec<StoreCondition>> {
    predicates.iter().map(lower).collect()
}

fn comparison(op: Operator, ordered: bool) -> Option<Relation> {
    match op {
        Operator::Eq => Some(Relation::Eq),
        Operator::Ne => Some(Relation::Ne),
        Operator::Gt if ordered => Some(Relation::Gt),
        Operator::Gte if ordered => Some(Relation::Gte),
        Operator::Lt if ordered => Some(Relation::Lt),
        Operator::Lte if ordered => Some(Relation::Lte),
        _ => None,
    }
}

fn membership(op: Operator) -> Option<Relation> {
    match op {
        Operator::In => Some(Relation::In),
        Operator::Nin => Some(Relation::NotIn),
        _ => None,
    }
}

fn containment(op: Operator) -> Option<Relation> {
    match op {
        Operator::Eq => Some(Relation::Contains),
        Operator::Ne => Some(Relation::NotContains),
        _ => None,
    }
}

fn key_value(id: &DocumentId) -> Value {
    Value::Array(vec![Value::from(id.type_code()), Value::String(id.key_text())])
}

/// `array_contains` entry: path plus a type-tagged value
fn contains_entry(path: &str, value: &TypedValue) -> Value {
    let tagged = match value {
        TypedValue::Text(s) => format!("S{}", s),
        TypedValue::Number(n) => format!("N{}", n),
        TypedValue::Boolean(b) => format!("B{}", b),
        TypedValue::Null => "Z".to_string(),
        TypedValue::Date(d) => format!("T{}", d.timestamp_millis()),
        TypedValue::Array(items) => format!("A{}", digest(&Value::Array(items.clone()))),
        TypedValue::SubDocument(map) => format!("O{}", digest(&Value::Object(map.clone()))),
        other => format!("X{}", other.to_json()),
    };
    Value::String(format!("{} {}", path, tagged))
}

fn digest(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    hash_json(value, &mut hasher);
    format!("{:016x}", hasher.finish())
}

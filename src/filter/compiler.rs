//! Filter clause compiler
//!
//! Turns a parsed filter clause into an `Expression`:
//!
//! 1. Entries are walked in source order
//! 2. `$and` / `$or` with an array value become a `Branch`; each element is
//!    compiled into a child node. An empty array gives an empty branch.
//! 3. `field: scalar` becomes an EQ predicate; `field: {"$op": x, ...}`
//!    gives one predicate per operator, all in the same leaf
//! 4. Top-level predicates share one leaf, which sits under the root AND
//!    next to any top-level branches
//! 5. Identity EQ/IN predicates reachable through AND nodes are folded into
//!    one

use serde_json::{Map, Value};

use crate::value::{DocumentId, FieldPath, IdentityCoercer, TypedValue};

use super::errors::{FilterError, FilterResult};
use super::expression::{Expression, LeafBuilder, LogicalOperator};
use super::predicate::{Operator, Predicate};

/// Single-key objects that are typed literals rather than operator maps
const EXTENDED_LITERALS: [&str; 3] = ["$date", "$uuid", "$objectId"];

/// Compiles filter clauses. Stateless; safe to share across requests.
pub struct FilterCompiler<'a> {
    identity: &'a dyn IdentityCoercer,
    max_in_values: usize,
}

impl<'a> FilterCompiler<'a> {
    /// Creates a compiler.
    ///
    /// `max_in_values` bounds the length of `$in`, `$nin` and `$all` lists.
    pub fn new(identity: &'a dyn IdentityCoercer, max_in_values: usize) -> Self {
        Self {
            identity,
            max_in_values,
        }
    }

    /// Compiles an optional clause; absent and `null` give an empty tree.
    pub fn compile(&self, clause: Option<&Value>) -> FilterResult<Expression> {
        match clause {
            None | Some(Value::Null) => Ok(Expression::empty()),
            Some(Value::Object(map)) => self.compile_clause(map),
            Some(_) => Err(FilterError::invalid_expression(
                "Filter clause must be an object",
            )),
        }
    }

    /// Compiles a clause into a root AND node.
    pub fn compile_clause(&self, clause: &Map<String, Value>) -> FilterResult<Expression> {
        let (leaf, branches) = self.compile_entries(clause)?;

        let mut children = Vec::with_capacity(branches.len() + 1);
        if !leaf.is_empty() {
            children.push(leaf.build());
        }
        children.extend(branches);

        let mut root = Expression::and(children);
        root.reconcile_identity_predicates();
        Ok(root)
    }

    fn compile_entries(
        &self,
        clause: &Map<String, Value>,
    ) -> FilterResult<(LeafBuilder, Vec<Expression>)> {
        let mut leaf = LeafBuilder::default();
        let mut branches = Vec::new();

        for (key, value) in clause {
            match key.as_str() {
                "$and" => branches.push(self.compile_logical(LogicalOperator::And, key, value)?),
                "$or" => branches.push(self.compile_logical(LogicalOperator::Or, key, value)?),
                other if other.starts_with('$') => {
                    return Err(FilterError::unsupported_operator(None, other));
                }
                field => self.compile_field(field, value, &mut leaf)?,
            }
        }

        Ok((leaf, branches))
    }

    fn compile_logical(
        &self,
        operator: LogicalOperator,
        key: &str,
        value: &Value,
    ) -> FilterResult<Expression> {
        let elements = value.as_array().ok_or_else(|| {
            FilterError::invalid_expression(format!("'{}' requires an array of clauses", key))
        })?;

        let children = elements
            .iter()
            .map(|element| self.compile_element(key, element))
            .collect::<FilterResult<Vec<_>>>()?;

        Ok(Expression::Branch { operator, children })
    }

    /// Compiles one element of a `$and`/`$or` array.
    fn compile_element(&self, key: &str, element: &Value) -> FilterResult<Expression> {
        let map = element.as_object().ok_or_else(|| {
            FilterError::invalid_expression(format!("'{}' elements must be objects", key))
        })?;

        let (leaf, mut branches) = self.compile_entries(map)?;
        if branches.is_empty() {
            return Ok(leaf.build());
        }
        if leaf.is_empty() && branches.len() == 1 {
            return Ok(branches.remove(0));
        }

        let mut children = Vec::with_capacity(branches.len() + 1);
        if !leaf.is_empty() {
            children.push(leaf.build());
        }
        children.extend(branches);
        Ok(Expression::and(children))
    }

    fn compile_field(&self, field: &str, value: &Value, leaf: &mut LeafBuilder) -> FilterResult<()> {
        let path = FieldPath::parse(field)
            .map_err(|e| FilterError::invalid_expression(e.to_string()))?;
        let is_identity = field == self.identity.field_name();

        match operator_map(field, value)? {
            Some(operators) => {
                for (key, operand) in operators {
                    let operator = Operator::from_key(key)
                        .ok_or_else(|| FilterError::unsupported_operator(Some(field), key))?;
                    leaf.push(self.predicate(&path, is_identity, operator, operand)?);
                }
            }
            None => leaf.push(self.predicate(&path, is_identity, Operator::Eq, value)?),
        }
        Ok(())
    }

    fn predicate(
        &self,
        path: &FieldPath,
        is_identity: bool,
        operator: Operator,
        raw: &Value,
    ) -> FilterResult<Predicate> {
        if is_identity {
            return self.identity_predicate(path, operator, raw);
        }

        let operand = match operator {
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte => literal(path, raw)?,
            Operator::In | Operator::Nin | Operator::All => {
                let values = self
                    .operand_list(path, operator, raw)?
                    .iter()
                    .map(|item| literal(path, item))
                    .collect::<FilterResult<Vec<_>>>()?;
                TypedValue::Values(values)
            }
            Operator::Size => TypedValue::Size(size_operand(path, raw)?),
            Operator::Exists => TypedValue::Exists(raw.as_bool().ok_or_else(|| {
                FilterError::invalid_operand(path.as_str(), "$exists requires a boolean")
            })?),
        };

        Predicate::new(path.clone(), operator, operand)
    }

    fn identity_predicate(
        &self,
        path: &FieldPath,
        operator: Operator,
        raw: &Value,
    ) -> FilterResult<Predicate> {
        if !operator.allowed_on_identity() {
            return Err(FilterError::unsupported_operator(
                Some(path.as_str()),
                operator.as_str(),
            ));
        }

        let operand = match operator {
            Operator::In | Operator::Nin => {
                let ids = self
                    .operand_list(path, operator, raw)?
                    .iter()
                    .map(|item| self.coerce_id(path, item))
                    .collect::<FilterResult<Vec<_>>>()?;
                TypedValue::Ids(ids)
            }
            _ => TypedValue::Id(self.coerce_id(path, raw)?),
        };

        Predicate::new(path.clone(), operator, operand)
    }

    fn operand_list<'v>(
        &self,
        path: &FieldPath,
        operator: Operator,
        raw: &'v Value,
    ) -> FilterResult<&'v Vec<Value>> {
        let items = raw.as_array().ok_or_else(|| {
            FilterError::invalid_operand(path.as_str(), format!("{} requires an array", operator))
        })?;
        if items.len() > self.max_in_values {
            return Err(FilterError::invalid_operand(
                path.as_str(),
                format!(
                    "{} accepts at most {} values, got {}",
                    operator,
                    self.max_in_values,
                    items.len()
                ),
            ));
        }
        Ok(items)
    }

    fn coerce_id(&self, path: &FieldPath, raw: &Value) -> FilterResult<DocumentId> {
        self.identity
            .coerce(raw)
            .map_err(|e| FilterError::invalid_operand(path.as_str(), e.to_string()))
    }
}

/// Returns the operator entries of `value` when it is an operator map.
fn operator_map<'v>(field: &str, value: &'v Value) -> FilterResult<Option<&'v Map<String, Value>>> {
    let Value::Object(map) = value else {
        return Ok(None);
    };

    let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        return Ok(None);
    }
    if operator_keys != map.len() {
        return Err(FilterError::invalid_expression(format!(
            "Filter on '{}' mixes operators and field names",
            field
        )));
    }
    if map.len() == 1 && map.keys().any(|k| EXTENDED_LITERALS.contains(&k.as_str())) {
        return Ok(None);
    }
    Ok(Some(map))
}

fn literal(path: &FieldPath, raw: &Value) -> FilterResult<TypedValue> {
    TypedValue::from_literal(raw).map_err(|e| FilterError::invalid_operand(path.as_str(), e.to_string()))
}

fn size_operand(path: &FieldPath, raw: &Value) -> FilterResult<u64> {
    if let Some(n) = raw.as_u64() {
        return Ok(n);
    }
    match raw.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => Err(FilterError::invalid_operand(
            path.as_str(),
            "$size requires a non-negative integer",
        )),
    }
}

//! Predicate model
//!
//! A predicate is one typed comparison on one field. Identity predicates
//! (operand `Id`/`Ids`) target the primary key and get special treatment in
//! compilation and planning.

use std::fmt;

use crate::value::{DocumentId, FieldPath, TypedValue};

use super::errors::{FilterError, FilterResult};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Size,
    Exists,
}

impl Operator {
    /// Maps an operator key (`"$gt"`) to its operator
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            "$all" => Some(Operator::All),
            "$size" => Some(Operator::Size),
            "$exists" => Some(Operator::Exists),
            _ => None,
        }
    }

    /// Returns the operator key
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::All => "$all",
            Operator::Size => "$size",
            Operator::Exists => "$exists",
        }
    }

    /// Returns true for `$gt`, `$gte`, `$lt`, `$lte`
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    /// Operators accepted on the identity field
    pub fn allowed_on_identity(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::In | Operator::Nin
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate (field + operator + operand).
///
/// Equality and hashing cover all three parts; the field path is hashed
/// before the operand so that the same value at two paths hashes apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub field: FieldPath,
    pub operator: Operator,
    pub operand: TypedValue,
}

impl Predicate {
    /// Creates a predicate, checking operand/operator compatibility.
    pub fn new(field: FieldPath, operator: Operator, operand: TypedValue) -> FilterResult<Self> {
        check_operand(&field, operator, &operand)?;
        Ok(Self {
            field,
            operator,
            operand,
        })
    }

    /// Identity equality: `{"_id": id}`
    pub fn id_eq(id_field: &FieldPath, id: DocumentId) -> Self {
        Self {
            field: id_field.clone(),
            operator: Operator::Eq,
            operand: TypedValue::Id(id),
        }
    }

    /// Identity membership: `{"_id": {"$in": ids}}`
    pub fn id_in(id_field: &FieldPath, ids: Vec<DocumentId>) -> Self {
        Self {
            field: id_field.clone(),
            operator: Operator::In,
            operand: TypedValue::Ids(ids),
        }
    }

    /// Returns true if this predicate targets the identity field
    pub fn is_identity(&self) -> bool {
        matches!(self.operand, TypedValue::Id(_) | TypedValue::Ids(_))
    }

    /// Identity EQ or IN: the shapes that narrow a read to known keys
    pub fn is_identity_lookup(&self) -> bool {
        self.is_identity() && matches!(self.operator, Operator::Eq | Operator::In)
    }

    /// Key values selected by an identity EQ/IN predicate
    pub fn identity_values(&self) -> Option<Vec<DocumentId>> {
        match (&self.operator, &self.operand) {
            (Operator::Eq, TypedValue::Id(id)) => Some(vec![id.clone()]),
            (Operator::In, TypedValue::Ids(ids)) => Some(ids.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.operand.to_json())
    }
}

/// Reconciles two identity EQ/IN predicates of the same leaf into one.
///
/// The result is the intersection of both key lists, keeping the order and
/// duplicates of `existing`. It stays an EQ when either side was an EQ and
/// the intersection is not empty; otherwise it is an IN, possibly empty.
pub fn reconcile_identity(existing: &Predicate, incoming: &Predicate) -> Predicate {
    let left = existing.identity_values().unwrap_or_default();
    let right = incoming.identity_values().unwrap_or_default();
    let either_eq = existing.operator == Operator::Eq || incoming.operator == Operator::Eq;

    let mut kept: Vec<DocumentId> = left.into_iter().filter(|id| right.contains(id)).collect();

    if either_eq && !kept.is_empty() {
        kept.truncate(1);
        let id = kept.remove(0);
        Predicate::id_eq(&existing.field, id)
    } else {
        Predicate::id_in(&existing.field, kept)
    }
}

fn check_operand(field: &FieldPath, operator: Operator, operand: &TypedValue) -> FilterResult<()> {
    let ok = match operator {
        Operator::Eq | Operator::Ne => !matches!(
            operand,
            TypedValue::Ids(_) | TypedValue::Values(_) | TypedValue::Size(_) | TypedValue::Exists(_)
        ),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => operand.is_ordered(),
        Operator::In | Operator::Nin => {
            matches!(operand, TypedValue::Ids(_) | TypedValue::Values(_))
        }
        Operator::All => matches!(operand, TypedValue::Values(_)),
        Operator::Size => matches!(operand, TypedValue::Size(_)),
        Operator::Exists => matches!(operand, TypedValue::Exists(_)),
    };

    if ok {
        Ok(())
    } else {
        Err(FilterError::invalid_operand(
            field.as_str(),
            format!("{} does not accept a {} operand", operator, operand.type_name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn path(p: &str) -> FieldPath {
        FieldPath::parse(p).unwrap()
    }

    fn hash_of(p: &Predicate) -> u64 {
        let mut hasher = DefaultHasher::new();
        p.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_operator_keys() {
        assert_eq!(Operator::from_key("$gte"), Some(Operator::Gte));
        assert_eq!(Operator::from_key("$regex"), None);
        assert!(Operator::Lt.is_range());
        assert!(!Operator::In.is_range());
    }

    #[test]
    fn test_operand_compatibility() {
        let size = Predicate::new(path("tags"), Operator::Size, TypedValue::Size(2));
        assert!(size.is_ok());

        let bad = Predicate::new(path("tags"), Operator::Size, TypedValue::Text("2".into()));
        assert!(bad.is_err());

        let range_on_bool = Predicate::new(path("flag"), Operator::Gt, TypedValue::Boolean(true));
        assert!(range_on_bool.is_err());

        let empty_in = Predicate::new(path("x"), Operator::In, TypedValue::Values(vec![]));
        assert!(empty_in.is_ok());
    }

    #[test]
    fn test_same_value_different_paths_hash_apart() {
        let value = TypedValue::Number(Number::from(7));
        let a = Predicate::new(path("a"), Operator::Eq, value.clone()).unwrap();
        let b = Predicate::new(path("b"), Operator::Eq, value).unwrap();

        assert_ne!(a, b);
        assert_ne!(hash_of(&a), hash_of(&b));
        assert_eq!(hash_of(&a), hash_of(&a.clone()));
    }

    #[test]
    fn test_reconcile_eq_and_in() {
        let id_field = path("_id");
        let eq = Predicate::id_eq(&id_field, DocumentId::string("a"));
        let list = Predicate::id_in(
            &id_field,
            vec![DocumentId::string("a"), DocumentId::string("b")],
        );

        let merged = reconcile_identity(&eq, &list);
        assert_eq!(merged, Predicate::id_eq(&id_field, DocumentId::string("a")));

        let disjoint = reconcile_identity(
            &Predicate::id_eq(&id_field, DocumentId::string("z")),
            &list,
        );
        assert_eq!(disjoint, Predicate::id_in(&id_field, vec![]));
    }

    #[test]
    fn test_reconcile_two_lists_keeps_duplicates() {
        let id_field = path("_id");
        let left = Predicate::id_in(
            &id_field,
            vec![
                DocumentId::string("a"),
                DocumentId::string("b"),
                DocumentId::string("a"),
            ],
        );
        let right = Predicate::id_in(&id_field, vec![DocumentId::string("a")]);

        let merged = reconcile_identity(&left, &right);
        assert_eq!(
            merged.identity_values().unwrap(),
            vec![DocumentId::string("a"), DocumentId::string("a")]
        );
        assert_eq!(merged.operator, Operator::In);
    }
}

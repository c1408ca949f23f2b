//! Filter Compilation Tests
//!
//! - Field order at one nesting level does not change the predicates
//! - Empty `$and`/`$or` compile to an empty tree
//! - Identity filters compile to one identity predicate, also across AND
//!   fragments
//! - Nested logical clauses keep their structure

use std::collections::HashMap;

use docplan::filter::{
    Expression, FilterCompiler, FilterErrorCode, LogicalOperator, Operator, Predicate,
};
use docplan::value::{DocumentId, JsonIdentity, TypedValue};
use serde_json::{json, Value};

// =============================================================================
// Test Utilities
// =============================================================================

fn compile(clause: Value) -> Expression {
    FilterCompiler::new(&JsonIdentity, 100)
        .compile(Some(&clause))
        .expect("clause should compile")
}

fn leaf_multisets(expression: &Expression) -> Vec<HashMap<Predicate, usize>> {
    expression
        .leaves()
        .into_iter()
        .map(|leaf| {
            let mut counts = HashMap::new();
            for predicate in leaf {
                *counts.entry(predicate.clone()).or_insert(0) += 1;
            }
            counts
        })
        .collect()
}

// =============================================================================
// Field Order
// =============================================================================

#[test]
fn test_field_order_does_not_change_leaf_predicates() {
    let forward = compile(json!({"a": 1, "b": {"$gt": 2}, "c": "x"}));
    let reversed = compile(json!({"c": "x", "b": {"$gt": 2}, "a": 1}));

    assert_eq!(leaf_multisets(&forward), leaf_multisets(&reversed));
    assert_eq!(forward.total_predicate_count(), 3);
}

#[test]
fn test_field_order_inside_or_branches() {
    let forward = compile(json!({"$or": [{"a": 1, "b": 2}, {"c": 3}]}));
    let reversed = compile(json!({"$or": [{"b": 2, "a": 1}, {"c": 3}]}));
    assert_eq!(leaf_multisets(&forward), leaf_multisets(&reversed));
}

// =============================================================================
// Empty Logical Clauses
// =============================================================================

#[test]
fn test_empty_logical_clauses_have_no_predicates() {
    let absent = FilterCompiler::new(&JsonIdentity, 100).compile(None).unwrap();
    assert_eq!(absent.total_predicate_count(), 0);

    for clause in [json!({"$and": []}), json!({"$or": []}), json!({})] {
        let tree = compile(clause);
        assert_eq!(tree.total_predicate_count(), 0);
        assert!(tree.is_empty());
    }
}

// =============================================================================
// Identity Predicates
// =============================================================================

#[test]
fn test_identity_equality() {
    let tree = compile(json!({"_id": "x"}));
    let predicates = tree.predicates();

    assert_eq!(predicates.len(), 1);
    assert!(predicates[0].is_identity());
    assert_eq!(predicates[0].operator, Operator::Eq);
    assert_eq!(predicates[0].operand, TypedValue::Id(DocumentId::string("x")));
}

#[test]
fn test_identity_in_list() {
    let tree = compile(json!({"_id": {"$in": ["a", "b"]}}));
    let predicates = tree.predicates();

    assert_eq!(predicates.len(), 1);
    assert_eq!(predicates[0].operator, Operator::In);
    assert_eq!(
        predicates[0].operand,
        TypedValue::Ids(vec![DocumentId::string("a"), DocumentId::string("b")])
    );
}

#[test]
fn test_identity_empty_in_matches_nothing() {
    let tree = compile(json!({"_id": {"$in": []}}));
    let predicates = tree.predicates();

    assert_eq!(predicates.len(), 1);
    assert_eq!(predicates[0].operand, TypedValue::Ids(Vec::new()));
    assert_eq!(tree.identity_lookup(), Some(Vec::new()));
}

#[test]
fn test_identity_in_keeps_duplicates() {
    let tree = compile(json!({"_id": {"$in": ["a", "a"]}}));
    assert_eq!(
        tree.identity_lookup(),
        Some(vec![DocumentId::string("a"), DocumentId::string("a")])
    );
}

#[test]
fn test_identity_fragments_reconciled_into_one_lookup() {
    let tree = compile(json!({"_id": "a", "$and": [{"_id": {"$in": ["a", "b"]}}]}));
    let predicates = tree.predicates();

    assert_eq!(predicates.len(), 1);
    assert_eq!(predicates[0].operator, Operator::Eq);
    assert_eq!(tree.identity_lookup(), Some(vec![DocumentId::string("a")]));

    // Disjoint fragments intersect to an empty lookup, never a scan
    let disjoint = compile(json!({"_id": "z", "$and": [{"_id": {"$in": ["a", "b"]}}]}));
    assert_eq!(disjoint.identity_lookup(), Some(Vec::new()));
}

// =============================================================================
// Nested Structure
// =============================================================================

#[test]
fn test_nested_and_or_structure() {
    let tree = compile(json!({
        "$and": [
            {"f1": "v1"},
            {"f2": "v2"},
            {"$or": [{"f3": "v3"}, {"f4": "v4"}]}
        ]
    }));
    assert_eq!(tree.total_predicate_count(), 4);

    let Expression::Branch { children, .. } = &tree else {
        panic!("root must be a branch");
    };
    let Expression::Branch {
        operator: LogicalOperator::And,
        children: and_children,
    } = &children[0]
    else {
        panic!("expected the $and branch");
    };
    assert_eq!(and_children.len(), 3);
    assert!(matches!(&and_children[0], Expression::Leaf(p) if p.len() == 1));
    assert!(matches!(&and_children[1], Expression::Leaf(p) if p.len() == 1));

    let Expression::Branch {
        operator: LogicalOperator::Or,
        children: or_children,
    } = &and_children[2]
    else {
        panic!("expected the $or branch");
    };
    assert_eq!(or_children.len(), 2);
    assert!(or_children
        .iter()
        .all(|c| matches!(c, Expression::Leaf(p) if p.len() == 1)));
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_rejections_are_typed() {
    let compiler = FilterCompiler::new(&JsonIdentity, 2);
    let cases = [
        (json!({"a": {"$near": 1}}), FilterErrorCode::UnsupportedFilterOperator),
        (json!({"$where": "x"}), FilterErrorCode::UnsupportedFilterOperator),
        (json!({"a": {"$in": [1, 2, 3]}}), FilterErrorCode::InvalidFilterOperand),
        (json!({"a": {"$gt": true}}), FilterErrorCode::InvalidFilterOperand),
        (json!({"a": {"$gt": 1, "b": 2}}), FilterErrorCode::InvalidFilterExpression),
        (json!({"$or": {"a": 1}}), FilterErrorCode::InvalidFilterExpression),
    ];

    for (clause, expected) in cases {
        let err = compiler.compile(Some(&clause)).unwrap_err();
        assert_eq!(err.code(), expected, "clause {}", clause);
        assert!(err.to_string().starts_with("[REJECT]"));
    }
}

//! Boolean expression tree over predicates

use std::fmt;

use crate::value::{DocumentId, TypedValue};

use super::predicate::{reconcile_identity, Operator, Predicate};

/// Boolean combinator of a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Node of a compiled filter.
///
/// A `Leaf` is an implicit AND of its predicates; a `Branch` combines child
/// nodes. Empty leaves and empty branches (of either operator) are vacuously
/// true. The tree is built once per command and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Leaf(Vec<Predicate>),
    Branch {
        operator: LogicalOperator,
        children: Vec<Expression>,
    },
}

impl Expression {
    /// Root of an absent filter: AND with no children
    pub fn empty() -> Self {
        Expression::Branch {
            operator: LogicalOperator::And,
            children: Vec::new(),
        }
    }

    pub fn and(children: Vec<Expression>) -> Self {
        Expression::Branch {
            operator: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<Expression>) -> Self {
        Expression::Branch {
            operator: LogicalOperator::Or,
            children,
        }
    }

    /// Total number of predicates across the whole tree.
    pub fn total_predicate_count(&self) -> usize {
        match self {
            Expression::Leaf(predicates) => predicates.len(),
            Expression::Branch { children, .. } => {
                children.iter().map(Expression::total_predicate_count).sum()
            }
        }
    }

    /// True when the tree holds no predicate at all
    pub fn is_empty(&self) -> bool {
        self.total_predicate_count() == 0
    }

    /// All predicates in canonical order: depth-first, children in source
    /// order, predicates in leaf order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Expression::Leaf(predicates) => out.extend(predicates.iter()),
            Expression::Branch { children, .. } => {
                for child in children {
                    child.collect_predicates(out);
                }
            }
        }
    }

    /// Leaves in canonical order
    pub fn leaves(&self) -> Vec<&[Predicate]> {
        match self {
            Expression::Leaf(predicates) => vec![predicates.as_slice()],
            Expression::Branch { children, .. } => {
                children.iter().flat_map(Expression::leaves).collect()
            }
        }
    }

    /// Keys selected when the filter is exactly one identity EQ/IN predicate
    /// reachable through AND nodes only.
    ///
    /// Such a filter can be served by key reads instead of a scan.
    pub fn identity_lookup(&self) -> Option<Vec<DocumentId>> {
        if self.total_predicate_count() != 1 {
            return None;
        }
        let mut node = self;
        loop {
            match node {
                Expression::Leaf(predicates) => {
                    return predicates
                        .first()
                        .filter(|p| p.is_identity_lookup())
                        .and_then(Predicate::identity_values);
                }
                Expression::Branch {
                    operator: LogicalOperator::And,
                    children,
                } => {
                    node = children.iter().find(|c| !c.is_empty())?;
                }
                Expression::Branch { .. } => return None,
            }
        }
    }

    /// Identity EQ predicate reachable through AND nodes, if any.
    ///
    /// Used to seed the identity of an upserted document.
    pub fn identity_for_upsert(&self) -> Option<DocumentId> {
        match self {
            Expression::Leaf(predicates) => predicates.iter().find_map(|p| {
                match (p.operator, &p.operand) {
                    (Operator::Eq, TypedValue::Id(id)) => Some(id.clone()),
                    _ => None,
                }
            }),
            Expression::Branch {
                operator: LogicalOperator::And,
                children,
            } => children.iter().find_map(Expression::identity_for_upsert),
            Expression::Branch { .. } => None,
        }
    }
}

impl Expression {
    /// Folds every identity EQ/IN predicate reachable through AND nodes into
    /// the first one, using `reconcile_identity`.
    ///
    /// Leaves and branches emptied by the fold are dropped. Predicates under
    /// an OR are left alone.
    pub(crate) fn reconcile_identity_predicates(&mut self) {
        let mut found = Vec::new();
        self.collect_and_identity(&mut found);
        if found.len() < 2 {
            return;
        }
        let mut found = found.into_iter();
        let Some(first) = found.next() else {
            return;
        };
        let merged = found.fold(first, |acc, next| reconcile_identity(&acc, &next));
        self.replace_and_identity(&mut Some(merged));
    }

    fn collect_and_identity(&self, out: &mut Vec<Predicate>) {
        match self {
            Expression::Leaf(predicates) => out.extend(
                predicates
                    .iter()
                    .filter(|p| p.is_identity_lookup())
                    .cloned(),
            ),
            Expression::Branch {
                operator: LogicalOperator::And,
                children,
            } => {
                for child in children {
                    child.collect_and_identity(out);
                }
            }
            Expression::Branch { .. } => {}
        }
    }

    /// Puts `merged` at the first identity EQ/IN position and drops the rest.
    /// Returns true when this node lost all of its content.
    fn replace_and_identity(&mut self, merged: &mut Option<Predicate>) -> bool {
        match self {
            Expression::Leaf(predicates) => {
                let before = predicates.len();
                let mut kept = Vec::with_capacity(before);
                for predicate in predicates.drain(..) {
                    if !predicate.is_identity_lookup() {
                        kept.push(predicate);
                    } else if let Some(merged) = merged.take() {
                        kept.push(merged);
                    }
                }
                *predicates = kept;
                before > 0 && predicates.is_empty()
            }
            Expression::Branch {
                operator: LogicalOperator::And,
                children,
            } => {
                let before = children.len();
                children.retain_mut(|child| !child.replace_and_identity(merged));
                before > 0 && children.is_empty()
            }
            Expression::Branch { .. } => false,
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Leaf(predicates) if predicates.is_empty() => write!(f, "TRUE"),
            Expression::Leaf(predicates) => {
                let parts: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Expression::Branch { children, .. } if children.is_empty() => write!(f, "TRUE"),
            Expression::Branch { operator, children } => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", operator.as_str())))
            }
        }
    }
}

/// Accumulates the predicates of one leaf.
///
/// Keeps at most one identity EQ/IN predicate: a second one is reconciled
/// into the first (see `reconcile_identity`). Identity `$ne`/`$nin` and
/// predicates on other fields are appended as they come.
#[derive(Debug, Default)]
pub(crate) struct LeafBuilder {
    predicates: Vec<Predicate>,
    identity_slot: Option<usize>,
}

impl LeafBuilder {
    pub(crate) fn push(&mut self, predicate: Predicate) {
        if predicate.is_identity_lookup() {
            if let Some(slot) = self.identity_slot {
                let merged = reconcile_identity(&self.predicates[slot], &predicate);
                self.predicates[slot] = merged;
                return;
            }
            self.identity_slot = Some(self.predicates.len());
        }
        self.predicates.push(predicate);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub(crate) fn build(self) -> Expression {
        Expression::Leaf(self.predicates)
    }
}

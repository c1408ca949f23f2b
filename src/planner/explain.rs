//! Explain output
//!
//! Deterministic rendering of a read plan (and the mutation parameters
//! wrapped around it) as text and as JSON.

use std::fmt;

use serde::Serialize;

use crate::command::CommandKind;
use crate::filter::lower;

use super::errors::PlannerError;
use super::plan::ReadPlan;

/// Mutation parameters shown by explain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationExplain {
    pub bulk_fast_path: bool,
    pub mutation_limit: usize,
    pub retry_limit: u32,
    pub upsert: bool,
    pub return_document: bool,
    pub return_updated_document: bool,
}

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainPlan {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub predicate_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_lookup: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_shape: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// `None` on an accepted plan means unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,
    pub skip: usize,
    pub single_response: bool,
    pub max_buffered_sort_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<MutationExplain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from a read plan
    pub fn from_plan(kind: CommandKind, plan: &ReadPlan) -> Self {
        let predicates = plan.expression.predicates();
        let conditions = predicates
            .iter()
            .map(|p| lower(p).map_or_else(|e| e.to_string(), |c| c.to_string()))
            .collect();

        Self {
            accepted: true,
            command: Some(kind.name().to_string()),
            filter: Some(plan.expression.to_string()),
            predicate_count: predicates.len(),
            conditions,
            key_lookup: plan
                .key_lookup()
                .map(|ids| ids.iter().map(|id| id.to_string()).collect()),
            read_shape: Some(plan.read_shape.as_str().to_string()),
            order_by: plan
                .order_by
                .iter()
                .flatten()
                .map(|f| format!("{} {}", f.path, if f.ascending { "ASC" } else { "DESC" }))
                .collect(),
            vector_dimensions: plan.vector.as_ref().map(Vec::len),
            page_size: Some(plan.page_size),
            row_limit: (!plan.is_unbounded()).then_some(plan.row_limit),
            skip: plan.skip,
            single_response: plan.single_response,
            max_buffered_sort_rows: plan.max_buffered_sort_rows,
            mutation: None,
            rejection_code: None,
            rejection_reason: None,
        }
    }

    /// Explain of a command with no read phase (bulk clear, inserts)
    pub fn without_read(kind: CommandKind) -> Self {
        Self {
            accepted: true,
            command: Some(kind.name().to_string()),
            ..Self::blank()
        }
    }

    /// Attaches mutation parameters
    pub fn with_mutation(mut self, mutation: MutationExplain) -> Self {
        self.mutation = Some(mutation);
        self
    }

    /// Creates an explain plan from a planning error
    pub fn from_error(err: &PlannerError) -> Self {
        Self::from_rejection(err.code().code(), err.message())
    }

    /// Creates an explain plan for any rejected command
    pub fn from_rejection(code: &str, reason: &str) -> Self {
        Self {
            rejection_code: Some(code.to_string()),
            rejection_reason: Some(reason.to_string()),
            ..Self::blank()
        }
    }

    fn blank() -> Self {
        Self {
            accepted: false,
            command: None,
            filter: None,
            predicate_count: 0,
            conditions: Vec::new(),
            key_lookup: None,
            read_shape: None,
            order_by: Vec::new(),
            vector_dimensions: None,
            page_size: None,
            row_limit: None,
            skip: 0,
            single_response: false,
            max_buffered_sort_rows: 0,
            mutation: None,
            rejection_code: None,
            rejection_reason: None,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(command) = &self.command {
            writeln!(f, "Command: {}", command)?;
        }
        if let Some(filter) = &self.filter {
            writeln!(f, "Filter: {} ({} predicates)", filter, self.predicate_count)?;
        }
        if !self.conditions.is_empty() {
            writeln!(f, "Conditions:")?;
            for condition in &self.conditions {
                writeln!(f, "  - {}", condition)?;
            }
        }
        if let Some(keys) = &self.key_lookup {
            writeln!(f, "Key Lookup: [{}]", keys.join(", "))?;
        }
        if let Some(shape) = &self.read_shape {
            writeln!(f, "Read Shape: {}", shape)?;
        }
        if !self.order_by.is_empty() {
            writeln!(f, "Order By: {}", self.order_by.join(", "))?;
        }
        if let Some(dimensions) = self.vector_dimensions {
            writeln!(f, "Vector: {} dimensions", dimensions)?;
        }
        if let Some(page_size) = self.page_size {
            writeln!(f, "Page Size: {}", page_size)?;
            match self.row_limit {
                Some(limit) => writeln!(f, "Row Limit: {}", limit)?,
                None => writeln!(f, "Row Limit: unbounded")?,
            }
            writeln!(f, "Skip: {}", self.skip)?;
            writeln!(f, "Single Response: {}", self.single_response)?;
        }
        if self.max_buffered_sort_rows > 0 {
            writeln!(f, "Sort Buffer: {} rows", self.max_buffered_sort_rows)?;
        }
        if let Some(m) = &self.mutation {
            if m.bulk_fast_path {
                writeln!(f, "Mutation: BULK_CLEAR")?;
            } else {
                writeln!(f, "Mutation: READ_THEN_CAS")?;
                writeln!(f, "  Mutation Limit: {}", m.mutation_limit)?;
                writeln!(f, "  Retry Limit: {}", m.retry_limit)?;
                writeln!(f, "  Upsert: {}", m.upsert)?;
                writeln!(f, "  Return Document: {}", m.return_document)?;
                writeln!(f, "  Return Updated: {}", m.return_updated_document)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::config::OperationsConfig;
    use crate::filter::FilterCompiler;
    use crate::planner::QueryPlanner;
    use crate::value::JsonIdentity;
    use serde_json::json;

    fn explain(kind: CommandKind, filter: serde_json::Value) -> ExplainPlan {
        let config = OperationsConfig::default();
        let expression = FilterCompiler::new(&JsonIdentity, 100)
            .compile(Some(&filter))
            .unwrap();
        let plan = QueryPlanner::new(&config)
            .plan(&Command::new(kind), expression)
            .unwrap();
        ExplainPlan::from_plan(kind, &plan)
    }

    #[test]
    fn test_explain_accepted_plan() {
        let explain = explain(CommandKind::Find, json!({"age": {"$gt": 3}}));

        assert!(explain.accepted);
        assert_eq!(explain.predicate_count, 1);
        assert_eq!(explain.conditions, vec!["query_dbl_values['age'] > 3"]);
        assert_eq!(explain.row_limit, None);

        let output = explain.to_string();
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains("Row Limit: unbounded"));
    }

    #[test]
    fn test_explain_key_lookup() {
        let explain = explain(CommandKind::DeleteOne, json!({"_id": "a"}));
        assert_eq!(explain.key_lookup, Some(vec!["\"a\"".to_string()]));
        assert_eq!(explain.read_shape.as_deref(), Some("KEY_ONLY"));
    }

    #[test]
    fn test_explain_rejected_plan() {
        let err = PlannerError::conflicting_sort("vector and field sort");
        let explain = ExplainPlan::from_error(&err);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("DOC_SORT_CONFLICTING"));
        assert!(explain.to_string().contains("REJECTED"));
    }

    #[test]
    fn test_explain_json() {
        let explain = explain(CommandKind::DeleteMany, json!({"a": 1})).with_mutation(
            MutationExplain {
                bulk_fast_path: false,
                mutation_limit: 20,
                retry_limit: 3,
                upsert: false,
                return_document: false,
                return_updated_document: false,
            },
        );
        let value = serde_json::to_value(&explain).unwrap();
        assert_eq!(value["row_limit"], 21);
        assert_eq!(value["mutation"]["mutation_limit"], 20);
        assert!(value.get("rejection_code").is_none());
    }

    #[test]
    fn test_explain_deterministic() {
        let a = explain(CommandKind::Find, json!({"b": 1, "a": 2})).to_string();
        let b = explain(CommandKind::Find, json!({"b": 1, "a": 2})).to_string();
        assert_eq!(a, b);
    }
}

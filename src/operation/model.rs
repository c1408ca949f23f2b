//! Resolved operations
//!
//! Every command routes through `Operation`. Each variant carries what its
//! execution strategy needs and nothing else.

use serde_json::Value;

use crate::command::CommandKind;
use crate::planner::{ExplainPlan, MutationExplain, ReadPlan};

/// A resolved, executable command
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Find(ReadOperation),
    Count(ReadOperation),
    Delete(MutatingOperation),
    Update(MutatingOperation),
    Insert(InsertOperation),
}

impl Operation {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Find(_) => "find",
            Self::Count(_) => "count",
            Self::Delete(_) => "delete",
            Self::Update(_) => "update",
            Self::Insert(_) => "insert",
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Find(op) | Self::Count(op) => op.kind,
            Self::Delete(op) | Self::Update(op) => op.kind,
            Self::Insert(op) => op.kind,
        }
    }

    /// Read plan of the operation, if it reads
    pub fn read_plan(&self) -> Option<&ReadPlan> {
        match self {
            Self::Find(op) | Self::Count(op) => Some(&op.plan),
            Self::Delete(op) | Self::Update(op) => Some(&op.read_plan),
            Self::Insert(_) => None,
        }
    }

    pub fn explain(&self) -> ExplainPlan {
        match self {
            Self::Find(op) | Self::Count(op) => ExplainPlan::from_plan(op.kind, &op.plan),
            Self::Delete(op) | Self::Update(op) => op.explain(),
            Self::Insert(op) => ExplainPlan::without_read(op.kind),
        }
    }
}

/// Find or count: a read plan and nothing else
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOperation {
    pub kind: CommandKind,
    pub plan: ReadPlan,
}

/// What a mutating operation does to each selected row
#[derive(Debug, Clone, PartialEq)]
pub enum MutationPayload {
    Delete,
    /// Update clause, applied by the caller's mutator
    Update(Value),
    /// Replacement document
    Replace(Value),
}

impl MutationPayload {
    pub fn is_delete(&self) -> bool {
        matches!(self, MutationPayload::Delete)
    }
}

/// Read plan wrapped with mutation parameters.
///
/// When `bulk_fast_path` is set the read plan, `mutation_limit` and
/// `retry_limit` are not used: execution is one unconditional clear.
#[derive(Debug, Clone, PartialEq)]
pub struct MutatingOperation {
    pub kind: CommandKind,
    pub read_plan: ReadPlan,
    pub payload: MutationPayload,
    pub mutation_limit: usize,
    /// Retries per row after the first conflicting attempt
    pub retry_limit: u32,
    pub upsert: bool,
    pub return_document_in_response: bool,
    /// `false` returns the snapshot taken at read time
    pub return_updated_document: bool,
    pub bulk_fast_path: bool,
}

impl MutatingOperation {
    pub fn explain(&self) -> ExplainPlan {
        let mutation = MutationExplain {
            bulk_fast_path: self.bulk_fast_path,
            mutation_limit: self.mutation_limit,
            retry_limit: self.retry_limit,
            upsert: self.upsert,
            return_document: self.return_document_in_response,
            return_updated_document: self.return_updated_document,
        };
        let explain = if self.bulk_fast_path {
            ExplainPlan::without_read(self.kind)
        } else {
            ExplainPlan::from_plan(self.kind, &self.read_plan)
        };
        explain.with_mutation(mutation)
    }
}

/// insertOne / insertMany
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOperation {
    pub kind: CommandKind,
    pub documents: Vec<Value>,
    /// Stop at the first failed document
    pub ordered: bool,
}

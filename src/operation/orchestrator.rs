//! Mutation orchestrator
//!
//! Wraps a read plan with the parameters of one of two execution strategies:
//!
//! - Bulk clear: many-document delete with no predicate. No read, one
//!   unconditional truncate.
//! - Read then compare-and-set: everything else. Up to `mutation_limit`
//!   rows are read and each is written conditioned on its read-time state,
//!   retried up to `retry_limit` times on conflict.

use crate::command::{Command, CommandKind, ReturnDocument};
use crate::config::OperationsConfig;
use crate::planner::{PlannerError, ReadPlan};

use super::errors::ResolveResult;
use super::model::{MutatingOperation, MutationPayload};

pub struct MutationOrchestrator<'a> {
    config: &'a OperationsConfig,
}

impl<'a> MutationOrchestrator<'a> {
    pub fn new(config: &'a OperationsConfig) -> Self {
        Self { config }
    }

    /// Wraps the read plan of a delete, update or replace command.
    pub fn wrap(&self, command: &Command, read_plan: ReadPlan) -> ResolveResult<MutatingOperation> {
        let kind = command.kind;
        let payload = payload(command)?;

        let bulk_fast_path =
            kind == CommandKind::DeleteMany && read_plan.expression.total_predicate_count() == 0;

        let mutation_limit = match kind {
            _ if kind.is_single() => 1,
            CommandKind::DeleteMany => self.config.max_document_delete_count,
            CommandKind::UpdateMany => self.config.max_document_update_count,
            _ => {
                return Err(PlannerError::invalid_command(format!("{} does not mutate", kind)).into())
            }
        };

        let return_document_in_response = kind.returns_document();
        let return_updated_document = return_document_in_response
            && kind != CommandKind::FindOneAndDelete
            && command.options.return_document == ReturnDocument::After;

        Ok(MutatingOperation {
            kind,
            read_plan,
            payload,
            mutation_limit,
            retry_limit: self.config.lwt_retries,
            upsert: command.options.upsert && kind.is_update(),
            return_document_in_response,
            return_updated_document,
            bulk_fast_path,
        })
    }
}

fn payload(command: &Command) -> ResolveResult<MutationPayload> {
    let kind = command.kind;
    if kind.is_delete() {
        return Ok(MutationPayload::Delete);
    }
    let missing = |field: &str| PlannerError::invalid_command(format!("{} requires '{}'", kind, field));
    match kind {
        CommandKind::FindOneAndReplace => command
            .replacement
            .clone()
            .map(MutationPayload::Replace)
            .ok_or_else(|| missing("replacement").into()),
        _ if kind.is_update() => command
            .update
            .clone()
            .map(MutationPayload::Update)
            .ok_or_else(|| missing("update").into()),
        _ => Err(PlannerError::invalid_command(format!("{} does not mutate", kind)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOptions;
    use crate::filter::{Expression, FilterCompiler};
    use crate::planner::QueryPlanner;
    use crate::value::JsonIdentity;
    use serde_json::json;

    fn wrap(command: Command) -> MutatingOperation {
        let config = OperationsConfig::default();
        let expression = FilterCompiler::new(&JsonIdentity, 100)
            .compile(command.filter.as_ref())
            .unwrap();
        let plan = QueryPlanner::new(&config).plan(&command, expression).unwrap();
        MutationOrchestrator::new(&config).wrap(&command, plan).unwrap()
    }

    #[test]
    fn test_unfiltered_delete_many_takes_fast_path() {
        let op = wrap(Command::new(CommandKind::DeleteMany));
        assert!(op.bulk_fast_path);
        assert!(op.payload.is_delete());
    }

    #[test]
    fn test_filtered_delete_many_reads_one_extra_row() {
        let op = wrap(Command::new(CommandKind::DeleteMany).with_filter(json!({"a": 1})));
        assert!(!op.bulk_fast_path);
        assert_eq!(op.mutation_limit, 20);
        assert_eq!(op.read_plan.row_limit, op.mutation_limit + 1);
    }

    #[test]
    fn test_empty_and_is_unfiltered() {
        let op = wrap(Command::new(CommandKind::DeleteMany).with_filter(json!({"$and": []})));
        assert!(op.bulk_fast_path);
    }

    #[test]
    fn test_single_delete_never_takes_fast_path() {
        let op = wrap(Command::new(CommandKind::DeleteOne));
        assert!(!op.bulk_fast_path);
        assert_eq!(op.mutation_limit, 1);
    }

    #[test]
    fn test_update_parameters() {
        let command = Command::new(CommandKind::FindOneAndUpdate)
            .with_update(json!({"$set": {"a": 1}}))
            .with_options(CommandOptions {
                upsert: true,
                return_document: ReturnDocument::After,
                ..Default::default()
            });
        let op = wrap(command);
        assert_eq!(op.retry_limit, 3);
        assert!(op.upsert);
        assert!(op.return_document_in_response);
        assert!(op.return_updated_document);
    }

    #[test]
    fn test_update_many_limit() {
        let op = wrap(Command::new(CommandKind::UpdateMany).with_update(json!({"$set": {}})));
        assert_eq!(op.mutation_limit, 20);
        assert!(!op.return_document_in_response);
    }

    #[test]
    fn test_missing_update_is_rejected() {
        let config = OperationsConfig::default();
        let command = Command::new(CommandKind::UpdateOne);
        let plan = QueryPlanner::new(&config)
            .plan(&command, Expression::empty())
            .unwrap();
        let err = MutationOrchestrator::new(&config)
            .wrap(&command, plan)
            .unwrap_err();
        assert_eq!(err.code(), "DOC_COMMAND_INVALID");
    }
}

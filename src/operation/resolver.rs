//! Command resolver
//!
//! Command → compiled expression → read plan → operation. Resolution is
//! synchronous and pure apart from logging and counters; any failure rejects
//! the whole command before a row is touched.

use std::sync::Arc;

use crate::command::{Command, CommandKind};
use crate::config::OperationsConfig;
use crate::filter::FilterCompiler;
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::planner::{ExplainPlan, PlannerError, QueryPlanner};
use crate::value::IdentityCoercer;

use super::errors::{ResolveError, ResolveResult};
use super::model::{InsertOperation, Operation, ReadOperation};
use super::orchestrator::MutationOrchestrator;

pub struct CommandResolver<'a> {
    config: &'a OperationsConfig,
    identity: &'a dyn IdentityCoercer,
    metrics: Arc<MetricsRegistry>,
}

impl<'a> CommandResolver<'a> {
    pub fn new(
        config: &'a OperationsConfig,
        identity: &'a dyn IdentityCoercer,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            config,
            identity,
            metrics,
        }
    }

    /// Resolves a command into an executable operation.
    pub fn resolve(&self, command: &Command) -> ResolveResult<Operation> {
        match self.build(command) {
            Ok(operation) => {
                self.metrics.increment_commands_planned();
                let (shape, row_limit) = match operation.read_plan() {
                    Some(plan) if !plan.is_unbounded() => {
                        (plan.read_shape.as_str(), plan.row_limit.to_string())
                    }
                    Some(plan) => (plan.read_shape.as_str(), "unbounded".to_string()),
                    None => ("NONE", "0".to_string()),
                };
                log_event(
                    Event::CommandPlanned,
                    &[
                        ("command", command.kind.name()),
                        ("operation", operation.name()),
                        ("read_shape", shape),
                        ("row_limit", row_limit.as_str()),
                    ],
                );
                Ok(operation)
            }
            Err(err) => {
                self.reject(command.kind.name(), &err);
                Err(err)
            }
        }
    }

    /// Parses a JSON request and resolves it
    pub fn resolve_request(&self, json: &str) -> ResolveResult<Operation> {
        let command = Command::parse(json).map_err(|e| {
            let err = ResolveError::from(e);
            self.reject("unknown", &err);
            err
        })?;
        self.resolve(&command)
    }

    /// Explain of a command; rejections are rendered, not returned
    pub fn explain(&self, command: &Command) -> ExplainPlan {
        match self.resolve(command) {
            Ok(operation) => operation.explain(),
            Err(err) => ExplainPlan::from_rejection(err.code(), err.message()),
        }
    }

    /// Explain of a JSON request
    pub fn explain_request(&self, json: &str) -> ExplainPlan {
        match self.resolve_request(json) {
            Ok(operation) => operation.explain(),
            Err(err) => ExplainPlan::from_rejection(err.code(), err.message()),
        }
    }

    fn build(&self, command: &Command) -> ResolveResult<Operation> {
        let kind = command.kind;
        if kind.is_insert() {
            return self.build_insert(command);
        }

        let expression = FilterCompiler::new(self.identity, self.config.max_in_operator_value_size)
            .compile(command.filter.as_ref())?;
        let plan = QueryPlanner::new(self.config).plan(command, expression)?;

        let operation = match kind {
            CommandKind::Find | CommandKind::FindOne => {
                Operation::Find(ReadOperation { kind, plan })
            }
            CommandKind::CountDocuments => Operation::Count(ReadOperation { kind, plan }),
            _ if kind.is_delete() => {
                Operation::Delete(MutationOrchestrator::new(self.config).wrap(command, plan)?)
            }
            _ => Operation::Update(MutationOrchestrator::new(self.config).wrap(command, plan)?),
        };
        Ok(operation)
    }

    fn build_insert(&self, command: &Command) -> ResolveResult<Operation> {
        let kind = command.kind;
        let expected_one = kind == CommandKind::InsertOne;
        if command.documents.is_empty() || (expected_one && command.documents.len() != 1) {
            return Err(PlannerError::invalid_command(format!(
                "{} requires {}",
                kind,
                if expected_one {
                    "exactly one document"
                } else {
                    "at least one document"
                }
            ))
            .into());
        }
        Ok(Operation::Insert(InsertOperation {
            kind,
            documents: command.documents.clone(),
            ordered: command.options.ordered,
        }))
    }

    fn reject(&self, command: &str, err: &ResolveError) {
        self.metrics.increment_commands_rejected();
        log_event(
            Event::CommandRejected,
            &[
                ("command", command),
                ("code", err.code()),
                ("reason", err.message()),
            ],
        );
    }
}

//! Read-then-CAS mutation engine
//!
//! Per row:
//!
//! ```text
//! READ → CAS ─ applied ──────────────────────────→ SUCCEEDED
//!          └─ conflict ─ retries left ─ fresh READ ─ still matches → CAS
//!                      │                          └─ gone/no match → SKIPPED (delete)
//!                      │                                             FAILED  (update)
//!                      └─ exhausted ─────────────────────────────→ FAILED
//! ```
//!
//! Rows are independent and run concurrently up to the configured bound.
//! A row's own sequence is strictly ordered. Once cancelled, no new row
//! starts; started rows run to a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::filter::ExpressionMatcher;
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::operation::{MutatingOperation, MutationPayload};
use crate::planner::ReadPlan;
use crate::value::{DocumentId, IdentityCoercer};

use super::errors::{ExecutorError, ExecutorResult};
use super::mutator::DocumentMutator;
use super::result::{MutationResult, RowFailure, RowOutcome, RowStatus};
use super::store::{CasOutcome, InsertOutcome, Row, RowStore};

/// Cloneable cancellation signal shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes mutating operations against a row store.
pub struct MutationExecutor<'a> {
    store: &'a dyn RowStore,
    identity: &'a dyn IdentityCoercer,
    metrics: &'a MetricsRegistry,
    concurrency: usize,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(
        store: &'a dyn RowStore,
        identity: &'a dyn IdentityCoercer,
        metrics: &'a MetricsRegistry,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            identity,
            metrics,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs one mutating operation.
    ///
    /// Store failures abort the operation; per-row conflicts and mutator
    /// failures are reported in the outcomes.
    pub async fn execute(
        &self,
        op: &MutatingOperation,
        mutator: &dyn DocumentMutator,
        cancel: &CancellationFlag,
    ) -> ExecutorResult<MutationResult> {
        if op.bulk_fast_path {
            return self.bulk_clear(op).await;
        }

        let mut rows = self.read_candidates(&op.read_plan).await?;
        let more_data = rows.len() > op.mutation_limit;
        rows.truncate(op.mutation_limit);

        if rows.is_empty() {
            if op.upsert {
                return self.upsert(op, mutator).await;
            }
            return Ok(MutationResult {
                modified_count: Some(0),
                ..Default::default()
            });
        }

        let matched_count = rows.len();
        let results: Vec<ExecutorResult<Option<(usize, RowOutcome)>>> =
            stream::iter(rows.into_iter().enumerate())
                .map(|(index, row)| async move {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    self.mutate_row(op, mutator, row)
                        .await
                        .map(|outcome| Some((index, outcome)))
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut started = Vec::with_capacity(matched_count);
        for result in results {
            if let Some(entry) = result? {
                started.push(entry);
            }
        }
        started.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<RowOutcome> = started.into_iter().map(|(_, o)| o).collect();

        let cancelled = outcomes.len() < matched_count;
        if cancelled {
            let not_started = (matched_count - outcomes.len()).to_string();
            log_event(
                Event::OperationCancelled,
                &[("command", op.kind.name()), ("rows_not_started", &not_started)],
            );
        }

        let modified = outcomes.iter().filter(|o| o.succeeded()).count();
        let document = if op.return_document_in_response {
            outcomes.iter().find(|o| o.succeeded()).and_then(|o| {
                if op.return_updated_document {
                    o.after.clone()
                } else {
                    o.before.clone()
                }
            })
        } else {
            None
        };

        let (matched_str, modified_str) = (matched_count.to_string(), modified.to_string());
        log_event(
            Event::MutationComplete,
            &[
                ("command", op.kind.name()),
                ("matched", matched_str.as_str()),
                ("modified", modified_str.as_str()),
                ("more_data", if more_data { "true" } else { "false" }),
            ],
        );

        Ok(MutationResult {
            outcomes,
            matched_count,
            modified_count: Some(modified),
            more_data,
            upserted_id: None,
            document,
            cancelled,
        })
    }

    /// Pages through the read plan until it is exhausted.
    async fn read_candidates(&self, plan: &ReadPlan) -> ExecutorResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut paging = None;
        loop {
            let page = self.store.read(plan, paging.as_ref()).await?;
            self.metrics.add_rows_read(page.rows.len() as u64);
            rows.extend(page.rows);
            match page.next {
                Some(next) if rows.len() < plan.row_limit => paging = Some(next),
                _ => break,
            }
        }
        rows.truncate(plan.row_limit);
        Ok(rows)
    }

    async fn mutate_row(
        &self,
        op: &MutatingOperation,
        mutator: &dyn DocumentMutator,
        mut row: Row,
    ) -> ExecutorResult<RowOutcome> {
        let matcher = ExpressionMatcher::new(self.identity);
        let mut retries = 0u32;

        loop {
            let (outcome, after) = match &op.payload {
                MutationPayload::Delete => (self.store.compare_and_delete(&row).await?, None),
                MutationPayload::Update(_) | MutationPayload::Replace(_) => {
                    let current = row.document.as_ref().ok_or_else(|| {
                        ExecutorError::Mutation(format!("Row {} was read without its document", row.id))
                    })?;
                    let document = match mutator.apply(current) {
                        Ok(document) => document,
                        Err(e) => {
                            self.metrics.increment_rows_failed();
                            return Ok(self.outcome(row, RowStatus::Failed(RowFailure::Mutation(e.0)), retries));
                        }
                    };
                    let outcome = self.store.compare_and_set(&row, document.clone()).await?;
                    (outcome, Some(document))
                }
            };

            if outcome == CasOutcome::Applied {
                self.metrics.increment_rows_mutated();
                return Ok(RowOutcome {
                    id: row.id,
                    status: RowStatus::Succeeded,
                    retries,
                    before: row.document,
                    after,
                });
            }

            self.metrics.increment_cas_conflicts();
            let id = row.id.to_string();
            let attempt = (retries + 1).to_string();
            log_event(Event::CasConflict, &[("id", id.as_str()), ("attempt", attempt.as_str())]);

            if retries >= op.retry_limit {
                self.metrics.increment_rows_failed();
                log_event(
                    Event::CasRetriesExhausted,
                    &[("id", id.as_str()), ("retries", retries.to_string().as_str())],
                );
                return Ok(self.outcome(row, RowStatus::Failed(RowFailure::WriteConflict), retries));
            }
            retries += 1;
            self.metrics.increment_cas_retries();

            match self.store.read_row(&row.id).await? {
                Some(fresh)
                    if fresh
                        .document
                        .as_ref()
                        .map_or(false, |d| matcher.matches(d, &op.read_plan.expression)) =>
                {
                    row = fresh;
                }
                _ => {
                    log_event(Event::RowVanished, &[("id", id.as_str())]);
                    let status = if op.payload.is_delete() {
                        self.metrics.increment_rows_skipped();
                        RowStatus::Skipped
                    } else {
                        self.metrics.increment_rows_failed();
                        RowStatus::Failed(RowFailure::NotFoundForUpdate)
                    };
                    return Ok(self.outcome(row, status, retries));
                }
            }
        }
    }

    fn outcome(&self, row: Row, status: RowStatus, retries: u32) -> RowOutcome {
        RowOutcome {
            id: row.id,
            status,
            retries,
            before: None,
            after: None,
        }
    }

    /// Writes a new document when nothing matched.
    ///
    /// The identity comes from the filter's identity EQ, else from the
    /// mutator's output, else a fresh uuid placed first.
    async fn upsert(
        &self,
        op: &MutatingOperation,
        mutator: &dyn DocumentMutator,
    ) -> ExecutorResult<MutationResult> {
        let filter_id = op.read_plan.expression.identity_for_upsert();
        let field = self.identity.field_name();

        let mut seed = Map::new();
        if let Some(id) = &filter_id {
            seed.insert(field.to_string(), id.to_json());
        }
        let mut document = mutator
            .apply(&Value::Object(seed))
            .map_err(|e| ExecutorError::Mutation(e.0))?;
        let Some(map) = document.as_object_mut() else {
            return Err(ExecutorError::Mutation(
                "Upserted document must be an object".into(),
            ));
        };

        let id = match (filter_id, map.get(field).cloned()) {
            (Some(id), Some(raw)) => {
                if self.identity.coerce(&raw).ok().as_ref() != Some(&id) {
                    return Err(ExecutorError::Mutation(format!(
                        "Upserted document may not change {} from {} to {}",
                        field, id, raw
                    )));
                }
                id
            }
            (Some(id), None) => {
                map.insert(field.to_string(), id.to_json());
                id
            }
            (None, Some(raw)) => self
                .identity
                .coerce(&raw)
                .map_err(|e| ExecutorError::Mutation(e.to_string()))?,
            (None, None) => {
                let id = DocumentId::String(Uuid::new_v4().to_string());
                let mut with_id = Map::with_capacity(map.len() + 1);
                with_id.insert(field.to_string(), id.to_json());
                with_id.extend(std::mem::take(map));
                *map = with_id;
                id
            }
        };

        let id_str = id.to_string();
        match self.store.insert_if_absent(&id, document.clone()).await? {
            InsertOutcome::Inserted => {
                self.metrics.increment_upserts();
                log_event(
                    Event::UpsertInsert,
                    &[("command", op.kind.name()), ("id", id_str.as_str())],
                );
                let returned = (op.return_document_in_response && op.return_updated_document)
                    .then_some(document);
                Ok(MutationResult {
                    modified_count: Some(0),
                    upserted_id: Some(id),
                    document: returned,
                    ..Default::default()
                })
            }
            InsertOutcome::Duplicate => {
                log_event(
                    Event::DuplicateDocument,
                    &[("command", op.kind.name()), ("id", id_str.as_str())],
                );
                Err(ExecutorError::DuplicateDocument(id))
            }
        }
    }

    async fn bulk_clear(&self, op: &MutatingOperation) -> ExecutorResult<MutationResult> {
        self.store.truncate().await?;
        self.metrics.increment_bulk_clears();
        log_event(Event::BulkClear, &[("command", op.kind.name())]);
        Ok(MutationResult {
            modified_count: None,
            ..Default::default()
        })
    }
}

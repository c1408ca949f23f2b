//! Operation executor
//!
//! Runs a resolved operation against a row store:
//!
//! 1. Find: one page of documents, plus the continuation
//! 2. Count: bounded count with a `more_data` flag
//! 3. Delete / Update: bulk clear or read-then-CAS (see `mutation`)
//! 4. Insert: insert-if-absent per document, ordered or concurrent

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::OperationsConfig;
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::operation::{InsertOperation, MutatingOperation, MutationPayload, Operation, ReadOperation};
use crate::value::{DocumentId, IdentityCoercer};

use super::errors::{ExecutorError, ExecutorResult};
use super::mutation::{CancellationFlag, MutationExecutor};
use super::mutator::{DocumentMutator, MutationError, Replacement};
use super::result::{FindResult, InsertFailure, InsertResult, MutationResult};
use super::store::{CountResult, InsertOutcome, PagingState, RowStore};

/// Output of any operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Find(FindResult),
    Count(CountResult),
    Mutation(MutationResult),
    Insert(InsertResult),
}

/// Leaves a document as it is; the mutator of deletes
struct Unchanged;

impl DocumentMutator for Unchanged {
    fn apply(&self, current: &Value) -> Result<Value, MutationError> {
        Ok(current.clone())
    }
}

/// Executes resolved operations.
pub struct OperationExecutor<'a> {
    store: &'a dyn RowStore,
    identity: &'a dyn IdentityCoercer,
    config: &'a OperationsConfig,
    metrics: Arc<MetricsRegistry>,
}

impl<'a> OperationExecutor<'a> {
    pub fn new(
        store: &'a dyn RowStore,
        identity: &'a dyn IdentityCoercer,
        config: &'a OperationsConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            identity,
            config,
            metrics,
        }
    }

    /// Executes any operation. `updater` applies update clauses and is
    /// required for update commands only.
    pub async fn execute(
        &self,
        operation: &Operation,
        updater: Option<&dyn DocumentMutator>,
        cancel: &CancellationFlag,
    ) -> ExecutorResult<OperationOutput> {
        match operation {
            Operation::Find(op) => self.find(op, None).await.map(OperationOutput::Find),
            Operation::Count(op) => self.count(op).await.map(OperationOutput::Count),
            Operation::Delete(op) | Operation::Update(op) => self
                .mutate(op, updater, cancel)
                .await
                .map(OperationOutput::Mutation),
            Operation::Insert(op) => self.insert(op).await.map(OperationOutput::Insert),
        }
    }

    /// Reads one page of documents.
    pub async fn find(
        &self,
        op: &ReadOperation,
        paging: Option<&PagingState>,
    ) -> ExecutorResult<FindResult> {
        let page = self.store.read(&op.plan, paging).await?;
        self.metrics.add_rows_read(page.rows.len() as u64);

        let mut documents: Vec<Value> = page.rows.into_iter().filter_map(|r| r.document).collect();
        if op.plan.single_response {
            documents.truncate(1);
            return Ok(FindResult {
                documents,
                next_page: None,
            });
        }
        Ok(FindResult {
            documents,
            next_page: page.next,
        })
    }

    pub async fn count(&self, op: &ReadOperation) -> ExecutorResult<CountResult> {
        let result = self.store.count(&op.plan).await?;
        self.metrics.add_rows_read(result.count as u64);
        Ok(result)
    }

    /// Runs a delete, update or replace.
    pub async fn mutate(
        &self,
        op: &MutatingOperation,
        updater: Option<&dyn DocumentMutator>,
        cancel: &CancellationFlag,
    ) -> ExecutorResult<MutationResult> {
        let replacement;
        let mutator: &dyn DocumentMutator = match (&op.payload, updater) {
            (MutationPayload::Delete, _) => &Unchanged,
            (MutationPayload::Replace(document), _) => {
                replacement = Replacement::new(document.clone());
                &replacement
            }
            (MutationPayload::Update(_), Some(updater)) => updater,
            (MutationPayload::Update(_), None) => {
                return Err(ExecutorError::Mutation(format!(
                    "{} requires an update mutator",
                    op.kind
                )))
            }
        };

        MutationExecutor::new(
            self.store,
            self.identity,
            &self.metrics,
            self.config.max_concurrent_row_mutations,
        )
        .execute(op, mutator, cancel)
        .await
    }

    /// Writes each document unless its identity already exists.
    ///
    /// Documents without an identity get a uuid string. Ordered inserts stop
    /// at the first failure; unordered inserts attempt every document.
    pub async fn insert(&self, op: &InsertOperation) -> ExecutorResult<InsertResult> {
        let max = self.config.max_document_insert_count;
        if op.documents.len() > max {
            return Err(ExecutorError::TooManyDocuments {
                count: op.documents.len(),
                max,
            });
        }

        let mut attempts: Vec<(usize, Result<DocumentId, InsertFailure>)> = Vec::new();
        if op.ordered {
            for (index, document) in op.documents.iter().enumerate() {
                let attempt = self.insert_one(index, document).await?;
                let failed = attempt.is_err();
                attempts.push((index, attempt));
                if failed {
                    break;
                }
            }
        } else {
            let results: Vec<ExecutorResult<(usize, Result<DocumentId, InsertFailure>)>> =
                stream::iter(op.documents.iter().enumerate())
                    .map(|(index, document)| async move {
                        self.insert_one(index, document)
                            .await
                            .map(|attempt| (index, attempt))
                    })
                    .buffer_unordered(self.config.max_concurrent_row_mutations.max(1))
                    .collect()
                    .await;
            for result in results {
                attempts.push(result?);
            }
            attempts.sort_by_key(|(index, _)| *index);
        }

        let mut result = InsertResult::default();
        for (_, attempt) in attempts {
            match attempt {
                Ok(id) => result.inserted_ids.push(id),
                Err(failure) => result.failures.push(failure),
            }
        }

        self.metrics.add_inserts(result.inserted_ids.len() as u64);
        let (inserted, failed) = (
            result.inserted_ids.len().to_string(),
            result.failures.len().to_string(),
        );
        log_event(
            Event::InsertComplete,
            &[
                ("command", op.kind.name()),
                ("inserted", inserted.as_str()),
                ("failed", failed.as_str()),
            ],
        );
        Ok(result)
    }

    async fn insert_one(
        &self,
        index: usize,
        document: &Value,
    ) -> ExecutorResult<Result<DocumentId, InsertFailure>> {
        let (id, document) = match self.with_identity(document) {
            Ok(prepared) => prepared,
            Err(message) => {
                return Ok(Err(InsertFailure {
                    index,
                    id: None,
                    code: "DOC_INVALID_DOCUMENT_ID",
                    message,
                }))
            }
        };

        match self.store.insert_if_absent(&id, document).await? {
            InsertOutcome::Inserted => Ok(Ok(id)),
            InsertOutcome::Duplicate => {
                let id_str = id.to_string();
                log_event(Event::DuplicateDocument, &[("id", id_str.as_str())]);
                let err = ExecutorError::DuplicateDocument(id.clone());
                Ok(Err(InsertFailure {
                    index,
                    id: Some(id),
                    code: err.code(),
                    message: err.to_string(),
                }))
            }
        }
    }

    /// Coerces the document's identity, generating one when absent.
    fn with_identity(&self, document: &Value) -> Result<(DocumentId, Value), String> {
        let field = self.identity.field_name();
        let Value::Object(map) = document else {
            return Err("Document must be an object".to_string());
        };

        match map.get(field) {
            Some(raw) => {
                let id = self.identity.coerce(raw).map_err(|e| e.to_string())?;
                Ok((id, document.clone()))
            }
            None => {
                let id = DocumentId::String(Uuid::new_v4().to_string());
                let mut with_id = Map::with_capacity(map.len() + 1);
                with_id.insert(field.to_string(), id.to_json());
                with_id.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok((id, Value::Object(with_id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandKind, CommandOptions};
    use crate::executor::MemoryRowStore;
    use crate::operation::CommandResolver;
    use crate::value::JsonIdentity;
    use serde_json::json;

    fn resolve(config: &OperationsConfig, command: Command) -> Operation {
        CommandResolver::new(config, &JsonIdentity, Arc::new(MetricsRegistry::new()))
            .resolve(&command)
            .unwrap()
    }

    fn seeded(n: i64) -> MemoryRowStore {
        let store = MemoryRowStore::new();
        for i in 0..n {
            store.put(json!({"_id": i, "n": i})).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_one_returns_single_document() {
        let config = OperationsConfig::default();
        let store = seeded(3);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let op = resolve(
            &config,
            Command::new(CommandKind::FindOne).with_filter(json!({"n": {"$gte": 1}})),
        );

        let output = executor
            .execute(&op, None, &CancellationFlag::new())
            .await
            .unwrap();
        match output {
            OperationOutput::Find(found) => {
                assert_eq!(found.documents, vec![json!({"_id": 1, "n": 1})]);
                assert!(found.next_page.is_none());
            }
            other => panic!("expected find output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_count() {
        let config = OperationsConfig::default();
        let store = seeded(4);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let Operation::Count(op) = resolve(&config, Command::new(CommandKind::CountDocuments)) else {
            panic!("expected count");
        };
        let count = executor.count(&op).await.unwrap();
        assert_eq!(count.count, 4);
        assert!(!count.more_data);
    }

    #[tokio::test]
    async fn test_update_requires_mutator() {
        let config = OperationsConfig::default();
        let store = seeded(1);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let op = resolve(
            &config,
            Command::new(CommandKind::UpdateOne).with_update(json!({"$set": {"n": 5}})),
        );
        let err = executor
            .execute(&op, None, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DOC_MUTATION_FAILED");
    }

    #[tokio::test]
    async fn test_replace_uses_replacement() {
        let config = OperationsConfig::default();
        let store = seeded(1);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let op = resolve(
            &config,
            Command::new(CommandKind::FindOneAndReplace)
                .with_filter(json!({"_id": 0}))
                .with_replacement(json!({"name": "zero"})),
        );
        let output = executor
            .execute(&op, None, &CancellationFlag::new())
            .await
            .unwrap();
        let OperationOutput::Mutation(result) = output else {
            panic!("expected mutation output");
        };
        assert_eq!(result.modified_count, Some(1));
        // returnDocument defaults to the pre-mutation snapshot
        assert_eq!(result.document, Some(json!({"_id": 0, "n": 0})));
        assert_eq!(
            store.get(&DocumentId::Number(0.into())),
            Some(json!({"_id": 0, "name": "zero"}))
        );
    }

    #[tokio::test]
    async fn test_insert_generates_identity() {
        let config = OperationsConfig::default();
        let store = MemoryRowStore::new();
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let op = resolve(
            &config,
            Command::new(CommandKind::InsertOne).with_documents(vec![json!({"a": 1})]),
        );
        let Operation::Insert(op) = op else {
            panic!("expected insert");
        };
        let result = executor.insert(&op).await.unwrap();
        assert_eq!(result.inserted_ids.len(), 1);
        let stored = store.get(&result.inserted_ids[0]).unwrap();
        assert_eq!(stored["a"], 1);
        assert!(stored["_id"].is_string());
    }

    #[tokio::test]
    async fn test_ordered_insert_stops_at_duplicate() {
        let config = OperationsConfig::default();
        let store = seeded(1);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let documents = vec![json!({"_id": 5}), json!({"_id": 0}), json!({"_id": 6})];

        let ordered = InsertOperation {
            kind: CommandKind::InsertMany,
            documents: documents.clone(),
            ordered: true,
        };
        let result = executor.insert(&ordered).await.unwrap();
        assert_eq!(result.inserted_ids, vec![DocumentId::Number(5.into())]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(result.failures[0].code, "DOC_DUPLICATE_DOCUMENT");

        let unordered = InsertOperation {
            kind: CommandKind::InsertMany,
            documents: vec![json!({"_id": 7}), json!({"_id": 0}), json!({"_id": 8})],
            ordered: false,
        };
        let result = executor.insert(&unordered).await.unwrap();
        assert_eq!(
            result.inserted_ids,
            vec![DocumentId::Number(7.into()), DocumentId::Number(8.into())]
        );
        assert_eq!(result.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_many_above_max() {
        let config = OperationsConfig {
            max_document_insert_count: 2,
            ..Default::default()
        };
        let store = MemoryRowStore::new();
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let op = InsertOperation {
            kind: CommandKind::InsertMany,
            documents: vec![json!({}), json!({}), json!({})],
            ordered: false,
        };
        let err = executor.insert(&op).await.unwrap_err();
        assert_eq!(err, ExecutorError::TooManyDocuments { count: 3, max: 2 });
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_find_pages() {
        let config = OperationsConfig::default();
        let store = seeded(25);
        let executor =
            OperationExecutor::new(&store, &JsonIdentity, &config, Arc::new(MetricsRegistry::new()));
        let Operation::Find(op) = resolve(
            &config,
            Command::new(CommandKind::Find).with_options(CommandOptions::default()),
        ) else {
            panic!("expected find");
        };
        let first = executor.find(&op, None).await.unwrap();
        assert_eq!(first.documents.len(), 20);
        let second = executor.find(&op, first.next_page.as_ref()).await.unwrap();
        assert_eq!(second.documents.len(), 5);
        assert!(second.next_page.is_none());
    }
}

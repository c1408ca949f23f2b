//! In-memory row store
//!
//! Reference `RowStore` holding rows in key order. Every write assigns a new
//! `tx_id`, so compare-and-set behaves like a lightweight transaction on the
//! row version. Test hooks inject conflicts, vanishing rows and outages.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use futures_util::future;
use serde_json::Value;
use uuid::Uuid;

use crate::filter::ExpressionMatcher;
use crate::planner::{ReadPlan, ReadShape};
use crate::value::{DocumentId, IdentityCoercer, JsonIdentity};

use super::errors::{ExecutorError, ExecutorResult};
use super::sorter::RowSorter;
use super::store::{
    CasOutcome, CountResult, InsertOutcome, Page, PagingState, Row, RowStore, StoreFuture,
};

/// Row key: identity type code plus key text
type RowKey = (u8, String);

fn row_key(id: &DocumentId) -> RowKey {
    (id.type_code(), id.key_text())
}

struct StoredRow {
    id: DocumentId,
    tx_id: Uuid,
    document: Value,
}

impl StoredRow {
    fn to_row(&self) -> Row {
        Row {
            id: self.id.clone(),
            tx_id: self.tx_id,
            document: Some(self.document.clone()),
        }
    }
}

#[derive(Default)]
struct StoreState {
    rows: BTreeMap<RowKey, StoredRow>,
    /// Conflicts still to report per row
    conflicts: HashMap<RowKey, u32>,
    /// Rows removed just before their next write
    vanishing: HashSet<RowKey>,
    cas_attempts: HashMap<RowKey, u32>,
    unavailable: bool,
}

/// In-memory `RowStore`
pub struct MemoryRowStore {
    identity: Box<dyn IdentityCoercer>,
    state: Mutex<StoreState>,
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::with_identity(Box::new(JsonIdentity))
    }

    pub fn with_identity(identity: Box<dyn IdentityCoercer>) -> Self {
        Self {
            identity,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Stores a document under its identity, replacing any existing row.
    pub fn put(&self, document: Value) -> ExecutorResult<DocumentId> {
        let id = self.identity.extract(&document).ok_or_else(|| {
            ExecutorError::Mutation(format!(
                "Document has no valid {}",
                self.identity.field_name()
            ))
        })?;
        let mut state = self.state()?;
        state.rows.insert(
            row_key(&id),
            StoredRow {
                id: id.clone(),
                tx_id: Uuid::new_v4(),
                document,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: &DocumentId) -> Option<Value> {
        let state = self.state.lock().ok()?;
        state.rows.get(&row_key(id)).map(|r| r.document.clone())
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the next `times` writes to the row conflict, each as if a
    /// concurrent writer had just changed it.
    pub fn inject_conflicts(&self, id: &DocumentId, times: u32) -> ExecutorResult<()> {
        self.state()?.conflicts.insert(row_key(id), times);
        Ok(())
    }

    /// Deletes the row right before the next write to it.
    pub fn vanish_before_next_write(&self, id: &DocumentId) -> ExecutorResult<()> {
        self.state()?.vanishing.insert(row_key(id));
        Ok(())
    }

    /// Makes every call fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) -> ExecutorResult<()> {
        self.state()?.unavailable = unavailable;
        Ok(())
    }

    /// Conditional writes attempted against the row
    pub fn cas_attempts(&self, id: &DocumentId) -> u32 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.cas_attempts.get(&row_key(id)).copied())
            .unwrap_or(0)
    }

    fn state(&self) -> ExecutorResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| ExecutorError::Unavailable("row store lock poisoned".into()))
    }

    fn available(&self) -> ExecutorResult<MutexGuard<'_, StoreState>> {
        let state = self.state()?;
        if state.unavailable {
            return Err(ExecutorError::Unavailable("row store offline".into()));
        }
        Ok(state)
    }

    /// Matching rows in store order
    fn matching(&self, state: &StoreState, plan: &ReadPlan) -> Vec<Row> {
        let matcher = ExpressionMatcher::new(self.identity.as_ref());
        let matches = |row: &&StoredRow| matcher.matches(&row.document, &plan.expression);

        match plan.key_lookup() {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .map(row_key)
                    .filter(|key| seen.insert(key.clone()))
                    .filter_map(|key| state.rows.get(&key))
                    .filter(matches)
                    .map(StoredRow::to_row)
                    .collect()
            }
            None => state
                .rows
                .values()
                .filter(matches)
                .map(StoredRow::to_row)
                .collect(),
        }
    }

    fn read_page(&self, plan: &ReadPlan, paging: Option<&PagingState>) -> ExecutorResult<Page> {
        let state = self.available()?;
        let mut rows = self.matching(&state, plan);
        drop(state);

        if let Some(vector) = &plan.vector {
            RowSorter::sort_by_similarity(&mut rows, vector);
            return Ok(window(rows, plan));
        }
        if plan.read_shape == ReadShape::SortedDocument {
            if rows.len() > plan.max_buffered_sort_rows {
                return Err(ExecutorError::SortBufferExceeded {
                    limit: plan.max_buffered_sort_rows,
                });
            }
            if let Some(fields) = &plan.order_by {
                RowSorter::sort_by_fields(&mut rows, fields);
            }
            return Ok(window(rows, plan));
        }

        let offset = match paging {
            Some(PagingState(token)) => token
                .parse::<usize>()
                .map_err(|_| ExecutorError::Unavailable(format!("Invalid paging state '{}'", token)))?,
            None => 0,
        };
        let available: Vec<Row> = rows.into_iter().skip(plan.skip).take(plan.row_limit).collect();
        let end = offset.saturating_add(plan.page_size).min(available.len());
        let next = (end < available.len()).then(|| PagingState(end.to_string()));
        let rows = available
            .into_iter()
            .skip(offset)
            .take(end.saturating_sub(offset))
            .map(|row| shape(row, plan.read_shape))
            .collect();
        Ok(Page { rows, next })
    }

    fn write(
        &self,
        expected: &Row,
        document: Option<Value>,
    ) -> ExecutorResult<CasOutcome> {
        let mut state = self.available()?;
        let key = row_key(&expected.id);
        *state.cas_attempts.entry(key.clone()).or_insert(0) += 1;

        if state.vanishing.remove(&key) {
            state.rows.remove(&key);
        }
        if let Some(remaining) = state.conflicts.get_mut(&key).filter(|n| **n > 0) {
            *remaining -= 1;
            if let Some(row) = state.rows.get_mut(&key) {
                row.tx_id = Uuid::new_v4();
            }
            return Ok(CasOutcome::Conflict);
        }

        let current = match state.rows.get_mut(&key) {
            Some(row) if row.tx_id == expected.tx_id => row,
            _ => return Ok(CasOutcome::Conflict),
        };
        match document {
            Some(document) => {
                current.document = document;
                current.tx_id = Uuid::new_v4();
            }
            None => {
                state.rows.remove(&key);
            }
        }
        Ok(CasOutcome::Applied)
    }
}

/// The ordered window `[skip, skip + row_limit)` as one page
fn window(rows: Vec<Row>, plan: &ReadPlan) -> Page {
    Page {
        rows: rows
            .into_iter()
            .skip(plan.skip)
            .take(plan.row_limit)
            .map(|row| shape(row, plan.read_shape))
            .collect(),
        next: None,
    }
}

fn shape(mut row: Row, read_shape: ReadShape) -> Row {
    if !read_shape.returns_documents() {
        row.document = None;
    }
    row
}

impl RowStore for MemoryRowStore {
    fn read<'a>(
        &'a self,
        plan: &'a ReadPlan,
        paging: Option<&'a PagingState>,
    ) -> StoreFuture<'a, Page> {
        Box::pin(future::ready(self.read_page(plan, paging)))
    }

    fn read_row<'a>(&'a self, id: &'a DocumentId) -> StoreFuture<'a, Option<Row>> {
        let result = self
            .available()
            .map(|state| state.rows.get(&row_key(id)).map(StoredRow::to_row));
        Box::pin(future::ready(result))
    }

    fn count<'a>(&'a self, plan: &'a ReadPlan) -> StoreFuture<'a, CountResult> {
        let result = self.available().map(|state| {
            let matched = self.matching(&state, plan).len();
            CountResult {
                count: matched.min(plan.row_limit),
                more_data: matched > plan.row_limit,
            }
        });
        Box::pin(future::ready(result))
    }

    fn compare_and_set<'a>(
        &'a self,
        expected: &'a Row,
        document: Value,
    ) -> StoreFuture<'a, CasOutcome> {
        Box::pin(future::ready(self.write(expected, Some(document))))
    }

    fn compare_and_delete<'a>(&'a self, expected: &'a Row) -> StoreFuture<'a, CasOutcome> {
        Box::pin(future::ready(self.write(expected, None)))
    }

    fn insert_if_absent<'a>(
        &'a self,
        id: &'a DocumentId,
        document: Value,
    ) -> StoreFuture<'a, InsertOutcome> {
        let result = self.available().map(|mut state| {
            let key = row_key(id);
            if state.rows.contains_key(&key) {
                return InsertOutcome::Duplicate;
            }
            state.rows.insert(
                key,
                StoredRow {
                    id: id.clone(),
                    tx_id: Uuid::new_v4(),
                    document,
                },
            );
            InsertOutcome::Inserted
        });
        Box::pin(future::ready(result))
    }

    fn truncate(&self) -> StoreFuture<'_, ()> {
        let result = self.available().map(|mut state| state.rows.clear());
        Box::pin(future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandKind, CommandOptions, SortField, SortSpec};
    use crate::config::OperationsConfig;
    use crate::filter::FilterCompiler;
    use crate::planner::QueryPlanner;
    use crate::value::FieldPath;
    use serde_json::json;

    fn store_with(n: i64) -> MemoryRowStore {
        let store = MemoryRowStore::new();
        for i in 0..n {
            store.put(json!({"_id": format!("k{:02}", i), "n": i})).unwrap();
        }
        store
    }

    fn plan(command: Command) -> ReadPlan {
        let config = OperationsConfig::default();
        let expression = FilterCompiler::new(&JsonIdentity, 100)
            .compile(command.filter.as_ref())
            .unwrap();
        QueryPlanner::new(&config).plan(&command, expression).unwrap()
    }

    #[tokio::test]
    async fn test_paged_read() {
        let store = store_with(45);
        let plan = plan(Command::new(CommandKind::Find));

        let first = store.read(&plan, None).await.unwrap();
        assert_eq!(first.rows.len(), 20);
        let second = store.read(&plan, first.next.as_ref()).await.unwrap();
        assert_eq!(second.rows.len(), 20);
        let third = store.read(&plan, second.next.as_ref()).await.unwrap();
        assert_eq!(third.rows.len(), 5);
        assert!(third.next.is_none());
    }

    #[tokio::test]
    async fn test_row_limit_and_skip() {
        let store = store_with(10);
        let plan = plan(Command::new(CommandKind::Find).with_options(CommandOptions {
            limit: Some(3),
            skip: Some(2),
            ..Default::default()
        }));
        let page = store.read(&plan, None).await.unwrap();
        let ns: Vec<i64> = page
            .rows
            .iter()
            .map(|r| r.document.as_ref().unwrap()["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![2, 3, 4]);
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_key_only_rows_have_no_document() {
        let store = store_with(3);
        let plan = plan(Command::new(CommandKind::DeleteMany).with_filter(json!({"n": 1})));
        let page = store.read(&plan, None).await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(page.rows[0].document.is_none());
    }

    #[tokio::test]
    async fn test_sorted_read_and_buffer_bound() {
        let store = store_with(5);
        let sort = SortSpec::by_fields(vec![SortField {
            path: FieldPath::parse("n").unwrap(),
            ascending: false,
        }]);
        let mut plan = plan(Command::new(CommandKind::Find).with_sort(sort));
        let page = store.read(&plan, None).await.unwrap();
        assert_eq!(page.rows[0].id, DocumentId::string("k04"));

        plan.max_buffered_sort_rows = 4;
        let err = store.read(&plan, None).await.unwrap_err();
        assert_eq!(err, ExecutorError::SortBufferExceeded { limit: 4 });
    }

    #[tokio::test]
    async fn test_count_reports_more_data() {
        let store = store_with(5);
        let plan = plan(Command::new(CommandKind::CountDocuments)).with_row_limit(3);
        let count = store.count(&plan).await.unwrap();
        assert_eq!(count, CountResult { count: 3, more_data: true });
    }

    #[tokio::test]
    async fn test_compare_and_set_on_tx_id() {
        let store = store_with(1);
        let id = DocumentId::string("k00");
        let row = store.read_row(&id).await.unwrap().unwrap();

        let applied = store.compare_and_set(&row, json!({"_id": "k00", "n": 9})).await.unwrap();
        assert_eq!(applied, CasOutcome::Applied);

        // Stale version
        let stale = store.compare_and_set(&row, json!({"_id": "k00"})).await.unwrap();
        assert_eq!(stale, CasOutcome::Conflict);
        assert_eq!(store.get(&id).unwrap()["n"], 9);
        assert_eq!(store.cas_attempts(&id), 2);
    }

    #[tokio::test]
    async fn test_injected_conflicts_and_outage() {
        let store = store_with(1);
        let id = DocumentId::string("k00");
        store.inject_conflicts(&id, 1).unwrap();

        let row = store.read_row(&id).await.unwrap().unwrap();
        assert_eq!(store.compare_and_delete(&row).await.unwrap(), CasOutcome::Conflict);
        let fresh = store.read_row(&id).await.unwrap().unwrap();
        assert_ne!(fresh.tx_id, row.tx_id);
        assert_eq!(store.compare_and_delete(&fresh).await.unwrap(), CasOutcome::Applied);
        assert!(store.is_empty());

        store.set_unavailable(true).unwrap();
        assert!(matches!(
            store.truncate().await,
            Err(ExecutorError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryRowStore::new();
        let id = DocumentId::string("a");
        assert_eq!(
            store.insert_if_absent(&id, json!({"_id": "a"})).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_if_absent(&id, json!({"_id": "a"})).await.unwrap(),
            InsertOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn test_identity_lookup_preserves_duplicates_once() {
        let store = store_with(3);
        let plan = plan(
            Command::new(CommandKind::Find).with_filter(json!({"_id": {"$in": ["k01", "k01", "k02"]}})),
        );
        let page = store.read(&plan, None).await.unwrap();
        assert_eq!(page.rows.len(), 2);
    }
}

//! Query planner
//!
//! Derives a read plan from {expression, sort, command kind, options}.
//! Rules, first match wins per attribute:
//!
//! 1. Count commands: count page size and count limit, key-only rows
//! 2. Vector sort: document rows in similarity order, vector search limit
//! 3. Field sort: sorted documents, wide sort page, sort buffer bound
//! 4. Neither: plain page; key-only rows when no document is echoed
//!
//! Single-document commands read one row (the page still widens when a
//! field sort needs buffering). An explicit `limit` overrides the computed
//! row limit and `skip` is added last.
//!
//! Planning is pure: same inputs → same plan.

use crate::command::{Command, CommandKind, SortField, VectorSort};
use crate::config::OperationsConfig;
use crate::filter::Expression;

use super::errors::{PlannerError, PlannerResult};
use super::plan::{ReadPlan, ReadShape, UNBOUNDED};

/// Query planner. Holds only the configuration; safe to share.
pub struct QueryPlanner<'a> {
    config: &'a OperationsConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(config: &'a OperationsConfig) -> Self {
        Self { config }
    }

    /// Plans the read phase of a command.
    pub fn plan(&self, command: &Command, expression: Expression) -> PlannerResult<ReadPlan> {
        let kind = command.kind;
        if kind.is_insert() {
            return Err(PlannerError::invalid_command(format!(
                "{} does not read",
                kind
            )));
        }

        let (fields, vector) = self.check_sort(command)?;
        let single = kind.is_single();
        let limit = command.options.limit;
        let skip = command.options.skip.unwrap_or(0);

        if kind == CommandKind::CountDocuments {
            return Ok(ReadPlan {
                expression,
                order_by: None,
                vector: None,
                page_size: self.config.default_count_page_size,
                row_limit: self.config.max_count_limit,
                read_shape: ReadShape::KeyOnly,
                single_response: false,
                skip: 0,
                max_buffered_sort_rows: 0,
            });
        }

        if let Some(vector) = vector {
            let max = self.config.max_vector_search_limit;
            return Ok(ReadPlan {
                expression,
                order_by: None,
                vector: Some(vector),
                page_size: if single { 1 } else { self.config.default_page_size },
                row_limit: if single { 1 } else { limit.map_or(max, |l| l.min(max)) },
                read_shape: ReadShape::Document,
                single_response: single,
                skip,
                max_buffered_sort_rows: 0,
            });
        }

        if let Some(fields) = fields {
            let row_limit = if single {
                1
            } else {
                limit.unwrap_or(self.config.default_page_size)
            };
            return Ok(ReadPlan {
                expression,
                order_by: Some(fields),
                vector: None,
                page_size: self.config.default_sort_page_size,
                row_limit,
                read_shape: ReadShape::SortedDocument,
                single_response: single,
                skip,
                max_buffered_sort_rows: self.config.max_document_sort_count,
            });
        }

        let read_shape = if kind.returns_document() || kind.is_update() {
            ReadShape::Document
        } else {
            ReadShape::KeyOnly
        };
        let row_limit = match kind {
            _ if single => 1,
            CommandKind::DeleteMany => self.config.max_document_delete_count.saturating_add(1),
            CommandKind::UpdateMany => self.config.max_document_update_count.saturating_add(1),
            _ => limit.unwrap_or(UNBOUNDED),
        };

        Ok(ReadPlan {
            expression,
            order_by: None,
            vector: None,
            page_size: if single { 1 } else { self.config.default_page_size },
            row_limit,
            read_shape,
            single_response: single,
            skip,
            max_buffered_sort_rows: 0,
        })
    }

    /// Validates the sort clause, splitting it into field sort and vector.
    fn check_sort(
        &self,
        command: &Command,
    ) -> PlannerResult<(Option<Vec<SortField>>, Option<Vec<f32>>)> {
        let Some(sort) = command.sort.as_ref().filter(|s| !s.is_empty()) else {
            return Ok((None, None));
        };

        if !command.kind.accepts_sort() {
            return Err(PlannerError::invalid_sort(
                None,
                format!("{} does not accept a sort", command.kind),
            ));
        }

        let vector = match &sort.vector {
            None => None,
            Some(VectorSort::Vector(v)) => Some(v.clone()),
            Some(VectorSort::Vectorize(_)) => {
                return Err(PlannerError::vectorize_unresolved(
                    "$vectorize must be resolved to a vector before planning",
                ))
            }
        };

        if vector.is_some() && !sort.fields.is_empty() {
            return Err(PlannerError::conflicting_sort(
                "Vector sort cannot be combined with a field sort",
            ));
        }

        let fields = (!sort.fields.is_empty()).then(|| sort.fields.clone());
        Ok((fields, vector))
    }
}

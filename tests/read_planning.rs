//! Read Planning Tests
//!
//! - Single-document commands read one row; key-only for pure deletes
//! - Field sorts buffer sorted documents; vector sorts read by similarity
//! - Planning is deterministic and fails before any row is read

use std::sync::Arc;

use docplan::command::{Command, CommandKind, CommandOptions, SortField, SortSpec};
use docplan::config::OperationsConfig;
use docplan::filter::{Expression, FilterCompiler};
use docplan::observability::MetricsRegistry;
use docplan::operation::{CommandResolver, Operation};
use docplan::planner::{PlannerErrorCode, QueryPlanner, ReadPlan, ReadShape};
use docplan::value::{FieldPath, JsonIdentity};
use serde_json::json;

fn plan(config: &OperationsConfig, command: &Command) -> ReadPlan {
    let expression = FilterCompiler::new(&JsonIdentity, config.max_in_operator_value_size)
        .compile(command.filter.as_ref())
        .unwrap();
    QueryPlanner::new(config).plan(command, expression).unwrap()
}

fn by_field(path: &str) -> SortSpec {
    SortSpec::by_fields(vec![SortField {
        path: FieldPath::parse(path).unwrap(),
        ascending: true,
    }])
}

fn single_commands() -> Vec<Command> {
    vec![
        Command::new(CommandKind::FindOne),
        Command::new(CommandKind::DeleteOne),
        Command::new(CommandKind::FindOneAndDelete),
        Command::new(CommandKind::UpdateOne).with_update(json!({"$set": {"a": 1}})),
        Command::new(CommandKind::FindOneAndUpdate).with_update(json!({"$set": {"a": 1}})),
        Command::new(CommandKind::FindOneAndReplace).with_replacement(json!({"a": 1})),
    ]
}

// =============================================================================
// Single-Document Commands
// =============================================================================

#[test]
fn test_single_document_commands_read_one_row() {
    let config = OperationsConfig::default();
    for command in single_commands() {
        let plan = plan(&config, &command.with_filter(json!({"a": 1})));
        assert_eq!(plan.page_size, 1);
        assert_eq!(plan.row_limit, 1);
        assert!(plan.single_response);
    }
}

#[test]
fn test_only_pure_delete_reads_keys() {
    let config = OperationsConfig::default();
    for command in single_commands() {
        let kind = command.kind;
        let plan = plan(&config, &command);
        let expected = if kind == CommandKind::DeleteOne {
            ReadShape::KeyOnly
        } else {
            ReadShape::Document
        };
        assert_eq!(plan.read_shape, expected, "{}", kind);
    }
}

#[test]
fn test_many_document_commands_are_not_single() {
    let config = OperationsConfig::default();
    for kind in [CommandKind::Find, CommandKind::DeleteMany, CommandKind::CountDocuments] {
        assert!(!plan(&config, &Command::new(kind)).single_response);
    }
}

// =============================================================================
// Sorted and Vector Reads
// =============================================================================

#[test]
fn test_field_sort_buffers_sorted_documents() {
    let config = OperationsConfig {
        max_document_sort_count: 500,
        ..Default::default()
    };
    let plan = plan(&config, &Command::new(CommandKind::Find).with_sort(by_field("age")));

    assert_eq!(plan.read_shape, ReadShape::SortedDocument);
    assert_eq!(plan.max_buffered_sort_rows, 500);
    assert_eq!(plan.page_size, config.default_sort_page_size);
}

#[test]
fn test_vector_sort_reads_documents_by_similarity() {
    let config = OperationsConfig {
        max_vector_search_limit: 250,
        ..Default::default()
    };
    let plan = plan(
        &config,
        &Command::new(CommandKind::Find).with_sort(SortSpec::by_vector(vec![0.1, 0.2])),
    );

    assert_eq!(plan.read_shape, ReadShape::Document);
    assert_eq!(plan.row_limit, 250);
    assert_eq!(plan.vector, Some(vec![0.1, 0.2]));
    assert!(plan.order_by.is_none());
}

#[test]
fn test_explicit_limit_and_skip() {
    let config = OperationsConfig::default();
    let command = Command::new(CommandKind::Find)
        .with_sort(by_field("age"))
        .with_options(CommandOptions {
            limit: Some(50),
            skip: Some(10),
            ..Default::default()
        });
    let plan = plan(&config, &command);
    assert_eq!(plan.row_limit, 50);
    assert_eq!(plan.skip, 10);
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_conflicting_sort_fails_before_reading() {
    let config = OperationsConfig::default();
    let mut sort = by_field("age");
    sort.vector = SortSpec::by_vector(vec![1.0]).vector;

    let err = QueryPlanner::new(&config)
        .plan(&Command::new(CommandKind::Find).with_sort(sort), Expression::empty())
        .unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::ConflictingSortSpecification);
}

#[test]
fn test_resolver_rejects_from_request() {
    let config = OperationsConfig::default();
    let metrics = Arc::new(MetricsRegistry::new());
    let resolver = CommandResolver::new(&config, &JsonIdentity, Arc::clone(&metrics));

    let err = resolver
        .resolve_request(r#"{"countDocuments": {"sort": {"a": 1}}}"#)
        .unwrap_err();
    assert_eq!(err.code(), "DOC_SORT_INVALID");
    assert!(err.is_client_error());
    assert_eq!(metrics.snapshot().commands_rejected, 1);
}

// =============================================================================
// Determinism and Explain
// =============================================================================

#[test]
fn test_planning_is_deterministic() {
    let config = OperationsConfig::default();
    let command = Command::new(CommandKind::Find)
        .with_filter(json!({"b": {"$in": [1, 2]}, "a": {"$exists": true}}))
        .with_sort(by_field("a"));
    assert_eq!(plan(&config, &command), plan(&config, &command));
}

#[test]
fn test_explain_of_resolved_request() {
    let config = OperationsConfig::default();
    let resolver = CommandResolver::new(&config, &JsonIdentity, Arc::new(MetricsRegistry::new()));

    let op = resolver
        .resolve_request(r#"{"find": {"filter": {"_id": "a"}, "options": {"limit": 5}}}"#)
        .unwrap();
    assert!(matches!(op, Operation::Find(_)));

    let explain = op.explain();
    assert!(explain.accepted);
    assert_eq!(explain.key_lookup, Some(vec!["\"a\"".to_string()]));
    assert_eq!(explain.row_limit, Some(5));

    let text = explain.to_string();
    assert!(text.contains("Read Shape: DOCUMENT"));
    assert!(text.contains("Row Limit: 5"));
}

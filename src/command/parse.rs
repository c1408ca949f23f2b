//! JSON command parsing
//!
//! A request is a single-key object naming the command:
//!
//! ```json
//! {"deleteMany": {"filter": {"status": "gone"}}}
//! {"find": {"filter": {...}, "sort": {"age": -1}, "options": {"limit": 5}}}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::planner::{PlannerError, PlannerResult};
use crate::value::FieldPath;

use super::model::{
    Command, CommandKind, CommandOptions, ReturnDocument, SortField, SortSpec, VectorSort,
};

/// Raw command body for parsing
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCommandBody {
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    options: Option<Map<String, Value>>,
    #[serde(default)]
    update: Option<Value>,
    #[serde(default)]
    replacement: Option<Value>,
    #[serde(default)]
    document: Option<Value>,
    #[serde(default)]
    documents: Option<Vec<Value>>,
}

impl Command {
    /// Parse a command from a JSON string
    pub fn parse(json: &str) -> PlannerResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| PlannerError::invalid_command(format!("Invalid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// Parse a command from a JSON value
    pub fn from_value(value: &Value) -> PlannerResult<Self> {
        let envelope = value
            .as_object()
            .filter(|map| map.len() == 1)
            .ok_or_else(|| {
                PlannerError::invalid_command("Request must be an object with exactly one command")
            })?;
        let (name, body) = envelope
            .iter()
            .next()
            .ok_or_else(|| PlannerError::invalid_command("Request names no command"))?;

        let kind = CommandKind::from_name(name)
            .ok_or_else(|| PlannerError::invalid_command(format!("Unknown command '{}'", name)))?;

        let raw: RawCommandBody = match body {
            Value::Null => RawCommandBody::default(),
            other => serde_json::from_value(other.clone()).map_err(|e| {
                PlannerError::invalid_command(format!("Invalid '{}' command: {}", name, e))
            })?,
        };

        build(kind, raw)
    }
}

fn build(kind: CommandKind, raw: RawCommandBody) -> PlannerResult<Command> {
    let takes_update = matches!(
        kind,
        CommandKind::UpdateOne | CommandKind::UpdateMany | CommandKind::FindOneAndUpdate
    );
    let stray = [
        ("filter", raw.filter.is_some() && !kind.accepts_filter()),
        ("update", raw.update.is_some() && !takes_update),
        (
            "replacement",
            raw.replacement.is_some() && kind != CommandKind::FindOneAndReplace,
        ),
        ("document", raw.document.is_some() && kind != CommandKind::InsertOne),
        ("documents", raw.documents.is_some() && kind != CommandKind::InsertMany),
    ];
    if let Some((field, _)) = stray.iter().find(|(_, present)| *present) {
        return Err(not_accepted(kind, field));
    }

    let mut command = Command::new(kind);
    command.filter = raw.filter.filter(|f| !f.is_null());
    command.sort = match raw.sort {
        Some(sort) => parse_sort(&sort)?,
        None => None,
    };
    if let Some(options) = raw.options {
        command.options = parse_options(kind, &options)?;
    }

    match kind {
        CommandKind::UpdateOne | CommandKind::UpdateMany | CommandKind::FindOneAndUpdate => {
            command.update = Some(required_object(kind, "update", raw.update)?);
        }
        CommandKind::FindOneAndReplace => {
            command.replacement = Some(required_object(kind, "replacement", raw.replacement)?);
        }
        CommandKind::InsertOne => {
            command.documents = vec![required_object(kind, "document", raw.document)?];
        }
        CommandKind::InsertMany => {
            let documents = raw
                .documents
                .ok_or_else(|| PlannerError::invalid_command("insertMany requires 'documents'"))?;
            if documents.is_empty() {
                return Err(PlannerError::invalid_command(
                    "insertMany requires at least one document",
                ));
            }
            if documents.iter().any(|d| !d.is_object()) {
                return Err(PlannerError::invalid_command(
                    "insertMany documents must be objects",
                ));
            }
            command.documents = documents;
        }
        _ => {}
    }

    Ok(command)
}

fn not_accepted(kind: CommandKind, field: &str) -> PlannerError {
    PlannerError::invalid_command(format!("'{}' is not accepted by {}", field, kind))
}

fn required_object(kind: CommandKind, field: &str, value: Option<Value>) -> PlannerResult<Value> {
    match value {
        Some(Value::Object(map)) => Ok(Value::Object(map)),
        Some(_) => Err(PlannerError::invalid_command(format!(
            "'{}' of {} must be an object",
            field, kind
        ))),
        None => Err(PlannerError::invalid_command(format!(
            "{} requires '{}'",
            kind, field
        ))),
    }
}

/// Parses command options, rejecting options the command does not take.
pub fn parse_options(kind: CommandKind, raw: &Map<String, Value>) -> PlannerResult<CommandOptions> {
    let mut options = CommandOptions::default();

    for (key, value) in raw {
        if !kind.accepted_options().contains(&key.as_str()) {
            return Err(PlannerError::invalid_option(
                key,
                format!("not supported by {}", kind),
            ));
        }
        match key.as_str() {
            "limit" => {
                let limit = value
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| PlannerError::invalid_option(key, "must be a positive integer"))?;
                options.limit = Some(limit as usize);
            }
            "skip" => {
                let skip = value.as_u64().ok_or_else(|| {
                    PlannerError::invalid_option(key, "must be a non-negative integer")
                })?;
                options.skip = Some(skip as usize);
            }
            "upsert" => options.upsert = bool_option(key, value)?,
            "ordered" => options.ordered = bool_option(key, value)?,
            "returnDocument" => {
                options.return_document = match value.as_str() {
                    Some("before") => ReturnDocument::Before,
                    Some("after") => ReturnDocument::After,
                    _ => {
                        return Err(PlannerError::invalid_option(
                            key,
                            "must be \"before\" or \"after\"",
                        ))
                    }
                };
            }
            _ => {}
        }
    }

    Ok(options)
}

fn bool_option(key: &str, value: &Value) -> PlannerResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| PlannerError::invalid_option(key, "must be a boolean"))
}

/// Parses a sort clause.
///
/// An empty object is no sort. Vector and field entries are both kept; their
/// combination is rejected at planning time.
pub fn parse_sort(raw: &Value) -> PlannerResult<Option<SortSpec>> {
    let map = raw
        .as_object()
        .ok_or_else(|| PlannerError::invalid_sort(None, "Sort clause must be an object"))?;

    let mut spec = SortSpec::default();
    for (key, value) in map {
        match key.as_str() {
            "$vector" => set_vector(&mut spec, VectorSort::Vector(parse_vector(value)?))?,
            "$vectorize" => {
                let text = value
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        PlannerError::invalid_sort(
                            Some(key),
                            "$vectorize requires a non-empty string",
                        )
                    })?;
                set_vector(&mut spec, VectorSort::Vectorize(text.to_string()))?;
            }
            other if other.starts_with('$') => {
                return Err(PlannerError::invalid_sort(
                    Some(other),
                    format!("Unsupported sort key '{}'", other),
                ));
            }
            field => {
                let path = FieldPath::parse(field)
                    .map_err(|e| PlannerError::invalid_sort(Some(field), e.to_string()))?;
                let ascending = match value.as_i64() {
                    Some(1) => true,
                    Some(-1) => false,
                    _ => {
                        return Err(PlannerError::invalid_sort(
                            Some(field),
                            format!("Sort direction of '{}' must be 1 or -1", field),
                        ))
                    }
                };
                spec.fields.push(SortField { path, ascending });
            }
        }
    }

    Ok((!spec.is_empty()).then_some(spec))
}

fn set_vector(spec: &mut SortSpec, vector: VectorSort) -> PlannerResult<()> {
    if spec.vector.is_some() {
        return Err(PlannerError::conflicting_sort(
            "Sort clause may hold only one of $vector and $vectorize",
        ));
    }
    spec.vector = Some(vector);
    Ok(())
}

fn parse_vector(value: &Value) -> PlannerResult<Vec<f32>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| {
            PlannerError::invalid_sort(Some("$vector"), "$vector requires a non-empty array")
        })?;
    items
        .iter()
        .map(|item| {
            item.as_f64().map(|f| f as f32).ok_or_else(|| {
                PlannerError::invalid_sort(Some("$vector"), "$vector elements must be numbers")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerErrorCode;
    use serde_json::json;

    fn parse(value: Value) -> PlannerResult<Command> {
        Command::from_value(&value)
    }

    #[test]
    fn test_parse_find() {
        let command = parse(json!({
            "find": {
                "filter": {"status": "active"},
                "sort": {"age": -1, "name": 1},
                "options": {"limit": 5, "skip": 2}
            }
        }))
        .unwrap();

        assert_eq!(command.kind, CommandKind::Find);
        assert_eq!(command.filter, Some(json!({"status": "active"})));
        let sort = command.sort.unwrap();
        assert_eq!(sort.fields.len(), 2);
        assert!(!sort.fields[0].ascending);
        assert_eq!(sort.fields[1].path.as_str(), "name");
        assert_eq!(command.options.limit, Some(5));
        assert_eq!(command.options.skip, Some(2));
    }

    #[test]
    fn test_parse_empty_body() {
        let command = parse(json!({"deleteMany": {}})).unwrap();
        assert_eq!(command.kind, CommandKind::DeleteMany);
        assert!(command.filter.is_none());

        let command = parse(json!({"countDocuments": null})).unwrap();
        assert_eq!(command.kind, CommandKind::CountDocuments);
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        let err = parse(json!({"aggregate": {}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);

        let err = parse(json!({"find": {}, "findOne": {}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);
    }

    #[test]
    fn test_parse_rejects_unknown_body_field() {
        let err = parse(json!({"find": {"projection": {}}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);
    }

    #[test]
    fn test_parse_update_requires_clause() {
        let err = parse(json!({"updateOne": {"filter": {}}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);

        let command = parse(json!({
            "findOneAndUpdate": {
                "filter": {"_id": 1},
                "update": {"$set": {"a": 1}},
                "options": {"upsert": true, "returnDocument": "after"}
            }
        }))
        .unwrap();
        assert!(command.options.upsert);
        assert_eq!(command.options.return_document, ReturnDocument::After);
    }

    #[test]
    fn test_parse_rejects_option_on_wrong_command() {
        let err = parse(json!({"deleteOne": {"options": {"upsert": true}}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommandOption);
        assert_eq!(err.field(), Some("upsert"));

        let err = parse(json!({"find": {"options": {"limit": 0}}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommandOption);
    }

    #[test]
    fn test_parse_inserts() {
        let command = parse(json!({"insertOne": {"document": {"_id": 1}}})).unwrap();
        assert_eq!(command.documents, vec![json!({"_id": 1})]);

        let command = parse(json!({
            "insertMany": {"documents": [{"a": 1}, {"a": 2}], "options": {"ordered": true}}
        }))
        .unwrap();
        assert_eq!(command.documents.len(), 2);
        assert!(command.options.ordered);

        let err = parse(json!({"insertMany": {"documents": []}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);

        let err = parse(json!({"insertOne": {"document": {}, "filter": {}}})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidCommand);
    }

    #[test]
    fn test_parse_sort_validation() {
        assert_eq!(parse_sort(&json!({})).unwrap(), None);

        let err = parse_sort(&json!({"age": 2})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidSort);

        let err = parse_sort(&json!({"$vector": []})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidSort);

        let err = parse_sort(&json!({"$vector": [0.1], "$vectorize": "text"})).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::ConflictingSortSpecification);

        let err = parse_sort(&json!(["age"])).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::InvalidSort);
    }

    #[test]
    fn test_parse_sort_keeps_vector_and_fields() {
        let spec = parse_sort(&json!({"$vector": [0.5, 1.0], "age": 1}))
            .unwrap()
            .unwrap();
        assert_eq!(spec.vector, Some(VectorSort::Vector(vec![0.5, 1.0])));
        assert_eq!(spec.fields.len(), 1);
    }
}

//! Command model

use serde_json::Value;

use crate::value::FieldPath;

/// Supported commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Find,
    FindOne,
    CountDocuments,
    DeleteOne,
    DeleteMany,
    UpdateOne,
    UpdateMany,
    FindOneAndUpdate,
    FindOneAndReplace,
    FindOneAndDelete,
    InsertOne,
    InsertMany,
}

impl CommandKind {
    pub const ALL: [CommandKind; 12] = [
        CommandKind::Find,
        CommandKind::FindOne,
        CommandKind::CountDocuments,
        CommandKind::DeleteOne,
        CommandKind::DeleteMany,
        CommandKind::UpdateOne,
        CommandKind::UpdateMany,
        CommandKind::FindOneAndUpdate,
        CommandKind::FindOneAndReplace,
        CommandKind::FindOneAndDelete,
        CommandKind::InsertOne,
        CommandKind::InsertMany,
    ];

    /// Command name as it appears in a request
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Find => "find",
            CommandKind::FindOne => "findOne",
            CommandKind::CountDocuments => "countDocuments",
            CommandKind::DeleteOne => "deleteOne",
            CommandKind::DeleteMany => "deleteMany",
            CommandKind::UpdateOne => "updateOne",
            CommandKind::UpdateMany => "updateMany",
            CommandKind::FindOneAndUpdate => "findOneAndUpdate",
            CommandKind::FindOneAndReplace => "findOneAndReplace",
            CommandKind::FindOneAndDelete => "findOneAndDelete",
            CommandKind::InsertOne => "insertOne",
            CommandKind::InsertMany => "insertMany",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Single-document commands: the response carries at most one document
    pub fn is_single(&self) -> bool {
        matches!(
            self,
            CommandKind::FindOne
                | CommandKind::DeleteOne
                | CommandKind::UpdateOne
                | CommandKind::FindOneAndUpdate
                | CommandKind::FindOneAndReplace
                | CommandKind::FindOneAndDelete
        )
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            CommandKind::Find | CommandKind::FindOne | CommandKind::CountDocuments
        )
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, CommandKind::InsertOne | CommandKind::InsertMany)
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            CommandKind::DeleteOne | CommandKind::DeleteMany | CommandKind::FindOneAndDelete
        )
    }

    /// Commands that change rows in place (update operators or replacement)
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            CommandKind::UpdateOne
                | CommandKind::UpdateMany
                | CommandKind::FindOneAndUpdate
                | CommandKind::FindOneAndReplace
        )
    }

    /// Commands whose response echoes a document
    pub fn returns_document(&self) -> bool {
        matches!(
            self,
            CommandKind::Find
                | CommandKind::FindOne
                | CommandKind::FindOneAndUpdate
                | CommandKind::FindOneAndReplace
                | CommandKind::FindOneAndDelete
        )
    }

    pub fn accepts_filter(&self) -> bool {
        !self.is_insert()
    }

    pub fn accepts_sort(&self) -> bool {
        !matches!(
            self,
            CommandKind::CountDocuments
                | CommandKind::DeleteMany
                | CommandKind::UpdateMany
                | CommandKind::InsertOne
                | CommandKind::InsertMany
        )
    }

    /// Options the command accepts
    pub fn accepted_options(&self) -> &'static [&'static str] {
        match self {
            CommandKind::Find => &["limit", "skip"],
            CommandKind::UpdateOne | CommandKind::UpdateMany => &["upsert"],
            CommandKind::FindOneAndUpdate | CommandKind::FindOneAndReplace => {
                &["upsert", "returnDocument"]
            }
            CommandKind::InsertMany => &["ordered"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One field of a sort clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub path: FieldPath,
    pub ascending: bool,
}

/// Vector part of a sort clause
#[derive(Debug, Clone, PartialEq)]
pub enum VectorSort {
    /// Query vector given by the client
    Vector(Vec<f32>),
    /// Text still to be embedded
    Vectorize(String),
}

/// Sort clause as given by the client.
///
/// Field sort and vector sort are kept side by side so that the planner can
/// reject their combination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    pub fields: Vec<SortField>,
    pub vector: Option<VectorSort>,
}

impl SortSpec {
    pub fn by_fields(fields: Vec<SortField>) -> Self {
        Self {
            fields,
            vector: None,
        }
    }

    pub fn by_vector(vector: Vec<f32>) -> Self {
        Self {
            fields: Vec::new(),
            vector: Some(VectorSort::Vector(vector)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.vector.is_none()
    }
}

/// Which snapshot a find-and-modify command returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    /// Pre-mutation snapshot taken by the read
    #[default]
    Before,
    /// Document as written
    After,
}

/// Command-level options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub upsert: bool,
    pub return_document: ReturnDocument,
    /// insertMany: stop at the first failed document
    pub ordered: bool,
}

/// A deserialized command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub filter: Option<Value>,
    pub sort: Option<SortSpec>,
    pub options: CommandOptions,
    /// Update clause (`$set`, ...) of update commands
    pub update: Option<Value>,
    /// Replacement document of findOneAndReplace
    pub replacement: Option<Value>,
    /// Documents of insert commands
    pub documents: Vec<Value>,
}

impl Command {
    /// A command with nothing but its kind
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            filter: None,
            sort: None,
            options: CommandOptions::default(),
            update: None,
            replacement: None,
            documents: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_replacement(mut self, replacement: Value) -> Self {
        self.replacement = Some(replacement);
        self
    }

    pub fn with_documents(mut self, documents: Vec<Value>) -> Self {
        self.documents = documents;
        self
    }

    /// Vector sort, when the sort clause has one
    pub fn vector_sort(&self) -> Option<&VectorSort> {
        self.sort.as_ref().and_then(|s| s.vector.as_ref())
    }
}

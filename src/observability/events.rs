//! Observable events
//!
//! Events are explicit and typed; the string form is the `event` field of a
//! log line.

use std::fmt;

use super::logger::Severity;

/// Observable events of command resolution and execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Operations configuration loaded
    ConfigLoaded,

    // Resolution
    /// Command resolved into a planned operation
    CommandPlanned,
    /// Command rejected during compilation or planning
    CommandRejected,

    // Mutation
    /// Unfiltered many-document delete served by a bulk clear
    BulkClear,
    /// Compare-and-set rejected because the row changed
    CasConflict,
    /// Row still conflicting after every retry
    CasRetriesExhausted,
    /// Row gone or no longer matching on re-read
    RowVanished,
    /// Upsert wrote a new document
    UpsertInsert,
    /// Insert found an existing document with the same id
    DuplicateDocument,
    /// Mutation operation finished
    MutationComplete,
    /// Insert operation finished
    InsertComplete,
    /// Cancellation stopped an operation before all rows were started
    OperationCancelled,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CommandPlanned => "COMMAND_PLANNED",
            Event::CommandRejected => "COMMAND_REJECTED",
            Event::BulkClear => "BULK_CLEAR",
            Event::CasConflict => "CAS_CONFLICT",
            Event::CasRetriesExhausted => "CAS_RETRIES_EXHAUSTED",
            Event::RowVanished => "ROW_VANISHED",
            Event::UpsertInsert => "UPSERT_INSERT",
            Event::DuplicateDocument => "DUPLICATE_DOCUMENT",
            Event::MutationComplete => "MUTATION_COMPLETE",
            Event::InsertComplete => "INSERT_COMPLETE",
            Event::OperationCancelled => "OPERATION_CANCELLED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CommandPlanned | Event::CasConflict | Event::RowVanished => Severity::Trace,
            Event::CommandRejected
            | Event::CasRetriesExhausted
            | Event::DuplicateDocument
            | Event::OperationCancelled => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

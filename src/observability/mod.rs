//! Observability
//!
//! - Structured JSON line logging with a process-wide minimum severity
//! - Typed events
//! - Atomic counters
//!
//! Observability is read-only: nothing here influences planning or execution.
//!
//! ```ignore
//! use docplan::observability::{Event, Logger, MetricsRegistry};
//!
//! Logger::info("COMMAND_PLANNED", &[("command", "find")]);
//! log_event(Event::BulkClear, &[("collection", "users")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_bulk_clears();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Logs a typed event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

//! docplan - command resolution and query planning for a document API over
//! a wide-column store
//!
//! - `filter`: JSON filter clause → typed expression tree
//! - `planner`: expression + sort + command kind → read plan
//! - `operation`: read plan → executable operation (bulk clear or read-then-CAS)
//! - `executor`: runs operations against a `RowStore`

pub mod cli;
pub mod command;
pub mod config;
pub mod executor;
pub mod filter;
pub mod observability;
pub mod operation;
pub mod planner;
pub mod value;

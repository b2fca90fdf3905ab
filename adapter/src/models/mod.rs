//! Canonical data models shared with the host.
//!
//! This module contains the backend-agnostic query and log entry shapes the adapter
//! translates to and from.

pub mod log;
pub mod nullable;
pub mod query;
pub mod wire_time;

pub use log::{LogEntry, LogPartitionError};
pub use query::{FilterOperator, LogExpression, LogFilter, LogQuery, QueryScope};

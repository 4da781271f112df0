//! Walnut Reporter
//!
//! Observers that turn the executor's lifecycle events into structured
//! reports:
//! - [`DefaultReporter`]: per-suite and per-execution JSON documents
//! - [`SearchIndexClient`]: writes documents to a search index
//! - [`MailRelay`]: mails the execution summary

pub mod default;
pub mod error;
pub mod model;
pub mod sinks;

pub use default::DefaultReporter;
pub use error::{ReportError, ReportResult};
pub use model::{execution_type, ExecutionReport, ScriptRecord, SuiteReport, Summary, Verification};
pub use sinks::{sinks_from_settings, MailRelay, ReportSink, SearchIndexClient};

//! Walnut Core
//!
//! This crate provides the execution engine of the Walnut harness:
//! - Suite and test entities with tags, data sets, retries and timeouts
//! - A hook runner with before/after-all and before/after-each semantics
//! - The executor that binds suites onto the runner and sequences
//!   setup, teardown, retry and skip decisions
//! - A synchronous lifecycle event stream consumed by reporters
//! - Declarative YAML suites interpreted against a browser driver
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Executor                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunContext (run id, settings, EventStream)                 │
//! │    └── Manager (per suite execution)                        │
//! │          ├── TestContext  (shared mutable state)            │
//! │          └── Arc<dyn Driver> (browser-control handle)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner                                                     │
//! │    └── Describe (one per suite)                             │
//! │          ├── before_all  -> Suite::setup                    │
//! │          ├── before_each -> Suite::before_test              │
//! │          ├── Case*       -> Test::{test_startup,test,       │
//! │          │                        test_cleanup}             │
//! │          ├── after_each  -> Suite::after_test               │
//! │          └── after_all   -> Suite::teardown                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EventStream ──> Observer (reporter, mail, search index)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod data;
pub mod dispatch;
pub mod driver;
pub mod entity;
pub mod error;
pub mod events;
pub mod executor;
pub mod logger;
pub mod logging;
pub mod manager;
pub mod run;
pub mod runner;
pub mod settings;
pub mod spec;
pub mod steps;

pub use context::TestContext;
pub use data::{DataRow, DataSource};
pub use driver::{Condition, Driver, DriverError, DriverResult, ElementRef, Locator, Target};
pub use entity::{HookResult, Suite, Test, TestSet};
pub use error::{Error, Result};
pub use events::{EventStream, LifecycleEvent, Observer};
pub use executor::Executor;
pub use logger::{EventType, LogLevel, LogRecord, TestLogger};
pub use manager::Manager;
pub use run::RunContext;
pub use runner::{CaseOutcome, CaseState, RunnerReport, TagFilter};
pub use settings::Settings;

/// Walnut version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Per-suite-execution aggregate

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::context::TestContext;
use crate::data::DataRow;
use crate::driver::{Driver, DriverResult};
use crate::logger::TestLogger;
use crate::run::RunContext;
use crate::settings::Settings;

/// Internal notifications between the manager and code holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerSignal {
    /// The execution context was replaced with a fresh one
    ContextReset,
    /// The browser-control handle was disposed
    DriverDisposed,
}

/// Binds the run, the browser-control handle and the execution context of
/// one suite execution. Suites and tests receive it by `Arc` at construction.
pub struct Manager {
    run: Arc<RunContext>,
    driver: Arc<dyn Driver>,
    context: Mutex<TestContext>,
    signals: broadcast::Sender<ManagerSignal>,
}

impl Manager {
    pub fn new(run: Arc<RunContext>, driver: Arc<dyn Driver>) -> Self {
        let (signals, _) = broadcast::channel(16);
        Self {
            run,
            driver,
            context: Mutex::new(TestContext::default()),
            signals,
        }
    }

    /// Unique id of the run this manager belongs to
    pub fn uid(&self) -> &str {
        self.run.id()
    }

    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    pub fn settings(&self) -> &Settings {
        self.run.settings()
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    /// Snapshot of the execution context
    pub fn context(&self) -> TestContext {
        self.context.lock().clone()
    }

    /// Mutate the execution context. The lock is released before returning.
    pub fn update_context<R>(&self, f: impl FnOnce(&mut TestContext) -> R) -> R {
        let mut ctx = self.context.lock();
        f(&mut ctx)
    }

    /// Data row of the running data-driven test
    pub fn data(&self) -> Option<DataRow> {
        self.context.lock().data.clone()
    }

    /// Start over with an empty context for `suite_name`
    pub fn reset_context(&self, suite_name: &str) {
        *self.context.lock() = TestContext::for_suite(suite_name);
        let _ = self.signals.send(ManagerSignal::ContextReset);
    }

    /// Logger named after the running suite and test
    pub fn logger(&self) -> TestLogger {
        let ctx = self.context.lock();
        let name = if ctx.test_name.is_empty() {
            ctx.suite_name.clone()
        } else {
            format!("{}-{}", ctx.suite_name, ctx.test_name)
        };
        drop(ctx);
        self.run.logger(name)
    }

    /// Logger with an explicit name
    pub fn named_logger(&self, name: impl Into<String>) -> TestLogger {
        self.run.logger(name)
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<ManagerSignal> {
        self.signals.subscribe()
    }

    /// Dispose the handle owned by this manager
    pub async fn dispose(&self) -> DriverResult<()> {
        debug!("Disposing driver for run {}", self.uid());
        let result = self.driver.dispose().await;
        if let Err(e) = &result {
            warn!("Driver dispose failed: {}", e);
        }
        let _ = self.signals.send(ManagerSignal::DriverDisposed);
        result
    }
}

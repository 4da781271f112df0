//! Suite executor
//!
//! Binds suites onto the hook runner. Every suite becomes one describe
//! block whose hooks drive the suite lifecycle
//!
//! ```text
//! Idle -> SettingUp -> Ready -> {BeforeHook -> Body | Skipped -> AfterHook}* -> TearingDown -> Done
//! ```
//!
//! and republish each phase transition on the run's event stream.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::strip_tags;
use crate::data::DataRow;
use crate::dispatch::{Dispatcher, Hook};
use crate::driver::Driver;
use crate::entity::{Suite, Test, TestSet};
use crate::error::{Error, Result};
use crate::events::{LifecycleEvent, Observer};
use crate::manager::Manager;
use crate::run::RunContext;
use crate::runner::{
    within, Case, CaseBody, CaseInfo, CaseState, Completion, Describe, DescribeHooks, Runner,
    RunnerReport, TagFilter,
};

/// Configures observers and tag selection before the run starts
pub struct ExecutorBuilder {
    run: Arc<RunContext>,
    observers: Vec<Arc<dyn Observer>>,
    filter: TagFilter,
}

impl ExecutorBuilder {
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_filter(mut self, filter: TagFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Subscribe observers and publish `initialized`
    pub fn build(self) -> Executor {
        for observer in self.observers {
            self.run.events().subscribe(observer);
        }

        info!(
            "Initialized run {} ({} observer(s))",
            self.run.id(),
            self.run.events().observer_count()
        );
        self.run.publish(LifecycleEvent::Initialized {
            run_id: self.run.id().to_string(),
        });

        Executor {
            run: self.run,
            runner: Runner::with_filter(self.filter),
            managers: Vec::new(),
        }
    }
}

/// Drives registered suites through the runner
pub struct Executor {
    run: Arc<RunContext>,
    runner: Runner,
    managers: Vec<Arc<Manager>>,
}

impl Executor {
    pub fn builder(run: Arc<RunContext>) -> ExecutorBuilder {
        ExecutorBuilder {
            run,
            observers: Vec::new(),
            filter: TagFilter::default(),
        }
    }

    pub fn run_id(&self) -> &str {
        self.run.id()
    }

    pub fn run_context(&self) -> &Arc<RunContext> {
        &self.run
    }

    /// Number of suites registered so far
    pub fn suite_count(&self) -> usize {
        self.managers.len()
    }

    /// Register a suite built by `ctor` against `driver`
    pub fn execute<S, F>(&mut self, ctor: F, driver: Arc<dyn Driver>) -> Result<()>
    where
        S: Suite + 'static,
        F: FnOnce(Arc<Manager>) -> S,
    {
        self.execute_with_file(ctor, driver, None)
    }

    /// Register a suite and remember the file it was declared in
    pub fn execute_with_file<S, F>(
        &mut self,
        ctor: F,
        driver: Arc<dyn Driver>,
        file: Option<PathBuf>,
    ) -> Result<()>
    where
        S: Suite + 'static,
        F: FnOnce(Arc<Manager>) -> S,
    {
        let mgr = Arc::new(Manager::new(self.run.clone(), driver));
        let suite: Arc<dyn Suite> = Arc::new(ctor(mgr.clone()));

        let suite_name = suite.name();
        if suite_name.is_empty() {
            return Err(Error::InvalidConfig("suite name must not be empty".to_string()));
        }
        mgr.reset_context(&suite_name);

        let mut set = TestSet::new();
        suite.tests(&mut set);

        let settings = self.run.settings();
        let mut cases = Vec::new();
        for test in set.instantiate(&mgr) {
            let test: Arc<dyn Test> = Arc::from(test);
            let name = test.name();
            if name.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "test registered in suite '{}' has an empty name",
                    suite_name
                )));
            }

            let title = test.title();
            let timeout = test
                .timeout()
                .or_else(|| settings.default_timeout())
                .or_else(|| suite.timeout())
                .filter(|t| !t.is_zero());
            let retries = test.retries().unwrap_or(settings.retry);

            let rows = test.data_set();
            if rows.is_empty() {
                cases.push(self.case(&title, timeout, retries, &test, &mgr, None));
            } else {
                debug!("'{}' expands to {} data row(s)", title, rows.len());
                for row in rows {
                    cases.push(self.case(&title, timeout, retries, &test, &mgr, Some(row)));
                }
            }
        }

        info!("Registered suite '{}' with {} case(s)", suite_name, cases.len());

        self.runner.describe(Describe {
            title: suite_name.clone(),
            file,
            hooks: Arc::new(SuiteBinding {
                suite,
                name: suite_name,
                mgr: mgr.clone(),
            }),
            cases,
        });
        self.managers.push(mgr);
        Ok(())
    }

    fn case(
        &self,
        title: &str,
        timeout: Option<Duration>,
        retries: u32,
        test: &Arc<dyn Test>,
        mgr: &Arc<Manager>,
        row: Option<DataRow>,
    ) -> Case {
        Case {
            title: title.to_string(),
            timeout,
            retries,
            body: Arc::new(TestBinding {
                test: test.clone(),
                name: test.name(),
                mgr: mgr.clone(),
                row,
            }),
        }
    }

    /// Run every registered suite, dispose the handles and publish
    /// `terminate`
    pub async fn run(mut self) -> RunnerReport {
        info!("Running {} suite(s) for run {}", self.managers.len(), self.run.id());
        let report = self.runner.run().await;

        let mut disposed: Vec<Arc<dyn Driver>> = Vec::new();
        for mgr in &self.managers {
            let driver = mgr.driver();
            if disposed.iter().any(|d| Arc::ptr_eq(d, &driver)) {
                continue;
            }
            // The manager logs dispose failures
            let _ = mgr.dispose().await;
            disposed.push(driver);
        }

        self.run.publish(LifecycleEvent::Terminate);
        report
    }
}

/// Suite-level hooks of one describe block
struct SuiteBinding {
    suite: Arc<dyn Suite>,
    name: String,
    mgr: Arc<Manager>,
}

impl SuiteBinding {
    fn publish(&self, event: fn(crate::context::TestContext) -> LifecycleEvent) {
        self.mgr.run().publish(event(self.mgr.context()));
    }
}

#[async_trait]
impl DescribeHooks for SuiteBinding {
    async fn before_all(&self) -> Result<()> {
        let logger = self.mgr.logger();
        self.publish(LifecycleEvent::StartSetup);
        logger.info(format!("Execution ID: {}", self.mgr.uid()));

        Dispatcher::new(&self.name, &logger)
            .run(
                Hook::Setup,
                self.suite.setup(),
                |_| {},
                || self.publish(LifecycleEvent::EndSetup),
            )
            .await
    }

    async fn before_each(&self, case: &CaseInfo) -> Result<()> {
        self.mgr.update_context(|ctx| {
            ctx.hook_failed = false;
            ctx.test_name = strip_tags(&case.title).to_string();
            ctx.file = case.file.clone();
        });
        self.publish(LifecycleEvent::StartBeforeTest);

        let logger = self.mgr.logger();
        logger.info(format!("Starting Test: {}", strip_tags(&case.title)));

        Dispatcher::new(&self.name, &logger)
            .run(
                Hook::BeforeTest,
                self.suite.before_test(),
                |_| self.mgr.update_context(|ctx| ctx.hook_failed = true),
                || self.publish(LifecycleEvent::EndBeforeTest),
            )
            .await
    }

    async fn after_each(&self, case: &CaseInfo) -> Result<()> {
        if self.mgr.context().hook_failed {
            return Ok(());
        }

        let outcome = match case.state {
            CaseState::WillRetry => {
                self.publish(LifecycleEvent::Retrying);
                self.mgr.logger().warn("Retrying failed test");
                return Ok(());
            }
            CaseState::Pending => {
                warn!("'{}' reached after-test without a result", case.title);
                return Ok(());
            }
            CaseState::Terminal(outcome) => outcome,
        };

        self.mgr.update_context(|ctx| {
            ctx.test_result = Some(outcome.as_str().to_string());
            ctx.timed_out = case.timed_out;
            ctx.duration_ms = case.duration.as_millis() as u64;
        });
        self.publish(LifecycleEvent::StartAfterTest);

        let logger = self.mgr.logger();
        let result = Dispatcher::new(&self.name, &logger)
            .run(
                Hook::AfterTest,
                self.suite.after_test(),
                |_| self.mgr.update_context(|ctx| ctx.hook_failed = true),
                || self.publish(LifecycleEvent::EndAfterTest),
            )
            .await;

        let ctx = self.mgr.context();
        logger.info(format!("End of Test: {}", ctx.test_name));
        logger.info(format!("Test Result: {}", outcome.as_str()));
        logger.info(format!("Test Duration: {}ms", ctx.duration_ms));
        result
    }

    async fn after_all(&self) -> Result<()> {
        let logger = self.mgr.logger();
        self.publish(LifecycleEvent::StartTeardown);

        let result = Dispatcher::new(&self.name, &logger)
            .run(Hook::Teardown, self.suite.teardown(), |_| {}, || {
                self.mgr.run().publish(LifecycleEvent::EndTeardown(
                    self.mgr.context(),
                    self.mgr.driver(),
                ))
            })
            .await;

        logger.info("End of Suite");
        result
    }
}

/// Body of one runner case: a test instance plus its data row
struct TestBinding {
    test: Arc<dyn Test>,
    name: String,
    mgr: Arc<Manager>,
    row: Option<DataRow>,
}

#[async_trait]
impl CaseBody for TestBinding {
    async fn run(&self, limit: Option<Duration>) -> Result<Completion> {
        let run = self.mgr.run();

        if let Some(row) = &self.row {
            debug!("Data: {}", row);
            self.mgr.update_context(|ctx| ctx.data = Some(row.clone()));
        }

        if self.mgr.context().hook_failed {
            run.publish(LifecycleEvent::SkipTest(self.mgr.context()));
            return Ok(Completion::Skipped);
        }

        let logger = self.mgr.logger();
        let dispatcher = Dispatcher::new(&self.name, &logger);

        run.publish(LifecycleEvent::StartTest(self.mgr.context()));
        // The limit covers startup and body; cleanup always runs after it.
        let attempt = within(&self.name, limit, async {
            dispatcher
                .run(Hook::TestStartup, self.test.test_startup(), |_| {}, || {})
                .await?;
            dispatcher.run(Hook::Test, self.test.test(), |_| {}, || {}).await
        })
        .await;
        if let Err(e @ Error::Timeout { .. }) = &attempt {
            logger.error(e.to_string());
        }

        let cleanup = dispatcher
            .run(Hook::TestCleanup, self.test.test_cleanup(), |_| {}, || {
                run.publish(LifecycleEvent::EndTest(self.mgr.context()))
            })
            .await;

        attempt.and(cleanup)?;
        Ok(Completion::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_initialized_and_terminate_bracket_the_run() {
        let run = RunContext::with_id("run-9", Settings::default());
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();

        let executor = Executor::builder(run)
            .with_observer(Arc::new(move |event: &LifecycleEvent| {
                sink.lock().push(event.name());
            }))
            .build();
        assert_eq!(executor.run_id(), "run-9");
        assert_eq!(executor.suite_count(), 0);

        let report = executor.run().await;
        assert_eq!(report.total, 0);
        assert_eq!(*names.lock(), vec!["initialized", "terminate"]);
    }
}

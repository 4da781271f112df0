//! Run pipeline shared by the `walnut run` command and compiled suites
//!
//! A [`Launcher`] owns one run: it wires the default reporter onto the
//! executor, opens a single browser session on first use, registers suites
//! (compiled or YAML), runs them, flushes report delivery and finally runs
//! the optional post-execution script.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use walnut_core::spec::SuiteSpec;
use walnut_core::steps::SpecSuite;
use walnut_core::{
    Driver, Executor, LifecycleEvent, Manager, RunContext, RunnerReport, Suite, TagFilter,
};
use walnut_reporter::{execution_type, sinks_from_settings, DefaultReporter};
use walnut_webdriver::WebDriverClient;

/// Which observer builds reports for the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterKind {
    /// JSON report files plus configured search index and mail delivery
    #[default]
    Default,
    /// No reports
    None,
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub tags: TagFilter,
    pub reporter: ReporterKind,
    /// Executable invoked with the run id once the run has finished
    pub post_exec: Option<PathBuf>,
}

/// What a finished run produced
#[derive(Debug, Serialize)]
pub struct LaunchSummary {
    pub run_id: String,
    pub report: RunnerReport,
    /// Directory holding the JSON reports, when the default reporter ran
    pub report_dir: Option<PathBuf>,
    /// Successful sink deliveries
    pub delivered: usize,
}

impl LaunchSummary {
    pub fn success(&self) -> bool {
        self.report.success()
    }
}

pub struct Launcher {
    run: Arc<RunContext>,
    executor: Executor,
    reporter: Option<Arc<DefaultReporter>>,
    driver: Option<Arc<dyn Driver>>,
    post_exec: Option<PathBuf>,
    /// Set once `terminate` went out without running the suites
    aborted: bool,
}

impl Launcher {
    /// Create the run's executor; publishes `initialized`
    pub fn new(run: Arc<RunContext>, options: LaunchOptions) -> Result<Self> {
        let mut builder = Executor::builder(run.clone()).with_filter(options.tags.clone());

        let reporter = match options.reporter {
            ReporterKind::Default => {
                let sinks = sinks_from_settings(run.settings())?;
                let reporter = Arc::new(
                    DefaultReporter::new(run.clone(), execution_type(options.tags.tags()))
                        .with_sinks(sinks),
                );
                builder = builder.with_observer(reporter.clone());
                Some(reporter)
            }
            ReporterKind::None => None,
        };

        Ok(Self {
            run,
            executor: builder.build(),
            reporter,
            driver: None,
            post_exec: options.post_exec,
            aborted: false,
        })
    }

    /// Use `driver` instead of opening a WebDriver session
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn run_id(&self) -> &str {
        self.run.id()
    }

    pub fn suite_count(&self) -> usize {
        self.executor.suite_count()
    }

    /// The run's browser session, opened on first use
    async fn driver(&mut self) -> Result<Arc<dyn Driver>> {
        if self.aborted {
            bail!("run {} was aborted", self.run.id());
        }
        if let Some(driver) = &self.driver {
            return Ok(driver.clone());
        }

        let settings = self.run.settings();
        let client = WebDriverClient::connect(settings.browser, &settings.webdriver)
            .await
            .with_context(|| {
                format!(
                    "cannot open a {} session at {}",
                    settings.browser, settings.webdriver.url
                )
            })?;
        let driver: Arc<dyn Driver> = Arc::new(client);
        self.driver = Some(driver.clone());
        Ok(driver)
    }

    /// Register a compiled suite.
    ///
    /// A failure aborts the run, see [`Launcher::abort`].
    pub async fn add_suite<S, F>(&mut self, ctor: F) -> Result<()>
    where
        S: Suite + 'static,
        F: FnOnce(Arc<Manager>) -> S,
    {
        let result = match self.driver().await {
            Ok(driver) => self.executor.execute(ctor, driver).map_err(Into::into),
            Err(e) => Err(e),
        };
        self.abort_on_error(result).await
    }

    /// Register every YAML suite under `path`; returns how many were found.
    ///
    /// A failure aborts the run, see [`Launcher::abort`].
    pub async fn add_suite_files(&mut self, path: &Path) -> Result<usize> {
        let result = self.register_files(path).await;
        self.abort_on_error(result).await
    }

    async fn register_files(&mut self, path: &Path) -> Result<usize> {
        let specs = SuiteSpec::load_all(path)
            .with_context(|| format!("cannot load suites from {}", path.display()))?;
        if specs.is_empty() {
            warn!("No suite files found under {}", path.display());
            return Ok(0);
        }

        let count = specs.len();
        for spec in specs {
            let file = spec.source.clone();
            let spec = Arc::new(spec);
            let driver = self.driver().await?;
            self.executor
                .execute_with_file(move |mgr| SpecSuite::new(spec, mgr), driver, file)?;
        }
        debug!("Registered {} suite(s) from {}", count, path.display());
        Ok(count)
    }

    async fn abort_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.abort().await;
        }
        result
    }

    /// End the run without executing it: dispose the browser session, if one
    /// was opened, and publish `terminate`. Later calls do nothing and
    /// [`Launcher::launch`] refuses to run.
    pub async fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        warn!("Aborting run {} before execution", self.run.id());

        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.dispose().await {
                warn!("Failed to dispose browser session: {}", e);
            }
        }
        self.run.publish(LifecycleEvent::Terminate);
    }

    /// Run every registered suite, deliver reports and run the post-exec script
    pub async fn launch(self) -> Result<LaunchSummary> {
        let Self {
            run,
            executor,
            reporter,
            post_exec,
            aborted,
            ..
        } = self;

        if aborted {
            bail!("run {} was aborted during suite registration", run.id());
        }

        if executor.suite_count() == 0 {
            warn!("No suites registered for run {}", run.id());
        }
        let report = executor.run().await;

        let (report_dir, delivered) = match &reporter {
            Some(reporter) => (Some(reporter.report_dir()), reporter.flush().await),
            None => (None, 0),
        };

        if let Some(script) = &post_exec {
            run_post_exec(script, run.id()).await?;
        }

        Ok(LaunchSummary {
            run_id: run.id().to_string(),
            report,
            report_dir,
            delivered,
        })
    }
}

async fn run_post_exec(script: &Path, run_id: &str) -> Result<()> {
    info!("Running post-execution script {}", script.display());
    let output = Command::new(script)
        .arg(run_id)
        .output()
        .await
        .with_context(|| format!("cannot start {}", script.display()))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            script.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    debug!(
        "Post-execution output: {}",
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(())
}

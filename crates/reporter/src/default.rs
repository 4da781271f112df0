//! Default reporter
//!
//! Builds suite and execution reports from the lifecycle event stream,
//! writes them as JSON under `<report_path>/<run id>/` and queues them for
//! delivery. Delivery is asynchronous and happens in [`DefaultReporter::flush`]
//! once the run has terminated.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use walnut_core::{LifecycleEvent, LogRecord, Observer, RunContext, TestContext};

use crate::error::ReportResult;
use crate::model::{
    capitalize, ms_to_time, Document, ExecutionReport, ReportHeader, ScriptRecord, SuiteReport,
    Summary, Verification,
};
use crate::sinks::ReportSink;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Default)]
struct Stats {
    total: usize,
    passed: usize,
    failed: usize,
    not_run: usize,
    retried: HashSet<String>,
}

impl Stats {
    fn summary(&self, name: Option<String>, started: DateTime<Local>) -> Summary {
        let elapsed = (Local::now() - started).num_milliseconds().max(0) as u64;
        Summary {
            name,
            run_started: started.format(TIME_FORMAT).to_string(),
            elapsed: ms_to_time(elapsed),
            total_tests: self.total,
            passed: self.passed,
            failed: self.failed,
            retried: self.retried.len(),
            not_run: self.not_run,
        }
    }
}

#[derive(Default)]
struct State {
    execution: Option<ExecutionReport>,
    execution_stats: Stats,
    execution_start: Option<DateTime<Local>>,

    suite: Option<SuiteReport>,
    suite_stats: Stats,
    suite_start: Option<DateTime<Local>>,

    test_start: Option<DateTime<Local>>,
    /// Verifications of the latest test attempt
    verifications: Vec<Verification>,
    /// Set between `start test` and `end test`
    collecting: bool,

    finished_suites: Vec<SuiteReport>,
    outbox: Vec<Document>,
}

pub struct DefaultReporter {
    run: Arc<RunContext>,
    execution_type: String,
    sinks: Vec<Arc<dyn ReportSink>>,
    state: Mutex<State>,
}

impl DefaultReporter {
    pub fn new(run: Arc<RunContext>, execution_type: impl Into<String>) -> Self {
        Self {
            run,
            execution_type: execution_type.into(),
            sinks: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn ReportSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Directory the run's report files are written to
    pub fn report_dir(&self) -> PathBuf {
        self.run.settings().run_report_dir(self.run.id())
    }

    /// Snapshot of the execution report
    pub fn execution_report(&self) -> Option<ExecutionReport> {
        self.state.lock().execution.clone()
    }

    /// Snapshot of every closed suite report
    pub fn suite_reports(&self) -> Vec<SuiteReport> {
        self.state.lock().finished_suites.clone()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().outbox.len()
    }

    /// Deliver queued documents to every sink.
    ///
    /// Documents are sent in the order they were queued. Returns the number
    /// of successful deliveries; failures are logged and do not stop the
    /// remaining deliveries.
    pub async fn flush(&self) -> usize {
        let outbox = std::mem::take(&mut self.state.lock().outbox);
        let mut delivered = 0;
        for document in &outbox {
            for sink in &self.sinks {
                match sink.deliver(document).await {
                    Ok(()) => delivered += 1,
                    Err(e) => warn!(
                        "Failed to deliver {} document to {}: {}",
                        document.kind(),
                        sink.name(),
                        e
                    ),
                }
            }
        }
        debug!("Flushed {} document(s) to {} sink(s)", outbox.len(), self.sinks.len());
        delivered
    }

    fn header(&self, report_type: &str) -> ReportHeader {
        ReportHeader::new(self.run.id(), self.run.settings(), &self.execution_type, report_type)
    }

    fn log_file(&self) -> String {
        let id = self.run.id();
        self.run
            .settings()
            .run_log_dir(id)
            .join(format!("{}.log", id))
            .display()
            .to_string()
    }

    fn on_initialized(&self, state: &mut State) {
        if let Err(e) = std::fs::create_dir_all(self.report_dir()) {
            warn!("Cannot create report directory {}: {}", self.report_dir().display(), e);
        }
        state.execution = Some(ExecutionReport {
            header: self.header("Execution"),
            suites: Vec::new(),
            summary: None,
        });
        state.execution_stats = Stats::default();
        state.execution_start = Some(Local::now());
    }

    fn on_start_setup(&self, state: &mut State) {
        state.suite = Some(SuiteReport {
            header: self.header("Suite"),
            scripts: Vec::new(),
            summary: None,
        });
        state.suite_stats = Stats::default();
        state.suite_start = Some(Local::now());
    }

    fn on_log(&self, state: &mut State, record: &LogRecord) {
        if state.collecting && record.is_validation() {
            state.verifications.push(Verification {
                title: record.event_title.clone().unwrap_or_default(),
                details: record.message.clone(),
                result: record.state.clone().unwrap_or_default(),
                time: record.time.with_timezone(&Local).format(TIME_FORMAT).to_string(),
            });
        }

        let ships_logs = self.run.settings().search_index().map(|s| s.ship_logs).unwrap_or(false);
        if ships_logs {
            match serde_json::to_value(record) {
                Ok(value) => state.outbox.push(Document::Log(value)),
                Err(e) => warn!("Cannot serialize log record: {}", e),
            }
        }
    }

    fn on_end_after_test(&self, state: &mut State, ctx: &TestContext) {
        let result = ctx.test_result.clone().unwrap_or_default();
        let record = ScriptRecord {
            name: ctx.test_name.clone(),
            result: capitalize(&result),
            retried: state.suite_stats.retried.contains(&ctx.test_name),
            start_time: state
                .test_start
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            end_time: None,
            elapsed: ms_to_time(ctx.duration_ms),
            log_file: Some(self.log_file()),
            verifications: std::mem::take(&mut state.verifications),
        };

        for stats in [&mut state.suite_stats, &mut state.execution_stats] {
            stats.total += 1;
            if ctx.passed() {
                stats.passed += 1;
            } else {
                stats.failed += 1;
            }
        }
        push_script(state, record);
    }

    fn on_skip_test(&self, state: &mut State, ctx: &TestContext) {
        let retried = state.suite_stats.retried.contains(&ctx.test_name);
        for stats in [&mut state.suite_stats, &mut state.execution_stats] {
            stats.total += 1;
            stats.not_run += 1;
        }
        push_script(state, ScriptRecord::not_run(&ctx.test_name, retried));
    }

    fn on_end_teardown(&self, state: &mut State, ctx: &TestContext) {
        let Some(mut suite) = state.suite.take() else {
            warn!("end teardown for '{}' without a suite report", ctx.suite_name);
            return;
        };
        let started = state.suite_start.unwrap_or_else(Local::now);
        let summary = state.suite_stats.summary(Some(ctx.suite_name.clone()), started);

        if let Some(execution) = state.execution.as_mut() {
            execution.suites.push(summary.clone());
        }
        suite.summary = Some(summary);

        let path = self.report_dir().join(format!("{}.json", file_stem(&ctx.suite_name)));
        match write_json(&path, &suite) {
            Ok(()) => info!("Suite report written to {}", path.display()),
            Err(e) => warn!("Cannot write suite report {}: {}", path.display(), e),
        }

        state.outbox.push(Document::Suite(suite.clone()));
        state.finished_suites.push(suite);
    }

    fn on_terminate(&self, state: &mut State) {
        let started = state.execution_start.unwrap_or_else(Local::now);
        let summary = state.execution_stats.summary(None, started);

        let Some(execution) = state.execution.as_mut() else {
            warn!("terminate without an execution report");
            return;
        };
        execution.summary = Some(summary);

        let path = self.report_dir().join(format!("{}.json", self.run.id()));
        match write_json(&path, &*execution) {
            Ok(()) => info!("Execution report written to {}", path.display()),
            Err(e) => warn!("Cannot write execution report {}: {}", path.display(), e),
        }
        let document = Document::Execution(execution.clone());
        state.outbox.push(document);
    }
}

impl Observer for DefaultReporter {
    fn on_event(&self, event: &LifecycleEvent) {
        let mut state = self.state.lock();
        match event {
            LifecycleEvent::Initialized { .. } => self.on_initialized(&mut state),
            LifecycleEvent::StartSetup(_) => self.on_start_setup(&mut state),
            LifecycleEvent::StartTest(_) => {
                state.test_start = Some(Local::now());
                state.verifications.clear();
                state.collecting = true;
            }
            LifecycleEvent::EndTest(_) => state.collecting = false,
            LifecycleEvent::Log(record) => self.on_log(&mut state, record),
            LifecycleEvent::Retrying(ctx) => {
                state.suite_stats.retried.insert(ctx.test_name.clone());
                state.execution_stats.retried.insert(ctx.test_name.clone());
            }
            LifecycleEvent::EndAfterTest(ctx) => self.on_end_after_test(&mut state, ctx),
            LifecycleEvent::SkipTest(ctx) => self.on_skip_test(&mut state, ctx),
            LifecycleEvent::EndTeardown(ctx, _) => self.on_end_teardown(&mut state, ctx),
            LifecycleEvent::Terminate => self.on_terminate(&mut state),
            LifecycleEvent::EndSetup(_)
            | LifecycleEvent::StartBeforeTest(_)
            | LifecycleEvent::EndBeforeTest(_)
            | LifecycleEvent::StartAfterTest(_)
            | LifecycleEvent::StartTeardown(_) => {}
        }
    }
}

fn push_script(state: &mut State, record: ScriptRecord) {
    match state.suite.as_mut() {
        Some(suite) => suite.scripts.push(record),
        None => warn!("script record for '{}' outside a suite", record.name),
    }
}

fn file_stem(suite_name: &str) -> String {
    suite_name.replace(['/', '\\'], "_")
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

//! DefaultReporter fed by a real executor run

use anyhow::bail;
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use walnut_core::driver::{DriverResult, ElementRef, Locator, Target};
use walnut_core::settings::MailSettings;
use walnut_core::{Driver, Executor, HookResult, Manager, RunContext, Settings, Suite, Test, TestSet};
use walnut_reporter::{DefaultReporter, MailRelay, ScriptRecord};

struct NullDriver;

#[async_trait]
impl Driver for NullDriver {
    async fn navigate(&self, _url: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> DriverResult<ElementRef> {
        Ok(ElementRef(locator.to_string()))
    }

    async fn find_elements(&self, _locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        Ok(Vec::new())
    }

    async fn click(&self, _target: &Target) -> DriverResult<()> {
        Ok(())
    }

    async fn move_to(&self, _target: &Target) -> DriverResult<()> {
        Ok(())
    }

    async fn send_keys(&self, _element: &ElementRef, _text: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn clear(&self, _element: &ElementRef) -> DriverResult<()> {
        Ok(())
    }

    async fn text(&self, _element: &ElementRef) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn attribute(&self, _element: &ElementRef, _name: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn is_displayed(&self, _element: &ElementRef) -> DriverResult<bool> {
        Ok(true)
    }

    async fn execute_script(&self, _script: &str, _args: Vec<Value>) -> DriverResult<Value> {
        Ok(Value::Null)
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn dispose(&self) -> DriverResult<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CheckSpec {
    name: String,
    /// Attempts that fail before one passes
    failures: Arc<AtomicU32>,
    retries: Option<u32>,
}

impl CheckSpec {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

struct Check {
    spec: CheckSpec,
    mgr: Arc<Manager>,
}

#[async_trait]
impl Test for Check {
    fn name(&self) -> String {
        self.spec.name.clone()
    }

    fn retries(&self) -> Option<u32> {
        self.spec.retries
    }

    async fn test(&self) -> HookResult {
        let logger = self.mgr.logger();
        if self.spec.failures.load(Ordering::SeqCst) > 0 {
            self.spec.failures.fetch_sub(1, Ordering::SeqCst);
            logger.validation("Cart total", "expected 3 items", false);
            bail!("cart total mismatch");
        }
        logger.validation("Cart total", "3 items", true);
        Ok(())
    }
}

struct CheckSuite {
    name: String,
    tests: Vec<CheckSpec>,
    skip_all: bool,
}

impl CheckSuite {
    fn new(name: &str, tests: Vec<CheckSpec>) -> Self {
        Self {
            name: name.to_string(),
            tests,
            skip_all: false,
        }
    }
}

#[async_trait]
impl Suite for CheckSuite {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn tests(&self, set: &mut TestSet) {
        for spec in &self.tests {
            let spec = spec.clone();
            set.add_test(move |mgr| Check {
                spec: spec.clone(),
                mgr,
            });
        }
    }

    async fn before_test(&self) -> HookResult {
        if self.skip_all {
            bail!("login page down");
        }
        Ok(())
    }
}

fn run_in(dir: &TempDir) -> Arc<RunContext> {
    let settings = Settings {
        report_path: dir.path().join("reports"),
        log_path: dir.path().join("logs"),
        ..Default::default()
    };
    RunContext::with_id("run-42", settings)
}

async fn run_suites(
    run: Arc<RunContext>,
    suites: Vec<CheckSuite>,
) -> Arc<DefaultReporter> {
    let reporter = Arc::new(DefaultReporter::new(run.clone(), "All"));
    let mut executor = Executor::builder(run).with_observer(reporter.clone()).build();
    let driver: Arc<dyn Driver> = Arc::new(NullDriver);
    for suite in suites {
        executor.execute(move |_| suite, driver.clone()).unwrap();
    }
    executor.run().await;
    reporter
}

#[tokio::test]
async fn test_two_suites_summary() {
    let dir = TempDir::new().unwrap();
    let reporter = run_suites(
        run_in(&dir),
        vec![
            CheckSuite::new("Login", vec![CheckSpec::named("A"), CheckSpec::named("B")]),
            CheckSuite::new("Cart", vec![CheckSpec::named("C"), CheckSpec::named("D")]),
        ],
    )
    .await;

    let execution = reporter.execution_report().unwrap();
    let summary = execution.summary.unwrap();
    assert_eq!(summary.total_tests, 4);
    assert_eq!(summary.passed, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.not_run, 0);

    let names: Vec<_> = execution
        .suites
        .iter()
        .map(|s| s.name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["Login", "Cart"]);

    let report_dir = reporter.report_dir();
    assert!(report_dir.join("run-42.json").exists());
    assert!(report_dir.join("Login.json").exists());
    assert!(report_dir.join("Cart.json").exists());

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(report_dir.join("run-42.json")).unwrap())
            .unwrap();
    assert_eq!(written["ExecutionId"], "run-42");
    assert_eq!(written["ReportType"], "Execution");
    assert_eq!(written["Summary"]["TotalTests"], 4);

    // two suite documents then the execution document
    assert_eq!(reporter.pending(), 3);
}

#[tokio::test]
async fn test_script_records_carry_verifications() {
    let dir = TempDir::new().unwrap();
    let reporter = run_suites(
        run_in(&dir),
        vec![CheckSuite::new("Cart", vec![CheckSpec::named("Totals")])],
    )
    .await;

    let suites = reporter.suite_reports();
    assert_eq!(suites.len(), 1);
    let script = &suites[0].scripts[0];
    assert_eq!(script.name, "Totals");
    assert_eq!(script.result, "Passed");
    assert!(!script.retried);
    assert_eq!(script.verifications.len(), 1);
    assert_eq!(script.verifications[0].title, "Cart total");
    assert_eq!(script.verifications[0].result, "passed");
    assert!(script.log_file.as_deref().unwrap().ends_with("run-42.log"));
}

#[tokio::test]
async fn test_retried_test_is_flagged() {
    let dir = TempDir::new().unwrap();
    let flaky = CheckSpec {
        name: "Flaky".to_string(),
        failures: Arc::new(AtomicU32::new(1)),
        retries: Some(1),
    };
    let reporter = run_suites(run_in(&dir), vec![CheckSuite::new("Cart", vec![flaky])]).await;

    let suites = reporter.suite_reports();
    let script = &suites[0].scripts[0];
    assert_eq!(script.result, "Passed");
    assert!(script.retried);
    // only the final attempt's verifications are kept
    assert_eq!(script.verifications.len(), 1);
    assert_eq!(script.verifications[0].result, "passed");

    let summary = reporter.execution_report().unwrap().summary.unwrap();
    assert_eq!(summary.total_tests, 1);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.retried, 1);
}

#[tokio::test]
async fn test_skipped_tests_are_not_run() {
    let dir = TempDir::new().unwrap();
    let mut suite = CheckSuite::new("Login", vec![CheckSpec::named("A"), CheckSpec::named("B")]);
    suite.skip_all = true;
    let reporter = run_suites(run_in(&dir), vec![suite]).await;

    let suites = reporter.suite_reports();
    let results: Vec<_> = suites[0].scripts.iter().map(|s| s.result.as_str()).collect();
    assert_eq!(results, vec![ScriptRecord::NOT_RUN, ScriptRecord::NOT_RUN]);

    let summary = suites[0].summary.clone().unwrap();
    assert_eq!(summary.total_tests, 2);
    assert_eq!(summary.not_run, 2);
    assert_eq!(summary.passed, 0);
}

#[tokio::test]
async fn test_flush_mails_execution_summary() {
    let received = Arc::new(Mutex::new(Vec::<Value>::new()));
    let app = Router::new()
        .route(
            "/send",
            post(
                |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    received.lock().push(body);
                    Json(serde_json::json!({ "queued": true }))
                },
            ),
        )
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let relay = MailRelay::new(MailSettings {
        relay_url: format!("http://{}/send", addr),
        from: "qa@example.com".to_string(),
        to: vec!["team@example.com".to_string()],
        subject: "Automation Results".to_string(),
        report_url: None,
    })
    .unwrap();

    let dir = TempDir::new().unwrap();
    let run = run_in(&dir);
    let reporter = Arc::new(DefaultReporter::new(run.clone(), "All").with_sink(Arc::new(relay)));
    let mut executor = Executor::builder(run).with_observer(reporter.clone()).build();
    executor
        .execute(
            |_| CheckSuite::new("Login", vec![CheckSpec::named("A")]),
            Arc::new(NullDriver),
        )
        .unwrap();
    executor.run().await;

    // suite document is ignored by the relay, execution document is mailed
    assert_eq!(reporter.flush().await, 2);
    assert_eq!(reporter.pending(), 0);

    let mails = received.lock();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0]["subject"], "Automation Results");
    assert!(mails[0]["html"]
        .as_str()
        .unwrap()
        .contains("<td>Pass Percentage:</td><td>100%</td>"));
}

//! Hook runner: describe blocks, cases, retries and timeouts
//!
//! The runner knows nothing about suites or tests. It schedules describe
//! blocks one at a time, calls their hooks around every case attempt, and
//! reports the state of each attempt to `after_each` as a [`CaseState`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::context::title_tags;
use crate::error::{Error, Result};

/// Terminal outcome of a case attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    Passed,
    Failed,
    /// The case ran but chose not to execute its body
    Skipped,
}

impl CaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseOutcome::Passed => "passed",
            CaseOutcome::Failed => "failed",
            CaseOutcome::Skipped => "skipped",
        }
    }
}

/// State of the current attempt as seen by `after_each`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    /// The attempt has not finished
    Pending,
    /// The attempt finished and will not be repeated
    Terminal(CaseOutcome),
    /// The attempt failed and the runner will try again
    WillRetry,
}

/// What a case body reports back when it returns without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Ran,
    Skipped,
}

/// Per-case information handed to hooks
#[derive(Debug, Clone)]
pub struct CaseInfo {
    pub title: String,
    pub file: Option<PathBuf>,
    pub state: CaseState,
    pub timed_out: bool,
    pub duration: Duration,
    /// 1-based attempt number
    pub attempt: u32,
}

/// Describe-level hooks
#[async_trait]
pub trait DescribeHooks: Send + Sync {
    async fn before_all(&self) -> Result<()>;
    async fn before_each(&self, case: &CaseInfo) -> Result<()>;
    async fn after_each(&self, case: &CaseInfo) -> Result<()>;
    async fn after_all(&self) -> Result<()>;
}

/// Body of one registered case.
///
/// The runner hands each attempt its time limit. Bodies bound their own
/// work with [`within`] so that cleanup still runs after the limit expires;
/// an [`Error::Timeout`] result marks the attempt as timed out.
#[async_trait]
pub trait CaseBody: Send + Sync {
    async fn run(&self, limit: Option<Duration>) -> Result<Completion>;
}

/// Await `fut` for at most `limit`; expiry drops it and yields
/// [`Error::Timeout`]
pub async fn within<T, F>(title: &str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            title: title.to_string(),
            ms: limit.as_millis() as u64,
        }),
    }
}

pub struct Case {
    pub title: String,
    /// `None` disables the timeout
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub body: Arc<dyn CaseBody>,
}

pub struct Describe {
    pub title: String,
    pub file: Option<PathBuf>,
    pub hooks: Arc<dyn DescribeHooks>,
    pub cases: Vec<Case>,
}

/// OR-filter over the `#tag` suffixes of case titles
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    tags: Vec<String>,
}

impl TagFilter {
    /// Parse a comma separated list; whitespace is ignored
    pub fn parse(list: &str) -> Self {
        let tags = list
            .split(',')
            .map(|t| t.trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn matches(&self, title: &str) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        title_tags(title)
            .iter()
            .any(|tag| self.tags.iter().any(|wanted| wanted == tag))
    }
}

/// Result of one case after all attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub title: String,
    pub outcome: CaseOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub error: Option<String>,
}

/// Result of one describe block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeReport {
    pub title: String,
    pub cases: Vec<CaseReport>,
    /// Hook failures reported by the describe's hooks
    pub hook_failures: Vec<String>,
    /// Cases that never ran because a hook failed
    pub not_run: Vec<String>,
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
    pub duration_ms: u64,
    pub suites: Vec<DescribeReport>,
}

impl RunnerReport {
    /// No case failed and no hook failed
    pub fn success(&self) -> bool {
        self.failed == 0 && self.suites.iter().all(|s| s.hook_failures.is_empty())
    }
}

#[derive(Default)]
pub struct Runner {
    describes: Vec<Describe>,
    filter: TagFilter,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: TagFilter) -> Self {
        Self {
            describes: Vec::new(),
            filter,
        }
    }

    pub fn describe(&mut self, describe: Describe) {
        self.describes.push(describe);
    }

    pub fn describe_count(&self) -> usize {
        self.describes.len()
    }

    /// Run every registered describe block, in registration order
    pub async fn run(&mut self) -> RunnerReport {
        let start = Instant::now();
        let mut report = RunnerReport::default();

        for describe in std::mem::take(&mut self.describes) {
            let cases: Vec<Case> = describe
                .cases
                .into_iter()
                .filter(|c| self.filter.matches(&c.title))
                .collect();

            if cases.is_empty() {
                debug!("No selected cases in '{}', skipping", describe.title);
                continue;
            }

            let result = run_describe(&describe.title, describe.file, describe.hooks, cases).await;

            for case in &result.cases {
                report.total += 1;
                match case.outcome {
                    CaseOutcome::Passed => report.passed += 1,
                    CaseOutcome::Failed => report.failed += 1,
                    CaseOutcome::Skipped => report.skipped += 1,
                }
            }
            report.total += result.not_run.len();
            report.not_run += result.not_run.len();
            report.suites.push(result);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Runner finished: {} passed, {} failed, {} skipped, {} not run ({} ms)",
            report.passed, report.failed, report.skipped, report.not_run, report.duration_ms
        );

        report
    }
}

async fn run_describe(
    title: &str,
    file: Option<PathBuf>,
    hooks: Arc<dyn DescribeHooks>,
    cases: Vec<Case>,
) -> DescribeReport {
    info!("Running '{}' ({} case(s))", title, cases.len());

    let mut report = DescribeReport {
        title: title.to_string(),
        cases: Vec::new(),
        hook_failures: Vec::new(),
        not_run: Vec::new(),
    };

    if let Err(e) = hooks.before_all().await {
        error!("✗ '{}' before all hook: {}", title, e);
        report.hook_failures.push(format!("before all: {}", e));
        report.not_run = cases.into_iter().map(|c| c.title).collect();
    } else {
        let mut remaining = cases.into_iter();
        while let Some(case) = remaining.next() {
            match run_case(&case, file.clone(), hooks.as_ref()).await {
                Ok(case_report) => report.cases.push(case_report),
                Err(hook_error) => {
                    error!("✗ '{}' each hook on '{}': {}", title, case.title, hook_error);
                    report.hook_failures.push(hook_error);
                    report.not_run.push(case.title.clone());
                    report.not_run.extend(remaining.by_ref().map(|c| c.title));
                }
            }
        }
    }

    if let Err(e) = hooks.after_all().await {
        error!("✗ '{}' after all hook: {}", title, e);
        report.hook_failures.push(format!("after all: {}", e));
    }

    report
}

/// Run one case through all of its attempts.
///
/// `Err` carries a before/after-each hook failure, which aborts the rest of
/// the describe block.
async fn run_case(
    case: &Case,
    file: Option<PathBuf>,
    hooks: &dyn DescribeHooks,
) -> std::result::Result<CaseReport, String> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut info = CaseInfo {
            title: case.title.clone(),
            file: file.clone(),
            state: CaseState::Pending,
            timed_out: false,
            duration: Duration::ZERO,
            attempt,
        };

        hooks
            .before_each(&info)
            .await
            .map_err(|e| format!("before each: {}", e))?;

        let start = Instant::now();
        let result = case.body.run(case.timeout).await;
        info.duration = start.elapsed();
        info.timed_out = matches!(result, Err(Error::Timeout { .. }));

        let (outcome, error) = match result {
            Ok(Completion::Ran) => (CaseOutcome::Passed, None),
            Ok(Completion::Skipped) => (CaseOutcome::Skipped, None),
            Err(e) => (CaseOutcome::Failed, Some(e.to_string())),
        };

        let will_retry = outcome == CaseOutcome::Failed && attempt <= case.retries;
        info.state = if will_retry {
            CaseState::WillRetry
        } else {
            CaseState::Terminal(outcome)
        };

        hooks
            .after_each(&info)
            .await
            .map_err(|e| format!("after each: {}", e))?;

        if will_retry {
            warn!(
                "↻ {} failed on attempt {} of {}: {}",
                case.title,
                attempt,
                case.retries + 1,
                error.as_deref().unwrap_or("unknown error")
            );
            continue;
        }

        let duration_ms = info.duration.as_millis() as u64;
        match outcome {
            CaseOutcome::Passed => info!("✓ {} ({} ms)", case.title, duration_ms),
            CaseOutcome::Skipped => info!("- {} (not run)", case.title),
            CaseOutcome::Failed => error!(
                "✗ {} - {}",
                case.title,
                error.as_deref().unwrap_or("unknown error")
            ),
        }

        return Ok(CaseReport {
            title: case.title.clone(),
            outcome,
            attempts: attempt,
            duration_ms,
            timed_out: info.timed_out,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
        fail_before_all: bool,
    }

    #[async_trait]
    impl DescribeHooks for Journal {
        async fn before_all(&self) -> Result<()> {
            self.entries.lock().push("before_all".to_string());
            if self.fail_before_all {
                return Err(Error::InvalidConfig("setup broke".to_string()));
            }
            Ok(())
        }

        async fn before_each(&self, case: &CaseInfo) -> Result<()> {
            self.entries.lock().push(format!("before_each:{}", case.title));
            Ok(())
        }

        async fn after_each(&self, case: &CaseInfo) -> Result<()> {
            let state = match case.state {
                CaseState::Pending => "pending".to_string(),
                CaseState::WillRetry => "retry".to_string(),
                CaseState::Terminal(o) => o.as_str().to_string(),
            };
            self.entries.lock().push(format!("after_each:{}:{}", case.title, state));
            Ok(())
        }

        async fn after_all(&self) -> Result<()> {
            self.entries.lock().push("after_all".to_string());
            Ok(())
        }
    }

    struct Flaky {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl CaseBody for Flaky {
        async fn run(&self, _limit: Option<Duration>) -> Result<Completion> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::InvalidConfig("flaky".to_string()));
            }
            Ok(Completion::Ran)
        }
    }

    struct Slow;

    #[async_trait]
    impl CaseBody for Slow {
        async fn run(&self, limit: Option<Duration>) -> Result<Completion> {
            within("Slow", limit, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await?;
            Ok(Completion::Ran)
        }
    }

    fn case(title: &str, retries: u32, failures: u32) -> Case {
        Case {
            title: title.to_string(),
            timeout: None,
            retries,
            body: Arc::new(Flaky {
                failures_left: AtomicU32::new(failures),
            }),
        }
    }

    #[test]
    fn test_tag_filter() {
        let filter = TagFilter::parse("smoke, regression");
        assert!(filter.matches("Login #smoke"));
        assert!(filter.matches("Pay #auth #regression"));
        assert!(!filter.matches("Logout #auth"));
        assert!(!filter.matches("smoke test"));
        assert!(TagFilter::parse("").matches("anything"));
    }

    #[tokio::test]
    async fn test_retry_reports_will_retry_then_terminal() {
        let journal = Arc::new(Journal::default());
        let mut runner = Runner::new();
        runner.describe(Describe {
            title: "Suite".to_string(),
            file: None,
            hooks: journal.clone(),
            cases: vec![case("A", 2, 1)],
        });

        let report = runner.run().await;
        assert_eq!(report.passed, 1);
        assert_eq!(report.suites[0].cases[0].attempts, 2);
        assert_eq!(
            *journal.entries.lock(),
            vec![
                "before_all",
                "before_each:A",
                "after_each:A:retry",
                "before_each:A",
                "after_each:A:passed",
                "after_all",
            ]
        );
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let journal = Arc::new(Journal::default());
        let mut runner = Runner::new();
        runner.describe(Describe {
            title: "Suite".to_string(),
            file: None,
            hooks: journal.clone(),
            cases: vec![case("A", 1, 5)],
        });

        let report = runner.run().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.suites[0].cases[0].attempts, 2);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_before_all_failure_marks_cases_not_run() {
        let journal = Arc::new(Journal {
            fail_before_all: true,
            ..Default::default()
        });
        let mut runner = Runner::new();
        runner.describe(Describe {
            title: "Suite".to_string(),
            file: None,
            hooks: journal.clone(),
            cases: vec![case("A", 0, 0), case("B", 0, 0)],
        });

        let report = runner.run().await;
        assert_eq!(report.not_run, 2);
        assert_eq!(report.suites[0].hook_failures.len(), 1);
        assert_eq!(*journal.entries.lock(), vec!["before_all", "after_all"]);
    }

    #[tokio::test]
    async fn test_filter_skips_empty_describe() {
        let journal = Arc::new(Journal::default());
        let mut runner = Runner::with_filter(TagFilter::parse("smoke"));
        runner.describe(Describe {
            title: "Suite".to_string(),
            file: None,
            hooks: journal.clone(),
            cases: vec![case("A #regression", 0, 0)],
        });

        let report = runner.run().await;
        assert_eq!(report.total, 0);
        assert!(journal.entries.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_case() {
        let journal = Arc::new(Journal::default());
        let mut runner = Runner::new();
        runner.describe(Describe {
            title: "Suite".to_string(),
            file: None,
            hooks: journal.clone(),
            cases: vec![Case {
                title: "Slow".to_string(),
                timeout: Some(Duration::from_millis(50)),
                retries: 0,
                body: Arc::new(Slow),
            }],
        });

        let report = runner.run().await;
        let case = &report.suites[0].cases[0];
        assert_eq!(case.outcome, CaseOutcome::Failed);
        assert!(case.timed_out);
    }
}

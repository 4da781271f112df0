//! Step interpreter and suite/test bindings for YAML suite files

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::data::DataRow;
use crate::driver::{wait_until, Condition, Driver, Locator, Target};
use crate::entity::{HookResult, Suite, Test, TestSet};
use crate::logger::TestLogger;
use crate::manager::Manager;
use crate::spec::{SuiteSpec, TestSpec, TestStep, WaitState};

const NAVIGATE_WAIT: Duration = Duration::from_secs(5);

/// Runs steps against the manager's driver
pub struct StepRunner<'a> {
    mgr: &'a Manager,
    driver: Arc<dyn Driver>,
    logger: TestLogger,
    row: Option<DataRow>,
}

impl<'a> StepRunner<'a> {
    pub fn new(mgr: &'a Manager) -> Self {
        Self {
            mgr,
            driver: mgr.driver(),
            logger: mgr.logger(),
            row: mgr.data(),
        }
    }

    /// Run `steps` in order, stopping at the first failure
    pub async fn run_all(&self, steps: &[TestStep]) -> HookResult {
        for (idx, step) in steps.iter().enumerate() {
            let start = Instant::now();
            self.execute(step)
                .await
                .with_context(|| format!("step {} ({}) failed", idx + 1, step_name(step)))?;
            debug!("{} done in {} ms", step_name(step), start.elapsed().as_millis());
        }
        Ok(())
    }

    pub async fn execute(&self, step: &TestStep) -> HookResult {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let url = self.resolve_url(&self.fill(url));
                self.driver.navigate(&url).await?;
                if let Some(selector) = wait_for_selector {
                    let condition = Condition::Visible(self.locator(selector));
                    wait_until(self.driver.as_ref(), &condition, NAVIGATE_WAIT).await?;
                }
            }
            TestStep::Click { selector, x, y } => {
                let target = match (selector, x, y) {
                    (Some(selector), _, _) => {
                        Target::Element(self.driver.find_element(&self.locator(selector)).await?)
                    }
                    (None, Some(x), Some(y)) => Target::Offset { x: *x, y: *y },
                    _ => bail!("click needs a selector or both x and y"),
                };
                self.driver.click(&target).await?;
            }
            TestStep::Fill { selector, value, clear_first } => {
                let element = self.driver.find_element(&self.locator(selector)).await?;
                if *clear_first {
                    self.driver.clear(&element).await?;
                }
                self.driver.send_keys(&element, &self.fill(value)).await?;
            }
            TestStep::Wait { selector, timeout_ms, state } => {
                let locator = self.locator(selector);
                let condition = match state {
                    WaitState::Visible => Condition::Visible(locator),
                    WaitState::Attached => Condition::Located(locator),
                };
                wait_until(self.driver.as_ref(), &condition, Duration::from_millis(*timeout_ms))
                    .await?;
            }
            TestStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            TestStep::Assert { selector, visible, text, text_contains, attribute } => {
                let locator = self.locator(selector);
                let found = self.driver.find_elements(&locator).await?;

                if let Some(expect_visible) = visible {
                    let mut shown = false;
                    if let Some(element) = found.first() {
                        shown = self.driver.is_displayed(element).await?;
                    }
                    self.logger.verify(
                        format!("{} visible", selector),
                        shown == *expect_visible,
                        format!("expected visible={}, was {}", expect_visible, shown),
                    )?;
                }

                if text.is_none() && text_contains.is_none() && attribute.is_none() {
                    return Ok(());
                }
                let element = found
                    .first()
                    .ok_or_else(|| anyhow!("no element found for {}", locator))?;

                if text.is_some() || text_contains.is_some() {
                    let actual = self.driver.text(element).await?;
                    if let Some(expected) = text {
                        let expected = self.fill(expected);
                        self.logger.verify(
                            format!("{} text", selector),
                            actual == expected,
                            format!("expected '{}', was '{}'", expected, actual),
                        )?;
                    }
                    if let Some(part) = text_contains {
                        let part = self.fill(part);
                        self.logger.verify(
                            format!("{} text", selector),
                            actual.contains(&part),
                            format!("expected to contain '{}', was '{}'", part, actual),
                        )?;
                    }
                }

                if let Some(attr) = attribute {
                    let actual = self.driver.attribute(element, &attr.name).await?;
                    let actual = actual.unwrap_or_default();
                    if let Some(expected) = &attr.value {
                        let expected = self.fill(expected);
                        self.logger.verify(
                            format!("{} @{}", selector, attr.name),
                            actual == expected,
                            format!("expected '{}', was '{}'", expected, actual),
                        )?;
                    }
                    if let Some(part) = &attr.contains {
                        let part = self.fill(part);
                        self.logger.verify(
                            format!("{} @{}", selector, attr.name),
                            actual.contains(&part),
                            format!("expected to contain '{}', was '{}'", part, actual),
                        )?;
                    }
                }
            }
            TestStep::AssertTitle { equals, contains } => {
                let actual = self.driver.title().await?;
                if let Some(expected) = equals {
                    let expected = self.fill(expected);
                    self.logger.verify(
                        "Page title",
                        actual == expected,
                        format!("expected '{}', was '{}'", expected, actual),
                    )?;
                }
                if let Some(part) = contains {
                    let part = self.fill(part);
                    self.logger.verify(
                        "Page title",
                        actual.contains(&part),
                        format!("expected to contain '{}', was '{}'", part, actual),
                    )?;
                }
            }
            TestStep::Evaluate { script, expected } => {
                let value = self.driver.execute_script(&self.fill(script), Vec::new()).await?;
                if let Some(expected) = expected {
                    self.logger.verify(
                        "Script result",
                        value == *expected,
                        format!("expected {}, was {}", expected, value),
                    )?;
                }
            }
            TestStep::Screenshot { name } => {
                let png = self.driver.screenshot().await?;
                let path = self.screenshot_path(&self.fill(name));
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, png)?;
                self.logger.info(format!("Screenshot saved to {}", path.display()));
            }
            TestStep::Log { message } => {
                self.logger.info(self.fill(message));
            }
        }
        Ok(())
    }

    fn fill(&self, template: &str) -> String {
        match &self.row {
            Some(row) => row.substitute(template),
            None => template.to_string(),
        }
    }

    fn locator(&self, selector: &str) -> Locator {
        Locator::parse(&self.fill(selector))
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") {
            return url.to_string();
        }
        match &self.mgr.settings().base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/')),
            None => url.to_string(),
        }
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        let ctx = self.mgr.context();
        let file = format!("{}-{}.png", ctx.test_name, name).replace(['/', '\\', ' '], "_");
        self.mgr
            .settings()
            .run_report_dir(self.mgr.uid())
            .join("screenshots")
            .join(file)
    }
}

/// Short label for a step, used in error context
pub fn step_name(step: &TestStep) -> String {
    match step {
        TestStep::Navigate { url, .. } => format!("navigate:{}", url),
        TestStep::Click { selector: Some(selector), .. } => format!("click:{}", selector),
        TestStep::Click { x, y, .. } => {
            format!("click:({},{})", x.unwrap_or_default(), y.unwrap_or_default())
        }
        TestStep::Fill { selector, .. } => format!("fill:{}", selector),
        TestStep::Wait { selector, .. } => format!("wait:{}", selector),
        TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
        TestStep::Assert { selector, .. } => format!("assert:{}", selector),
        TestStep::AssertTitle { .. } => "assert_title".to_string(),
        TestStep::Evaluate { .. } => "evaluate".to_string(),
        TestStep::Screenshot { name } => format!("screenshot:{}", name),
        TestStep::Log { message } => {
            format!("log:{}", message.chars().take(30).collect::<String>())
        }
    }
}

/// A suite backed by a YAML suite file
pub struct SpecSuite {
    spec: Arc<SuiteSpec>,
    mgr: Arc<Manager>,
}

impl SpecSuite {
    pub fn new(spec: Arc<SuiteSpec>, mgr: Arc<Manager>) -> Self {
        Self { spec, mgr }
    }

    async fn run(&self, steps: &[TestStep]) -> HookResult {
        StepRunner::new(&self.mgr).run_all(steps).await
    }
}

#[async_trait]
impl Suite for SpecSuite {
    fn name(&self) -> String {
        self.spec.name.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        self.spec.timeout_ms.map(Duration::from_millis)
    }

    fn tests(&self, set: &mut TestSet) {
        for test in &self.spec.tests {
            let test = Arc::new(test.clone());
            set.add_test(move |mgr| SpecTest::new(test.clone(), mgr));
        }
    }

    async fn setup(&self) -> HookResult {
        self.run(&self.spec.setup).await
    }

    async fn teardown(&self) -> HookResult {
        self.run(&self.spec.teardown).await
    }

    async fn before_test(&self) -> HookResult {
        self.run(&self.spec.before_test).await
    }

    async fn after_test(&self) -> HookResult {
        self.run(&self.spec.after_test).await
    }
}

/// A test declared in a YAML suite file
pub struct SpecTest {
    spec: Arc<TestSpec>,
    mgr: Arc<Manager>,
}

impl SpecTest {
    pub fn new(spec: Arc<TestSpec>, mgr: Arc<Manager>) -> Self {
        Self { spec, mgr }
    }

    async fn run(&self, steps: &[TestStep]) -> HookResult {
        StepRunner::new(&self.mgr).run_all(steps).await
    }
}

#[async_trait]
impl Test for SpecTest {
    fn name(&self) -> String {
        self.spec.name.clone()
    }

    fn tags(&self) -> Vec<String> {
        self.spec.tags.clone()
    }

    fn data_set(&self) -> Vec<DataRow> {
        self.spec.data.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        self.spec.timeout_ms.map(Duration::from_millis)
    }

    fn retries(&self) -> Option<u32> {
        self.spec.retries
    }

    async fn test_startup(&self) -> HookResult {
        self.run(&self.spec.startup).await
    }

    async fn test(&self) -> HookResult {
        self.run(&self.spec.steps).await
    }

    async fn test_cleanup(&self) -> HookResult {
        self.run(&self.spec.cleanup).await
    }
}

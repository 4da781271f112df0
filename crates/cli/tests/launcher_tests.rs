//! Launcher runs against YAML suites on disk

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use walnut_cli::{LaunchOptions, Launcher, ReporterKind};
use walnut_core::driver::{DriverResult, ElementRef, Locator, Target};
use walnut_core::{Driver, RunContext, Settings, TagFilter};

#[derive(Default)]
struct ShopDriver {
    disposals: AtomicU32,
}

#[async_trait]
impl Driver for ShopDriver {
    async fn navigate(&self, _url: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> DriverResult<ElementRef> {
        Ok(ElementRef(locator.to_string()))
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        Ok(vec![ElementRef(locator.to_string())])
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
        Ok("Walnut Shop".to_string())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok("http://shop.test/".to_string())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn dispose(&self) -> DriverResult<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const SHOP: &str = r#"
name: Shop
tests:
  - name: Home
    tags: [smoke]
    steps:
      - action: navigate
        url: http://shop.test/
      - action: assert_title
        contains: Shop
  - name: Checkout
    tags: [regression]
    steps:
      - action: assert_title
        equals: Checkout
"#;

fn project() -> (TempDir, Arc<RunContext>) {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("suites")).unwrap();
    std::fs::write(dir.path().join("suites/shop.yaml"), SHOP).unwrap();

    let settings = Settings {
        log_path: dir.path().join("output/logs"),
        report_path: dir.path().join("output/reports"),
        ..Default::default()
    };
    (dir, RunContext::new(settings))
}

async fn launch(
    dir: &Path,
    run: Arc<RunContext>,
    options: LaunchOptions,
) -> walnut_cli::LaunchSummary {
    let mut launcher = Launcher::new(run, options)
        .unwrap()
        .with_driver(Arc::new(ShopDriver::default()));
    assert_eq!(launcher.add_suite_files(&dir.join("suites")).await.unwrap(), 1);
    launcher.launch().await.unwrap()
}

#[tokio::test]
async fn test_run_writes_reports() {
    let (dir, run) = project();
    let summary = launch(dir.path(), run, LaunchOptions::default()).await;

    assert_eq!(summary.report.total, 2);
    assert_eq!(summary.report.passed, 1);
    assert_eq!(summary.report.failed, 1);
    assert!(!summary.success());

    let report_dir = summary.report_dir.clone().unwrap();
    assert!(report_dir.join(format!("{}.json", summary.run_id)).exists());
    assert!(report_dir.join("Shop.json").exists());
}

#[tokio::test]
async fn test_tag_filter_selects_tests() {
    let (dir, run) = project();
    let options = LaunchOptions {
        tags: TagFilter::parse("smoke"),
        reporter: ReporterKind::None,
        post_exec: None,
    };
    let summary = launch(dir.path(), run, options).await;

    assert_eq!(summary.report.total, 1);
    assert!(summary.success());
    assert!(summary.report_dir.is_none());
}

#[tokio::test]
async fn test_bad_suite_file_aborts_the_run() {
    let (dir, run) = project();
    let broken = dir.path().join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(
        broken.join("nameless.yaml"),
        "name: Nameless\ntests:\n  - name: ''\n    steps: []\n",
    )
    .unwrap();

    let driver = Arc::new(ShopDriver::default());
    let mut launcher = Launcher::new(run, LaunchOptions::default())
        .unwrap()
        .with_driver(driver.clone());
    let run_id = launcher.run_id().to_string();

    assert_eq!(launcher.add_suite_files(&dir.path().join("suites")).await.unwrap(), 1);
    assert!(launcher.add_suite_files(&broken).await.is_err());
    assert_eq!(driver.disposals.load(Ordering::SeqCst), 1);

    // terminate went out, so the execution report exists
    let report = dir
        .path()
        .join("output/reports")
        .join(&run_id)
        .join(format!("{}.json", run_id));
    assert!(report.exists());

    assert!(launcher.launch().await.is_err());
    assert_eq!(driver.disposals.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_post_exec_receives_run_id() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, run) = project();
    let marker = dir.path().join("post-exec.out");
    let script = dir.path().join("notify.sh");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho \"$1\" > '{}'\n", marker.display()),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let options = LaunchOptions {
        reporter: ReporterKind::None,
        post_exec: Some(script),
        ..Default::default()
    };
    let summary = launch(dir.path(), run, options).await;

    let written = std::fs::read_to_string(marker).unwrap();
    assert_eq!(written.trim(), summary.run_id);
}

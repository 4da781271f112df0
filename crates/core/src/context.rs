//! Execution context shared by the executor, the running suite and the running test

use serde::Serialize;
use std::path::PathBuf;

use crate::data::DataRow;

/// Shared mutable record of the current suite execution.
///
/// One instance lives per suite execution, owned by its [`Manager`]. It is
/// mutated in a fixed order: suite setup, then per test before-test, body and
/// after-test, then suite teardown. Events carry clones of it.
///
/// [`Manager`]: crate::manager::Manager
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestContext {
    /// Name of the running suite
    pub suite_name: String,

    /// Base name of the running test (tags stripped)
    pub test_name: String,

    /// Source file of the running suite
    pub file: Option<PathBuf>,

    /// Set when before-test or after-test failed for the current test
    pub hook_failed: bool,

    /// Lower-cased runner outcome of the last finished test
    pub test_result: Option<String>,

    /// Whether the last finished test hit its timeout
    pub timed_out: bool,

    /// Duration of the last finished test in milliseconds
    pub duration_ms: u64,

    /// Data row handed to the running data-driven test
    pub data: Option<DataRow>,
}

impl TestContext {
    pub fn for_suite(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            ..Default::default()
        }
    }

    pub fn passed(&self) -> bool {
        self.test_result.as_deref() == Some("passed")
    }
}

/// Separator placed between a test name and each of its tags in a title
pub const TAG_SEPARATOR: &str = " #";

/// Compose the runner-visible title: `name #tag1 #tag2`, tags in order
pub fn compose_title(name: &str, tags: &[String]) -> String {
    let mut title = name.to_string();
    for tag in tags {
        title.push_str(TAG_SEPARATOR);
        title.push_str(tag);
    }
    title
}

/// Recover the base test name from a runner title
pub fn strip_tags(title: &str) -> &str {
    match title.find(TAG_SEPARATOR) {
        Some(idx) => &title[..idx],
        None => title,
    }
}

/// Tags carried by a runner title, in order
pub fn title_tags(title: &str) -> Vec<&str> {
    title
        .split(TAG_SEPARATOR)
        .skip(1)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

//! Declarative YAML suite files

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::data::{DataRow, DataSource};
use crate::error::{Error, Result};

/// A suite parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Default timeout for the suite's tests; 0 disables it
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub setup: Vec<TestStep>,

    #[serde(default)]
    pub teardown: Vec<TestStep>,

    #[serde(default)]
    pub before_test: Vec<TestStep>,

    #[serde(default)]
    pub after_test: Vec<TestStep>,

    pub tests: Vec<TestSpec>,

    /// File the suite was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// One test of a suite file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Rows declared in place
    #[serde(default)]
    pub data: Vec<DataRow>,

    /// Rows read from a CSV or JSON file, relative to the suite file.
    /// Loaded into `data` by [`SuiteSpec::from_file`].
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub data_source: Option<DataSource>,

    #[serde(default)]
    pub startup: Vec<TestStep>,

    pub steps: Vec<TestStep>,

    #[serde(default)]
    pub cleanup: Vec<TestStep>,
}

/// A single step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL; relative URLs resolve against the base URL
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element, or a viewport offset when `x`/`y` are given
    Click {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        x: Option<i64>,
        #[serde(default)]
        y: Option<i64>,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Wait for an element
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    Sleep {
        ms: u64,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
    },

    /// Assert the page title
    AssertTitle {
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Run a script, optionally comparing its return value
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Save a PNG of the viewport under the run's report directory
    Screenshot {
        name: String,
    },

    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Attached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
}

impl SuiteSpec {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.check()?;
        Ok(spec)
    }

    /// Parse a suite file and load its data files, which are resolved
    /// relative to the suite file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| Error::SpecParse(format!("{}: {}", path.display(), e)))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for test in &mut spec.tests {
            if let Some(source) = test.data_source.take() {
                test.data = source.relative_to(base).load()?;
            }
        }
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load every `.yaml`/`.yml` suite under `path`, or `path` itself when
    /// it is a file. Files are visited in name order.
    pub fn load_all(path: &Path) -> Result<Vec<Self>> {
        if path.is_file() {
            return Ok(vec![Self::from_file(path)?]);
        }

        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_suite_file(e.path()))
        {
            debug!("Loading suite file {}", entry.path().display());
            specs.push(Self::from_file(entry.path())?);
        }
        Ok(specs)
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::SpecParse("suite name must not be empty".to_string()));
        }
        for test in &self.tests {
            if test.name.trim().is_empty() {
                return Err(Error::SpecParse(format!(
                    "suite '{}' declares a test without a name",
                    self.name
                )));
            }
            if !test.data.is_empty() && test.data_source.is_some() {
                return Err(Error::SpecParse(format!(
                    "test '{}' declares both data and data_source",
                    test.name
                )));
            }
        }
        Ok(())
    }
}

impl TestSpec {
    /// Rows this test repeats over
    pub fn rows(&self) -> Result<Vec<DataRow>> {
        match &self.data_source {
            Some(source) => source.load(),
            None => Ok(self.data.clone()),
        }
    }
}

fn is_suite_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

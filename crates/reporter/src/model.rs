//! Report documents
//!
//! Field names are PascalCase on the wire; dashboards built on the
//! search index key on them.

use serde::{Deserialize, Serialize};
use walnut_core::settings::Settings;

pub const TOOL: &str = "Walnut";

/// One verification logged by a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Verification {
    pub title: String,
    pub details: String,
    pub result: String,
    pub time: String,
}

/// One executed (or skipped) test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptRecord {
    pub name: String,
    pub result: String,
    pub retried: bool,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub elapsed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    pub verifications: Vec<Verification>,
}

impl ScriptRecord {
    pub const NOT_RUN: &'static str = "Not run";

    pub fn not_run(name: &str, retried: bool) -> Self {
        Self {
            name: name.to_string(),
            result: Self::NOT_RUN.to_string(),
            retried,
            start_time: "N/A".to_string(),
            end_time: Some("N/A".to_string()),
            elapsed: "N/A".to_string(),
            log_file: None,
            verifications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Summary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Run_Started")]
    pub run_started: String,
    pub elapsed: String,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub retried: usize,
    pub not_run: usize,
}

impl Summary {
    /// Whole-number pass percentage; 0 for an empty run
    pub fn pass_percentage(&self) -> u32 {
        if self.total_tests == 0 {
            return 0;
        }
        ((self.passed as f64 / self.total_tests as f64) * 100.0).round() as u32
    }
}

/// Fields shared by suite and execution documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportHeader {
    pub execution_id: String,
    pub product: String,
    pub version: String,
    pub platform: String,
    pub build: String,
    pub execution_type: String,
    pub browser: String,
    pub report_type: String,
    pub tool: String,
    #[serde(rename = "QA")]
    pub qa: String,
}

impl ReportHeader {
    pub fn new(run_id: &str, settings: &Settings, execution_type: &str, report_type: &str) -> Self {
        let meta = &settings.metadata;
        Self {
            execution_id: run_id.to_string(),
            product: meta.product.clone(),
            version: meta.product_version.clone(),
            platform: meta.platform.clone(),
            build: meta.build_id.clone(),
            execution_type: execution_type.to_string(),
            browser: settings.browser.as_str().to_string(),
            report_type: report_type.to_string(),
            tool: TOOL.to_string(),
            qa: meta.team.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SuiteReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub scripts: Vec<ScriptRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub suites: Vec<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// A document queued for delivery
#[derive(Debug, Clone)]
pub enum Document {
    Suite(SuiteReport),
    Execution(ExecutionReport),
    /// A shipped log record
    Log(serde_json::Value),
}

impl Document {
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Suite(_) => "suite",
            Document::Execution(_) => "execution",
            Document::Log(_) => "log",
        }
    }
}

/// `h:m:s.ms` without padding
pub fn ms_to_time(ms: u64) -> String {
    let millis = ms % 1000;
    let seconds = (ms / 1000) % 60;
    let minutes = (ms / (1000 * 60)) % 60;
    let hours = (ms / (1000 * 60 * 60)) % 24;
    format!("{}:{}:{}.{}", hours, minutes, seconds, millis)
}

/// Upper-case the first character
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `All` for an unfiltered run, else the tag list with its first letter
/// upper-cased
pub fn execution_type(tags: &[String]) -> String {
    if tags.is_empty() {
        "All".to_string()
    } else {
        capitalize(&tags.join(","))
    }
}

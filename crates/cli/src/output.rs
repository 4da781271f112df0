//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use walnut_core::runner::DescribeReport;
use walnut_core::CaseOutcome;

use crate::init::Scaffold;
use crate::launcher::LaunchSummary;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// One suite line of the run summary
#[derive(Serialize)]
pub struct SuiteRow {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
}

impl From<&DescribeReport> for SuiteRow {
    fn from(report: &DescribeReport) -> Self {
        let count = |outcome: CaseOutcome| {
            report.cases.iter().filter(|c| c.outcome == outcome).count()
        };
        Self {
            suite: report.title.clone(),
            total: report.cases.len() + report.not_run.len(),
            passed: count(CaseOutcome::Passed),
            failed: count(CaseOutcome::Failed),
            skipped: count(CaseOutcome::Skipped),
            not_run: report.not_run.len(),
        }
    }
}

impl TableDisplay for SuiteRow {
    fn headers() -> Vec<&'static str> {
        vec!["SUITE", "TOTAL", "PASSED", "FAILED", "SKIPPED", "NOT RUN"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.total.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.skipped.to_string(),
            self.not_run.to_string(),
        ]
    }
}

/// Print the result of `walnut run`
pub fn print_summary(summary: &LaunchSummary, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
        return;
    }

    let rows: Vec<SuiteRow> = summary.report.suites.iter().map(SuiteRow::from).collect();
    print_list(&rows, format);

    for suite in &summary.report.suites {
        for failure in &suite.hook_failures {
            print_error(&format!("{}: {}", suite.title, failure));
        }
        for case in suite.cases.iter().filter(|c| c.outcome == CaseOutcome::Failed) {
            print_error(&format!(
                "{} › {}: {}",
                suite.title,
                case.title,
                case.error.as_deref().unwrap_or("failed")
            ));
        }
    }

    let report = &summary.report;
    let status = if summary.success() {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} total, {} passed, {} failed, {} skipped, {} not run ({} ms)",
        status,
        report.total,
        report.passed,
        report.failed,
        report.skipped,
        report.not_run,
        report.duration_ms
    );
    println!("Execution ID: {}", summary.run_id);
    if let Some(dir) = &summary.report_dir {
        print_info(&format!("Reports written to {}", dir.display()));
    }
}

/// Print the result of `walnut init`
pub fn print_scaffold(scaffold: &Scaffold, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(scaffold).unwrap_or_default());
        return;
    }
    for path in &scaffold.created {
        print_success(&format!("Created {}", path.display()));
    }
    for path in &scaffold.existing {
        print_warning(&format!("{} already exists", path.display()));
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use walnut_core::runner::CaseReport;

    fn case(title: &str, outcome: CaseOutcome) -> CaseReport {
        CaseReport {
            title: title.to_string(),
            outcome,
            attempts: 1,
            duration_ms: 5,
            timed_out: false,
            error: None,
        }
    }

    #[test]
    fn test_suite_row_counts() {
        let report = DescribeReport {
            title: "Checkout".to_string(),
            cases: vec![
                case("A", CaseOutcome::Passed),
                case("B", CaseOutcome::Failed),
                case("C", CaseOutcome::Skipped),
            ],
            hook_failures: Vec::new(),
            not_run: vec!["D".to_string()],
        };

        let row = SuiteRow::from(&report);
        assert_eq!(row.row(), vec!["Checkout", "4", "1", "1", "1", "1"]);
    }
}

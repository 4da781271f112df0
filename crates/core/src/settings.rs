//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};

/// Default location of the project configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/walnut.toml";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Browser to drive
    pub browser: Browser,

    /// Retry count applied to tests that do not set their own
    pub retry: u32,

    /// Test timeout in milliseconds (0 = disabled)
    pub timeout_ms: u64,

    /// Log level directive (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory holding one log folder per run
    pub log_path: PathBuf,

    /// Directory holding one report folder per run
    pub report_path: PathBuf,

    /// Base URL that relative navigation targets resolve against
    pub base_url: Option<String>,

    /// Remote WebDriver endpoint configuration
    pub webdriver: WebDriverSettings,

    /// Descriptive metadata copied into every report
    pub metadata: RunMetadata,

    /// Search index the reporter writes documents to
    pub search_index: Option<SearchIndexSettings>,

    /// Mail delivery of the execution summary
    pub mail: Option<MailSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            browser: Browser::Chrome,
            retry: 0,
            timeout_ms: 0,
            log_level: "info".to_string(),
            log_path: PathBuf::from("output/logs"),
            report_path: PathBuf::from("output/reports"),
            base_url: None,
            webdriver: WebDriverSettings::default(),
            metadata: RunMetadata::default(),
            search_index: None,
            mail: None,
        }
    }
}

/// Supported browsers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
    Edge,
    Electron,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Electron => "electron",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote WebDriver endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    /// Server URL (chromedriver, geckodriver, selenium grid)
    pub url: String,

    /// Launch the browser without a visible window
    pub headless: bool,

    /// Extra capabilities merged into `alwaysMatch`; required for electron
    pub capabilities: Option<serde_json::Value>,

    /// How long to wait for the server to report ready, in milliseconds
    pub startup_timeout_ms: u64,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4444".to_string(),
            headless: true,
            capabilities: None,
            startup_timeout_ms: 10_000,
        }
    }
}

/// Descriptive metadata copied into reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetadata {
    pub product: String,
    pub product_version: String,
    pub platform: String,
    pub build_id: String,
    pub team: String,
}

impl Default for RunMetadata {
    fn default() -> Self {
        let unspecified = || "Not specified".to_string();
        Self {
            product: unspecified(),
            product_version: unspecified(),
            platform: unspecified(),
            build_id: unspecified(),
            team: unspecified(),
        }
    }
}

/// Search index connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexSettings {
    /// Base URL of the index server
    pub host: String,

    /// Whether documents are written at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also ship every log record, not just reports
    #[serde(default)]
    pub ship_logs: bool,
}

/// Mail delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    /// HTTP endpoint of the mail relay
    pub relay_url: String,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Link to the published report; `{run_id}` is replaced with the run id
    #[serde(default)]
    pub report_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_subject() -> String {
    "Automation Results".to_string()
}

impl Settings {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            info!("No config file found at {}. Using default settings", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.browser == Browser::Electron && self.webdriver.capabilities.is_none() {
            return Err(Error::InvalidConfig(
                "electron driver capabilities not specified".to_string(),
            ));
        }
        if let Some(mail) = &self.mail {
            if mail.to.is_empty() {
                return Err(Error::InvalidConfig("mail.to must list at least one recipient".to_string()));
            }
        }
        Ok(())
    }

    /// Default test timeout, `None` when disabled
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Search index settings when writing is enabled
    pub fn search_index(&self) -> Option<&SearchIndexSettings> {
        self.search_index.as_ref().filter(|s| s.enabled)
    }

    /// Directory for a run's log files
    pub fn run_log_dir(&self, run_id: &str) -> PathBuf {
        self.log_path.join(run_id)
    }

    /// Directory for a run's report files
    pub fn run_report_dir(&self, run_id: &str) -> PathBuf {
        self.report_path.join(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(settings.browser, Browser::Chrome);
        assert_eq!(settings.default_timeout(), None);
        assert_eq!(settings.metadata.product, "Not specified");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config").join("walnut.toml");

        let mut settings = Settings::default();
        settings.browser = Browser::Firefox;
        settings.retry = 2;
        settings.timeout_ms = 30_000;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.browser, Browser::Firefox);
        assert_eq!(loaded.retry, 2);
        assert_eq!(loaded.default_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("walnut.toml");
        std::fs::write(
            &path,
            r#"
browser = "edge"

[metadata]
product = "Portal"
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.browser, Browser::Edge);
        assert_eq!(settings.metadata.product, "Portal");
        assert_eq!(settings.metadata.team, "Not specified");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_electron_requires_capabilities() {
        let mut settings = Settings::default();
        settings.browser = Browser::Electron;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

        settings.webdriver.capabilities = Some(serde_json::json!({"browserName": "electron"}));
        assert!(settings.validate().is_ok());
    }
}

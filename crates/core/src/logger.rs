//! Named loggers for suites and tests
//!
//! A [`TestLogger`] writes through `tracing` like the rest of the crate and
//! republishes every record as a `log` lifecycle event, which is how
//! reporters collect verification entries for the running test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dispatch::HookFailure;
use crate::events::LifecycleEvent;
use crate::run::RunContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Classification reporters key on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A verification performed by a test
    Validation,
    /// An uncaught hook failure
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Validation => "validation",
            EventType::Error => "error",
        }
    }
}

/// One structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub execution_id: String,
    pub logger: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub time: DateTime<Utc>,
}

impl LogRecord {
    pub fn is_validation(&self) -> bool {
        self.event_type == Some(EventType::Validation)
    }
}

#[derive(Clone)]
pub struct TestLogger {
    name: String,
    run: Arc<RunContext>,
}

impl TestLogger {
    pub fn new(name: impl Into<String>, run: Arc<RunContext>) -> Self {
        Self { name: name.into(), run }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message.into(), None, None, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into(), None, None, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into(), None, None, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into(), None, None, None);
    }

    /// Record a verification outcome without failing the caller
    pub fn validation(&self, title: impl Into<String>, details: impl Into<String>, passed: bool) {
        let level = if passed { LogLevel::Info } else { LogLevel::Error };
        let state = if passed { "passed" } else { "failed" };
        self.log(
            level,
            details.into(),
            Some(EventType::Validation),
            Some(title.into()),
            Some(state.to_string()),
        );
    }

    /// Record a verification and fail when `condition` is false
    pub fn verify(
        &self,
        title: impl Into<String>,
        condition: bool,
        details: impl Into<String>,
    ) -> anyhow::Result<()> {
        let title = title.into();
        let details = details.into();
        self.validation(title.clone(), details.clone(), condition);
        if condition {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Verification failed: {} ({})", title, details))
        }
    }

    /// Record an uncaught hook failure
    pub fn uncaught(&self, failure: &HookFailure) {
        self.log(
            LogLevel::Error,
            failure.to_string(),
            Some(EventType::Error),
            Some("Uncaught error".to_string()),
            Some("failed".to_string()),
        );
    }

    fn log(
        &self,
        level: LogLevel,
        message: String,
        event_type: Option<EventType>,
        event_title: Option<String>,
        state: Option<String>,
    ) {
        let kind = event_type.map(|t| t.as_str()).unwrap_or("");
        let title = event_title.as_deref().unwrap_or("");
        match level {
            LogLevel::Debug => debug!(logger = %self.name, event_type = kind, "{}", message),
            LogLevel::Info => {
                info!(logger = %self.name, event_type = kind, event_title = title, "{}", message)
            }
            LogLevel::Warn => warn!(logger = %self.name, event_type = kind, "{}", message),
            LogLevel::Error => {
                error!(logger = %self.name, event_type = kind, event_title = title, "{}", message)
            }
        }

        self.run.publish(LifecycleEvent::Log(LogRecord {
            execution_id: self.run.id().to_string(),
            logger: self.name.clone(),
            level,
            message,
            event_type,
            event_title,
            state,
            time: Utc::now(),
        }));
    }
}

//! Run-scoped state shared by every component of one execution

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::events::{EventStream, LifecycleEvent};
use crate::logger::TestLogger;
use crate::settings::Settings;

/// Everything one run shares: its id, settings and event stream.
///
/// Constructed once at run start and handed to the executor, managers and
/// reporters.
pub struct RunContext {
    id: String,
    settings: Settings,
    events: EventStream,
    started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(settings: Settings) -> Arc<Self> {
        Self::with_id(uuid::Uuid::new_v4().simple().to_string(), settings)
    }

    pub fn with_id(id: impl Into<String>, settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            settings,
            events: EventStream::new(),
            started_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn publish(&self, event: LifecycleEvent) {
        self.events.publish(event);
    }

    /// Logger whose records are also published on this run's stream
    pub fn logger(self: &Arc<Self>, name: impl Into<String>) -> TestLogger {
        TestLogger::new(name, self.clone())
    }
}

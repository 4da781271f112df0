//! Shared fixtures for executor integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use walnut_core::driver::{DriverError, DriverResult, ElementRef, Locator, Target};
use walnut_core::{Driver, LifecycleEvent, RunContext, Settings};

/// In-memory driver that records commands
#[derive(Default)]
pub struct RecordingDriver {
    pub commands: Mutex<Vec<String>>,
    pub disposals: AtomicU32,
    pub title: Mutex<String>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn disposals(&self) -> u32 {
        self.disposals.load(Ordering::SeqCst)
    }

    fn record(&self, command: String) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> DriverResult<ElementRef> {
        if locator.to_string().contains("missing") {
            return Err(DriverError::NoSuchElement(locator.to_string()));
        }
        Ok(ElementRef(locator.to_string()))
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        Ok(self.find_element(locator).await.into_iter().collect())
    }

    async fn click(&self, target: &Target) -> DriverResult<()> {
        match target {
            Target::Element(e) => self.record(format!("click {}", e.id())),
            Target::Offset { x, y } => self.record(format!("click ({},{})", x, y)),
        }
        Ok(())
    }

    async fn move_to(&self, _target: &Target) -> DriverResult<()> {
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
        self.record(format!("type {} {}", element.id(), text));
        Ok(())
    }

    async fn clear(&self, _element: &ElementRef) -> DriverResult<()> {
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> DriverResult<String> {
        Ok(format!("text of {}", element.id()))
    }

    async fn attribute(&self, _element: &ElementRef, _name: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn is_displayed(&self, _element: &ElementRef) -> DriverResult<bool> {
        Ok(true)
    }

    async fn execute_script(&self, script: &str, _args: Vec<Value>) -> DriverResult<Value> {
        self.record(format!("script {}", script));
        Ok(Value::from(1))
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(self.title.lock().clone())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn dispose(&self) -> DriverResult<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Event names with the test name they carried, `log` events excluded
pub fn record_events(run: &Arc<RunContext>) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    run.events().subscribe(Arc::new(move |event: &LifecycleEvent| {
        let entry = match event {
            LifecycleEvent::Log(_) => return,
            other => match other.context() {
                Some(ctx) if !ctx.test_name.is_empty() => {
                    format!("{}:{}", other.name(), ctx.test_name)
                }
                _ => other.name().to_string(),
            },
        };
        sink.lock().push(entry);
    }));
    seen
}

pub fn run_context() -> Arc<RunContext> {
    RunContext::with_id("run-test", Settings::default())
}

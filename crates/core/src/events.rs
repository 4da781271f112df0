//! Lifecycle events and the synchronous observer channel

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::context::TestContext;
use crate::driver::Driver;
use crate::logger::LogRecord;

/// A phase transition published by the executor
#[derive(Clone)]
pub enum LifecycleEvent {
    Initialized { run_id: String },
    StartSetup(TestContext),
    EndSetup(TestContext),
    StartBeforeTest(TestContext),
    EndBeforeTest(TestContext),
    Retrying(TestContext),
    SkipTest(TestContext),
    StartTest(TestContext),
    EndTest(TestContext),
    StartAfterTest(TestContext),
    EndAfterTest(TestContext),
    StartTeardown(TestContext),
    /// Carries the handle so it can be inspected before disposal
    EndTeardown(TestContext, Arc<dyn Driver>),
    Log(LogRecord),
    Terminate,
}

impl LifecycleEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Initialized { .. } => "initialized",
            LifecycleEvent::StartSetup(_) => "start setup",
            LifecycleEvent::EndSetup(_) => "end setup",
            LifecycleEvent::StartBeforeTest(_) => "start beforeTest",
            LifecycleEvent::EndBeforeTest(_) => "end beforeTest",
            LifecycleEvent::Retrying(_) => "retrying",
            LifecycleEvent::SkipTest(_) => "skip test",
            LifecycleEvent::StartTest(_) => "start test",
            LifecycleEvent::EndTest(_) => "end test",
            LifecycleEvent::StartAfterTest(_) => "start afterTest",
            LifecycleEvent::EndAfterTest(_) => "end afterTest",
            LifecycleEvent::StartTeardown(_) => "start teardown",
            LifecycleEvent::EndTeardown(_, _) => "end teardown",
            LifecycleEvent::Log(_) => "log",
            LifecycleEvent::Terminate => "terminate",
        }
    }

    /// Context snapshot carried by the event, if any
    pub fn context(&self) -> Option<&TestContext> {
        match self {
            LifecycleEvent::StartSetup(c)
            | LifecycleEvent::EndSetup(c)
            | LifecycleEvent::StartBeforeTest(c)
            | LifecycleEvent::EndBeforeTest(c)
            | LifecycleEvent::Retrying(c)
            | LifecycleEvent::SkipTest(c)
            | LifecycleEvent::StartTest(c)
            | LifecycleEvent::EndTest(c)
            | LifecycleEvent::StartAfterTest(c)
            | LifecycleEvent::EndAfterTest(c)
            | LifecycleEvent::StartTeardown(c)
            | LifecycleEvent::EndTeardown(c, _) => Some(c),
            LifecycleEvent::Initialized { .. } | LifecycleEvent::Log(_) | LifecycleEvent::Terminate => None,
        }
    }
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Initialized { run_id } => {
                f.debug_struct("Initialized").field("run_id", run_id).finish()
            }
            LifecycleEvent::Log(record) => f.debug_tuple("Log").field(record).finish(),
            LifecycleEvent::Terminate => f.write_str("Terminate"),
            other => {
                let ctx = other.context();
                f.debug_struct("LifecycleEvent")
                    .field("name", &other.name())
                    .field("suite", &ctx.map(|c| c.suite_name.as_str()))
                    .field("test", &ctx.map(|c| c.test_name.as_str()))
                    .finish()
            }
        }
    }
}

/// Subscriber to the event stream.
///
/// Called synchronously on the executor's thread of control; the executor
/// does not advance until `on_event` returns.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> Observer for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// In-process publish/subscribe channel owned by a run
#[derive(Default)]
pub struct EventStream {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver `event` to every observer in subscription order
    pub fn publish(&self, event: LifecycleEvent) {
        // Snapshot so an observer may subscribe others without deadlocking
        let observers: Vec<Arc<dyn Observer>> = self.observers.read().clone();
        for observer in observers {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_delivery_in_subscription_order() {
        let stream = EventStream::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = seen.clone();
            stream.subscribe(Arc::new(move |event: &LifecycleEvent| {
                seen.lock().push(format!("{}:{}", id, event.name()));
            }));
        }

        stream.publish(LifecycleEvent::StartSetup(TestContext::for_suite("Checkout")));
        stream.publish(LifecycleEvent::Terminate);

        assert_eq!(
            *seen.lock(),
            vec![
                "0:start setup",
                "1:start setup",
                "2:start setup",
                "0:terminate",
                "1:terminate",
                "2:terminate",
            ]
        );
    }

    #[test]
    fn test_event_names_and_context() {
        let ctx = TestContext::for_suite("Suite");
        let event = LifecycleEvent::SkipTest(ctx.clone());
        assert_eq!(event.name(), "skip test");
        assert_eq!(event.context(), Some(&ctx));
        assert!(LifecycleEvent::Terminate.context().is_none());
    }
}

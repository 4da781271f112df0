//! Error capture and dispatch for hook invocations
//!
//! Every user hook runs through [`Dispatcher::run`]. Errors and panics are
//! captured, logged as uncaught errors, and then exactly one policy applies:
//! fatal hooks propagate, absorbed hooks invoke a flagging callback and
//! report success. A `finally` callback runs in every case.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::entity::HookResult;
use crate::error::Error;
use crate::logger::TestLogger;

/// User-overridable lifecycle callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Setup,
    BeforeTest,
    TestStartup,
    Test,
    TestCleanup,
    AfterTest,
    Teardown,
}

/// What happens to a captured hook failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Logged, then propagated to the runner
    Fatal,
    /// Logged and flagged; the run continues
    Absorb,
}

impl Hook {
    pub fn policy(&self) -> ErrorPolicy {
        match self {
            Hook::BeforeTest | Hook::AfterTest => ErrorPolicy::Absorb,
            Hook::Setup | Hook::Teardown | Hook::TestStartup | Hook::Test | Hook::TestCleanup => {
                ErrorPolicy::Fatal
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Setup => "setup",
            Hook::BeforeTest => "beforeTest",
            Hook::TestStartup => "testStartup",
            Hook::Test => "test",
            Hook::TestCleanup => "testCleanup",
            Hook::AfterTest => "afterTest",
            Hook::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook that returned an error or panicked
#[derive(Debug, Clone)]
pub struct HookFailure {
    pub hook: Hook,
    /// Suite or test the hook belongs to
    pub owner: String,
    pub message: String,
    pub panicked: bool,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(f, "{}.{} {}: {}", self.owner, self.hook, kind, self.message)
    }
}

impl std::error::Error for HookFailure {}

impl HookFailure {
    fn from_error(hook: Hook, owner: &str, err: anyhow::Error) -> Self {
        Self {
            hook,
            owner: owner.to_string(),
            message: format!("{:#}", err),
            panicked: false,
        }
    }

    fn from_panic(hook: Hook, owner: &str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            hook,
            owner: owner.to_string(),
            message,
            panicked: true,
        }
    }
}

/// Await a hook future, turning `Err` and panics into a [`HookFailure`]
pub async fn capture<F>(hook: Hook, owner: &str, fut: F) -> Result<(), HookFailure>
where
    F: Future<Output = HookResult>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(HookFailure::from_error(hook, owner, err)),
        Err(payload) => Err(HookFailure::from_panic(hook, owner, payload)),
    }
}

/// Applies the fatal/absorb policy to hooks of one suite or test
pub struct Dispatcher<'a> {
    owner: &'a str,
    logger: &'a TestLogger,
}

impl<'a> Dispatcher<'a> {
    pub fn new(owner: &'a str, logger: &'a TestLogger) -> Self {
        Self { owner, logger }
    }

    /// Run `body` under `hook`'s policy.
    ///
    /// `on_absorbed` runs only when an absorbed hook failed; `finally` runs
    /// after everything else, success or failure.
    pub async fn run<F, A, Fin>(&self, hook: Hook, body: F, on_absorbed: A, finally: Fin) -> Result<(), Error>
    where
        F: Future<Output = HookResult>,
        A: FnOnce(&HookFailure),
        Fin: FnOnce(),
    {
        let result = match capture(hook, self.owner, body).await {
            Ok(()) => Ok(()),
            Err(failure) => {
                self.logger.uncaught(&failure);
                match hook.policy() {
                    ErrorPolicy::Fatal => Err(Error::Hook(failure)),
                    ErrorPolicy::Absorb => {
                        on_absorbed(&failure);
                        Ok(())
                    }
                }
            }
        };
        finally();
        result
    }
}

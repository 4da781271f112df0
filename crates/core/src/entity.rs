//! Test and suite entities

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::context::compose_title;
use crate::data::DataRow;
use crate::manager::Manager;

/// Outcome of a user hook
pub type HookResult = anyhow::Result<()>;

/// Builds a test instance bound to a suite execution's manager
pub type TestConstructor = Arc<dyn Fn(Arc<Manager>) -> Box<dyn Test> + Send + Sync>;

/// Last path segment of a type name, without generic arguments
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A single executable scenario.
///
/// Only [`Test::test`] must be supplied. Tests are constructed once per suite
/// execution; the startup, body and cleanup hooks then run once per runner
/// invocation, which means once per row for data-driven tests. The current
/// row is available through [`Manager::data`].
#[async_trait]
pub trait Test: Send + Sync {
    /// Name shown in reports; defaults to the implementing type's name
    fn name(&self) -> String {
        short_type_name::<Self>()
    }

    /// Tags appended to the title as `#tag`, in order
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Rows for data-driven repetition; empty runs the test once
    fn data_set(&self) -> Vec<DataRow> {
        Vec::new()
    }

    /// Per-test timeout; `None` falls back to the configured default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Per-test retry count; `None` falls back to the configured default
    fn retries(&self) -> Option<u32> {
        None
    }

    /// Runner-visible title
    fn title(&self) -> String {
        compose_title(&self.name(), &self.tags())
    }

    async fn test_startup(&self) -> HookResult {
        Ok(())
    }

    async fn test(&self) -> HookResult;

    async fn test_cleanup(&self) -> HookResult {
        Ok(())
    }
}

/// Ordered registration of test constructors
#[derive(Default, Clone)]
pub struct TestSet {
    constructors: Vec<TestConstructor>,
}

impl TestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test; execution order follows registration order
    pub fn add_test<F, T>(&mut self, constructor: F) -> &mut Self
    where
        F: Fn(Arc<Manager>) -> T + Send + Sync + 'static,
        T: Test + 'static,
    {
        self.constructors
            .push(Arc::new(move |mgr| Box::new(constructor(mgr)) as Box<dyn Test>));
        self
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Instantiate every registered test against `mgr`, in order
    pub fn instantiate(&self, mgr: &Arc<Manager>) -> Vec<Box<dyn Test>> {
        self.constructors.iter().map(|ctor| ctor(mgr.clone())).collect()
    }
}

/// A named, ordered collection of tests with lifecycle hooks.
///
/// All hooks are no-ops unless overridden.
#[async_trait]
pub trait Suite: Send + Sync {
    fn name(&self) -> String {
        short_type_name::<Self>()
    }

    /// Default timeout for tests of this suite
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Register this suite's tests
    fn tests(&self, set: &mut TestSet);

    /// Runs once before the first test
    async fn setup(&self) -> HookResult {
        Ok(())
    }

    /// Runs once after the last test
    async fn teardown(&self) -> HookResult {
        Ok(())
    }

    /// Runs before each test invocation
    async fn before_test(&self) -> HookResult {
        Ok(())
    }

    /// Runs after each test invocation that reached a terminal state
    async fn after_test(&self) -> HookResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LoginWithValidUser;

    #[async_trait]
    impl Test for LoginWithValidUser {
        fn tags(&self) -> Vec<String> {
            vec!["smoke".to_string(), "auth".to_string()]
        }

        async fn test(&self) -> HookResult {
            Ok(())
        }
    }

    struct Renamed;

    #[async_trait]
    impl Test for Renamed {
        fn name(&self) -> String {
            "Checkout with coupon".to_string()
        }

        async fn test(&self) -> HookResult {
            Ok(())
        }
    }

    #[test]
    fn test_name_derived_from_type() {
        assert_eq!(LoginWithValidUser.name(), "LoginWithValidUser");
        assert_eq!(LoginWithValidUser.title(), "LoginWithValidUser #smoke #auth");
    }

    #[test]
    fn test_name_override() {
        assert_eq!(Renamed.title(), "Checkout with coupon");
    }

    #[test]
    fn test_short_type_name_strips_generics() {
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
        assert_eq!(short_type_name::<LoginWithValidUser>(), "LoginWithValidUser");
    }
}

//! Browser-control handle contract
//!
//! The executor only needs a small surface from the browser layer: navigate,
//! locate elements, wait for a condition, run a script and dispose. Any
//! remote-automation client implementing [`Driver`] can back a run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No element found for {0}")]
    NoSuchElement(String),

    #[error("Timed out after {ms} ms waiting for {condition}")]
    WaitTimeout { condition: String, ms: u64 },

    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("Session not available: {0}")]
    Session(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Element lookup strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
    ClassName(String),
    TagName(String),
    LinkText(String),
    PartialLinkText(String),
}

impl Locator {
    /// Parse a selector string; an `xpath:` prefix or a leading `/` selects XPath
    pub fn parse(selector: &str) -> Self {
        if let Some(xpath) = selector.strip_prefix("xpath:") {
            Locator::XPath(xpath.to_string())
        } else if selector.starts_with('/') {
            Locator::XPath(selector.to_string())
        } else {
            Locator::Css(selector.to_string())
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Name(v) => write!(f, "name={}", v),
            Locator::ClassName(v) => write!(f, "class={}", v),
            Locator::TagName(v) => write!(f, "tag={}", v),
            Locator::LinkText(v) => write!(f, "link={}", v),
            Locator::PartialLinkText(v) => write!(f, "partial-link={}", v),
        }
    }
}

/// Opaque reference to an element held by the remote browser
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Where a pointer action lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Center of an element
    Element(ElementRef),
    /// Offset from the viewport origin
    Offset { x: i64, y: i64 },
}

impl From<ElementRef> for Target {
    fn from(element: ElementRef) -> Self {
        Target::Element(element)
    }
}

/// Conditions understood by [`wait_until`]
#[derive(Debug, Clone)]
pub enum Condition {
    Located(Locator),
    Visible(Locator),
    TitleIs(String),
    TitleContains(String),
    UrlContains(String),
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Located(l) => write!(f, "element located ({})", l),
            Condition::Visible(l) => write!(f, "element visible ({})", l),
            Condition::TitleIs(t) => write!(f, "title is '{}'", t),
            Condition::TitleContains(t) => write!(f, "title contains '{}'", t),
            Condition::UrlContains(u) => write!(f, "url contains '{}'", u),
        }
    }
}

/// Browser-control handle.
///
/// Commands issued on one handle complete in issue order. There is no
/// cancellation: a command runs to completion once awaited.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn find_element(&self, locator: &Locator) -> DriverResult<ElementRef>;

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>>;

    async fn click(&self, target: &Target) -> DriverResult<()>;

    async fn move_to(&self, target: &Target) -> DriverResult<()>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()>;

    async fn clear(&self, element: &ElementRef) -> DriverResult<()>;

    async fn text(&self, element: &ElementRef) -> DriverResult<String>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool>;

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> DriverResult<serde_json::Value>;

    async fn title(&self) -> DriverResult<String>;

    async fn current_url(&self) -> DriverResult<String>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// End the browser session. Calling it twice is a no-op.
    async fn dispose(&self) -> DriverResult<()>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(
    driver: &dyn Driver,
    condition: &Condition,
    timeout: Duration,
) -> DriverResult<()> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check(driver, condition).await {
            Ok(true) => {
                debug!("{} satisfied after {} attempt(s)", condition, attempts);
                return Ok(());
            }
            Ok(false) | Err(DriverError::NoSuchElement(_)) => {}
            Err(e) => return Err(e),
        }

        if start.elapsed() >= timeout {
            return Err(DriverError::WaitTimeout {
                condition: condition.to_string(),
                ms: timeout.as_millis() as u64,
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

async fn check(driver: &dyn Driver, condition: &Condition) -> DriverResult<bool> {
    match condition {
        Condition::Located(locator) => Ok(!driver.find_elements(locator).await?.is_empty()),
        Condition::Visible(locator) => {
            let element = driver.find_element(locator).await?;
            driver.is_displayed(&element).await
        }
        Condition::TitleIs(expected) => Ok(driver.title().await? == *expected),
        Condition::TitleContains(part) => Ok(driver.title().await?.contains(part.as_str())),
        Condition::UrlContains(part) => Ok(driver.current_url().await?.contains(part.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_parse() {
        assert_eq!(Locator::parse("#login"), Locator::Css("#login".to_string()));
        assert_eq!(
            Locator::parse("xpath://div[@id='x']"),
            Locator::XPath("//div[@id='x']".to_string())
        );
        assert_eq!(Locator::parse("//button"), Locator::XPath("//button".to_string()));
    }

    #[test]
    fn test_target_from_element() {
        let target: Target = ElementRef("abc".to_string()).into();
        match target {
            Target::Element(e) => assert_eq!(e.id(), "abc"),
            Target::Offset { .. } => panic!("expected element target"),
        }
    }
}

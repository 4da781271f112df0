//! HTTP client for a W3C WebDriver remote end

use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use walnut_core::driver::{Driver, DriverError, DriverResult, ElementRef, Locator, Target};
use walnut_core::settings::{Browser, WebDriverSettings};

use crate::protocol::{
    element_from, elements_from, error_from, locator_body, pointer_actions, session_request,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One browser session on a remote end
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
    session: Mutex<Option<String>>,
}

impl WebDriverClient {
    /// Wait for the remote end to report ready, then open a session
    pub async fn connect(browser: Browser, settings: &WebDriverSettings) -> DriverResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        let client = Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            session: Mutex::new(None),
        };

        client
            .wait_for_ready(Duration::from_millis(settings.startup_timeout_ms))
            .await?;

        let body = session_request(browser, settings);
        let value = client
            .send(Method::POST, &format!("{}/session", client.base_url), Some(body))
            .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::InvalidResponse(format!("no sessionId in {}", value)))?
            .to_string();

        info!("Opened {} session {} at {}", browser, session_id, client.base_url);
        *client.session.lock() = Some(session_id);
        Ok(client)
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().clone()
    }

    /// Poll `GET /status` until the remote end is ready
    async fn wait_for_ready(&self, timeout: Duration) -> DriverResult<()> {
        let status_url = format!("{}/status", self.base_url);
        let start = Instant::now();
        let mut attempts = 0u32;

        while start.elapsed() < timeout {
            attempts += 1;

            match self.http.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp.json().await.unwrap_or(Value::Null);
                    if body["value"]["ready"].as_bool().unwrap_or(true) {
                        debug!("WebDriver ready after {} attempt(s)", attempts);
                        return Ok(());
                    }
                }
                Ok(resp) => {
                    warn!("WebDriver status returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for WebDriver at {}...", self.base_url);
                    }
                    if !e.is_connect() {
                        warn!("WebDriver status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(DriverError::Transport(format!(
            "WebDriver at {} not ready after {} attempts",
            self.base_url, attempts
        )))
    }

    /// Send a session command and return its `value`
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> DriverResult<Value> {
        let session = self
            .session_id()
            .ok_or_else(|| DriverError::Session("session already closed".to_string()))?;
        let url = format!("{}/session/{}{}", self.base_url, session, path);
        self.send(method, &url, body).await
    }

    async fn send(&self, method: Method, url: &str, body: Option<Value>) -> DriverResult<Value> {
        debug!("{} {}", method, url);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.map_err(transport)?;
        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| {
            DriverError::InvalidResponse(format!("{} from {}: {}", status, url, e))
        })?;

        if !status.is_success() {
            return Err(error_from(status.as_u16(), &body));
        }
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }
}

fn transport(e: reqwest::Error) -> DriverError {
    DriverError::Transport(e.to_string())
}

fn expect_str(value: Value) -> DriverResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(DriverError::InvalidResponse(format!("expected a string, got {}", other))),
    }
}

#[async_trait]
impl Driver for WebDriverClient {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> DriverResult<ElementRef> {
        let value = self
            .command(Method::POST, "/element", Some(locator_body(locator)))
            .await
            .map_err(|e| match e {
                DriverError::NoSuchElement(_) => DriverError::NoSuchElement(locator.to_string()),
                other => other,
            })?;
        element_from(&value)
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        let value = self
            .command(Method::POST, "/elements", Some(locator_body(locator)))
            .await?;
        elements_from(&value)
    }

    async fn click(&self, target: &Target) -> DriverResult<()> {
        match target {
            Target::Element(element) => {
                let path = format!("/element/{}/click", element.id());
                self.command(Method::POST, &path, Some(json!({}))).await?;
            }
            Target::Offset { .. } => {
                self.command(Method::POST, "/actions", Some(pointer_actions(target, true)))
                    .await?;
                self.command(Method::DELETE, "/actions", None).await?;
            }
        }
        Ok(())
    }

    async fn move_to(&self, target: &Target) -> DriverResult<()> {
        self.command(Method::POST, "/actions", Some(pointer_actions(target, false)))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
        let path = format!("/element/{}/value", element.id());
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> DriverResult<()> {
        let path = format!("/element/{}/clear", element.id());
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> DriverResult<String> {
        let path = format!("/element/{}/text", element.id());
        expect_str(self.command(Method::GET, &path, None).await?)
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let path = format!("/element/{}/attribute/{}", element.id(), name);
        match self.command(Method::GET, &path, None).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
        let path = format!("/element/{}/displayed", element.id());
        let value = self.command(Method::GET, &path, None).await?;
        value
            .as_bool()
            .ok_or_else(|| DriverError::InvalidResponse(format!("expected a bool, got {}", value)))
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn title(&self) -> DriverResult<String> {
        expect_str(self.command(Method::GET, "/title", None).await?)
    }

    async fn current_url(&self) -> DriverResult<String> {
        expect_str(self.command(Method::GET, "/url", None).await?)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let encoded = expect_str(self.command(Method::GET, "/screenshot", None).await?)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| DriverError::InvalidResponse(format!("screenshot is not base64: {}", e)))
    }

    async fn dispose(&self) -> DriverResult<()> {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return Ok(());
        };
        let url = format!("{}/session/{}", self.base_url, session);
        self.send(Method::DELETE, &url, None).await?;
        info!("Closed session {}", session);
        Ok(())
    }
}

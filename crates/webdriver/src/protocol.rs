//! W3C WebDriver wire format helpers

use serde_json::{json, Map, Value};
use walnut_core::driver::{DriverError, DriverResult, ElementRef, Locator, Target};
use walnut_core::settings::{Browser, WebDriverSettings};

/// Key under which the remote end serializes element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a07e-4f0a11f8a3b5";

/// `{"using": ..., "value": ...}` body of a find request
pub fn locator_body(locator: &Locator) -> Value {
    let (using, value) = match locator {
        Locator::Css(v) => ("css selector", v.clone()),
        Locator::XPath(v) => ("xpath", v.clone()),
        Locator::Id(v) => ("css selector", format!("[id=\"{}\"]", v)),
        Locator::Name(v) => ("css selector", format!("[name=\"{}\"]", v)),
        Locator::ClassName(v) => ("css selector", format!(".{}", v)),
        Locator::TagName(v) => ("tag name", v.clone()),
        Locator::LinkText(v) => ("link text", v.clone()),
        Locator::PartialLinkText(v) => ("partial link text", v.clone()),
    };
    json!({ "using": using, "value": value })
}

/// Element reference in a response `value`
pub fn element_from(value: &Value) -> DriverResult<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| DriverError::InvalidResponse(format!("not an element: {}", value)))
}

pub fn elements_from(value: &Value) -> DriverResult<Vec<ElementRef>> {
    value
        .as_array()
        .ok_or_else(|| DriverError::InvalidResponse(format!("not an element list: {}", value)))?
        .iter()
        .map(element_from)
        .collect()
}

/// Element reference as a script argument or pointer origin
pub fn element_arg(element: &ElementRef) -> Value {
    json!({ ELEMENT_KEY: element.id() })
}

/// Error carried in a non-success response body
pub fn error_from(status: u16, body: &Value) -> DriverError {
    let value = body.get("value").unwrap_or(body);
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status));

    match error.as_str() {
        "no such element" => DriverError::NoSuchElement(message),
        "invalid session id" | "session not created" => DriverError::Session(message),
        _ => DriverError::Protocol { error, message },
    }
}

/// Pointer action sequence moving to `target`, optionally clicking
pub fn pointer_actions(target: &Target, click: bool) -> Value {
    let (origin, x, y) = match target {
        Target::Element(element) => (element_arg(element), 0, 0),
        Target::Offset { x, y } => (json!("viewport"), *x, *y),
    };

    let mut actions = vec![json!({
        "type": "pointerMove",
        "duration": 0,
        "origin": origin,
        "x": x,
        "y": y,
    })];
    if click {
        actions.push(json!({ "type": "pointerDown", "button": 0 }));
        actions.push(json!({ "type": "pointerUp", "button": 0 }));
    }

    json!({
        "actions": [{
            "type": "pointer",
            "id": "mouse",
            "parameters": { "pointerType": "mouse" },
            "actions": actions,
        }]
    })
}

/// New-session request body for `browser`
pub fn session_request(browser: Browser, settings: &WebDriverSettings) -> Value {
    let mut caps = Map::new();
    match browser {
        Browser::Chrome | Browser::Electron => {
            caps.insert("browserName".into(), json!("chrome"));
            if settings.headless && browser == Browser::Chrome {
                caps.insert("goog:chromeOptions".into(), json!({ "args": ["--headless=new"] }));
            }
        }
        Browser::Firefox => {
            caps.insert("browserName".into(), json!("firefox"));
            if settings.headless {
                caps.insert("moz:firefoxOptions".into(), json!({ "args": ["-headless"] }));
            }
        }
        Browser::Edge => {
            caps.insert("browserName".into(), json!("MicrosoftEdge"));
            if settings.headless {
                caps.insert("ms:edgeOptions".into(), json!({ "args": ["--headless=new"] }));
            }
        }
    }

    // User capabilities win over the defaults above
    if let Some(Value::Object(extra)) = &settings.capabilities {
        for (key, value) in extra {
            caps.insert(key.clone(), value.clone());
        }
    }

    json!({ "capabilities": { "alwaysMatch": Value::Object(caps) } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_body() {
        assert_eq!(
            locator_body(&Locator::Id("login".to_string())),
            json!({ "using": "css selector", "value": "[id=\"login\"]" })
        );
        assert_eq!(
            locator_body(&Locator::XPath("//a".to_string()))["using"],
            json!("xpath")
        );
    }

    #[test]
    fn test_element_round_trip_through_wire_key() {
        let value = json!({ ELEMENT_KEY: "abc-1" });
        let element = element_from(&value).unwrap();
        assert_eq!(element.id(), "abc-1");
        assert_eq!(element_arg(&element), value);
        assert!(element_from(&json!({ "other": 1 })).is_err());
    }

    #[test]
    fn test_error_mapping() {
        let body = json!({ "value": { "error": "no such element", "message": "gone" } });
        assert!(matches!(error_from(404, &body), DriverError::NoSuchElement(m) if m == "gone"));

        let body = json!({ "value": { "error": "element click intercepted", "message": "covered" } });
        match error_from(400, &body) {
            DriverError::Protocol { error, message } => {
                assert_eq!(error, "element click intercepted");
                assert_eq!(message, "covered");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            error_from(502, &json!({})),
            DriverError::Protocol { ref message, .. } if message == "HTTP 502"
        ));
    }

    #[test]
    fn test_offset_click_actions() {
        let body = pointer_actions(&Target::Offset { x: 10, y: 20 }, true);
        let steps = &body["actions"][0]["actions"];
        assert_eq!(steps[0]["origin"], json!("viewport"));
        assert_eq!(steps[0]["x"], json!(10));
        assert_eq!(steps.as_array().unwrap().len(), 3);

        let hover = pointer_actions(&Target::Element(ElementRef("e1".to_string())), false);
        assert_eq!(hover["actions"][0]["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_session_request_merges_user_capabilities() {
        let settings = WebDriverSettings {
            capabilities: Some(json!({ "goog:chromeOptions": { "binary": "/opt/app" } })),
            ..Default::default()
        };
        let body = session_request(Browser::Electron, &settings);
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], json!("chrome"));
        assert_eq!(caps["goog:chromeOptions"]["binary"], json!("/opt/app"));

        let body = session_request(Browser::Firefox, &WebDriverSettings::default());
        assert_eq!(
            body["capabilities"]["alwaysMatch"]["moz:firefoxOptions"]["args"][0],
            json!("-headless")
        );
    }
}

//! Minimal W3C WebDriver client.
//!
//! The listing pages are rendered client-side, so headlines are read through
//! a real browser driven by a WebDriver server (`chromedriver`,
//! `geckodriver`, or a Selenium grid). Only the handful of commands the
//! pagination loop needs are implemented:
//!
//! | Command | Endpoint |
//! |---------|----------|
//! | New session | `POST /session` |
//! | Navigate | `POST /session/{id}/url` |
//! | Page source | `GET /session/{id}/source` |
//! | Find element(s) | `POST /session/{id}/element[s]` |
//! | Is enabled | `GET /session/{id}/element/{eid}/enabled` |
//! | Execute script | `POST /session/{id}/execute/sync` |
//! | Delete session | `DELETE /session/{id}` |

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Key under which W3C drivers serialize element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub type Result<T> = std::result::Result<T, WebDriverError>;

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Timed out after {waited:?} waiting for {selector}")]
    Timeout { selector: String, waited: Duration },

    #[error("WebDriver error ({error}): {message}")]
    Protocol { error: String, message: String },

    #[error("Malformed WebDriver response: {0}")]
    Malformed(String),
}

impl WebDriverError {
    /// Conditions that end pagination quietly: the page simply has no more
    /// content or controls to offer.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            WebDriverError::NoSuchElement(_) | WebDriverError::Timeout { .. }
        )
    }
}

impl From<reqwest::Error> for WebDriverError {
    fn from(err: reqwest::Error) -> Self {
        WebDriverError::Network(err.to_string())
    }
}

impl From<url::ParseError> for WebDriverError {
    fn from(err: url::ParseError) -> Self {
        WebDriverError::Malformed(err.to_string())
    }
}

/// Opaque reference to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// Connection details for a WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriver {
    client: reqwest::Client,
    base: Url,
}

impl WebDriver {
    /// Point the client at a WebDriver server, e.g. `http://localhost:9515`.
    pub fn new(endpoint: &str) -> Result<Self> {
        let mut endpoint = endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base: Url::parse(&endpoint)?,
        })
    }

    /// Start a new Chrome session.
    #[instrument(level = "info", skip(self), fields(endpoint = %self.base))]
    pub async fn new_session(&self, headless: bool) -> Result<Session> {
        let mut args = vec!["--window-size=1366,900"];
        if headless {
            args.push("--headless=new");
        }
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let url = self.base.join("session")?;
        let resp = self.client.post(url).json(&body).send().await?;
        let value = decode(resp.status(), &resp.text().await?)?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Malformed(format!("no sessionId in {value}")))?
            .to_string();

        info!(session_id = %id, headless, "WebDriver session started");
        Ok(Session {
            client: self.client.clone(),
            base: self.base.clone(),
            id,
        })
    }
}

/// A live browser session.
///
/// Sessions are not closed on drop; call [`Session::quit`] once the work is
/// done.
#[derive(Debug)]
pub struct Session {
    client: reqwest::Client,
    base: Url,
    id: String,
}

impl Session {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.base.join(&format!("session/{}/{}", self.id, path))?;
        debug!(%method, %url, "WebDriver command");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        decode(status, &resp.text().await?)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    pub async fn page_source(&self) -> Result<String> {
        match self.command(Method::GET, "source", None).await? {
            Value::String(html) => Ok(html),
            other => Err(WebDriverError::Malformed(format!("page source was {other}"))),
        }
    }

    /// Locate the first element matching a CSS selector.
    pub async fn find_element(&self, css: &str) -> Result<ElementRef> {
        let value = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        element_ref(&value)
    }

    /// Locate every element matching a CSS selector; an empty result is not an error.
    pub async fn find_elements(&self, css: &str) -> Result<Vec<ElementRef>> {
        let value = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        match value {
            Value::Array(items) => items.iter().map(element_ref).collect(),
            other => Err(WebDriverError::Malformed(format!("elements were {other}"))),
        }
    }

    pub async fn is_enabled(&self, element: &ElementRef) -> Result<bool> {
        let value = self
            .command(Method::GET, &format!("element/{}/enabled", element.0), None)
            .await?;
        value
            .as_bool()
            .ok_or_else(|| WebDriverError::Malformed(format!("enabled was {value}")))
    }

    /// Run a synchronous script with `element` bound to `arguments[0]`.
    pub async fn execute_on(&self, script: &str, element: &ElementRef) -> Result<Value> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [{ ELEMENT_KEY: element.0 }] })),
        )
        .await
    }

    pub async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        self.execute_on("arguments[0].scrollIntoView(true);", element)
            .await
            .map(|_| ())
    }

    pub async fn click(&self, element: &ElementRef) -> Result<()> {
        self.execute_on("arguments[0].click();", element)
            .await
            .map(|_| ())
    }

    /// End the session and close the browser.
    #[instrument(level = "info", skip(self), fields(session_id = %self.id))]
    pub async fn quit(self) -> Result<()> {
        let url = self.base.join(&format!("session/{}", self.id))?;
        let resp = self.client.delete(url).send().await?;
        let status = resp.status();
        match decode(status, &resp.text().await?) {
            Ok(_) => {
                info!("WebDriver session closed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "WebDriver session did not close cleanly");
                Err(e)
            }
        }
    }
}

/// Unwrap the `{"value": ...}` envelope, mapping W3C error payloads.
fn decode(status: StatusCode, body: &str) -> Result<Value> {
    let mut envelope: Value = serde_json::from_str(body).map_err(|e| {
        WebDriverError::Malformed(format!("status {status}: {e}"))
    })?;
    let value = envelope
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(match error {
            "no such element" => WebDriverError::NoSuchElement(message),
            _ => WebDriverError::Protocol {
                error: error.to_string(),
                message,
            },
        });
    }
    if !status.is_success() {
        return Err(WebDriverError::Protocol {
            error: status.to_string(),
            message: value.to_string(),
        });
    }
    Ok(value)
}

fn element_ref(value: &Value) -> Result<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| WebDriverError::Malformed(format!("not an element reference: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success_unwraps_value() {
        let value = decode(StatusCode::OK, r#"{"value": "<html></html>"}"#).unwrap();
        assert_eq!(value, Value::String("<html></html>".into()));
    }

    #[test]
    fn test_decode_null_value() {
        let value = decode(StatusCode::OK, r#"{"value": null}"#).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_decode_no_such_element() {
        let body = r#"{"value": {"error": "no such element", "message": "Unable to locate element", "stacktrace": ""}}"#;
        let err = decode(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, WebDriverError::NoSuchElement(ref m) if m == "Unable to locate element"));
        assert!(err.is_exhaustion());
    }

    #[test]
    fn test_decode_other_errors_are_protocol_errors() {
        let body = r#"{"value": {"error": "invalid session id", "message": "gone"}}"#;
        let err = decode(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, WebDriverError::Protocol { ref error, .. } if error == "invalid session id"));
        assert!(!err.is_exhaustion());
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = decode(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, WebDriverError::Malformed(_)));
    }

    #[test]
    fn test_element_ref_extraction() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_ref(&value).unwrap(), ElementRef("abc-123".into()));
        assert!(element_ref(&json!({"ELEMENT": "legacy"})).is_err());
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let driver = WebDriver::new("http://localhost:9515").unwrap();
        assert_eq!(driver.base.join("session").unwrap().as_str(), "http://localhost:9515/session");
    }
}

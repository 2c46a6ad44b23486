//! W3C WebDriver client for an Appium server.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{json, Value};

use crate::config::DriverConfig;
use crate::driver::{DeviceDriver, ElementId, Gesture, Locator, Rect, Size};
use crate::errors::{MobiClawError, MobiClawResult};

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Pre-W3C JSONWP key some servers still return.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

struct W3cError {
    error: String,
    message: String,
}

impl W3cError {
    fn is_no_such_element(&self) -> bool {
        self.error == "no such element"
    }
}

pub struct AppiumDriver {
    cfg: DriverConfig,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl AppiumDriver {
    pub fn new(cfg: DriverConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
            session_id: None,
        }
    }

    fn capabilities(&self) -> Value {
        let mut caps = json!({
            "platformName": self.cfg.platform_name,
            "appium:deviceName": self.cfg.device_name,
            "appium:automationName": self.cfg.automation_name,
            "appium:newCommandTimeout": self.cfg.new_command_timeout_secs,
        });
        if let Some(pkg) = &self.cfg.app_package {
            caps["appium:appPackage"] = json!(pkg);
        }
        if let Some(activity) = &self.cfg.app_activity {
            caps["appium:appActivity"] = json!(activity);
        }
        json!({ "capabilities": { "alwaysMatch": caps, "firstMatch": [{}] } })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.server_url.trim_end_matches('/'), path)
    }

    fn session_path(&self, path: &str) -> MobiClawResult<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| MobiClawError::DriverSession("no active session".into()))?;
        Ok(format!("/session/{id}{path}"))
    }

    /// One HTTP round-trip. The outer error is transport; the inner one is a W3C error reply.
    async fn raw_call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> MobiClawResult<Result<Value, W3cError>> {
        let mut req = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        let mut json: Value = response.json().await.unwrap_or(Value::Null);
        let value = json.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::debug!(%method, path, %status, error, "webdriver error reply");
            return Ok(Err(W3cError {
                error: error.to_string(),
                message,
            }));
        }
        if !status.is_success() {
            return Ok(Err(W3cError {
                error: format!("http {status}"),
                message: value.to_string(),
            }));
        }
        Ok(Ok(value))
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> MobiClawResult<Value> {
        self.raw_call(method, path, body).await?.map_err(|e| {
            MobiClawError::DriverOperationFailed(format!("{}: {}", e.error, e.message))
        })
    }

    async fn session_call(&self, method: Method, path: &str, body: Option<Value>) -> MobiClawResult<Value> {
        let path = self.session_path(path)?;
        self.call(method, &path, body).await
    }

    async fn execute_mobile(&self, script: &str, args: Value) -> MobiClawResult<Value> {
        self.session_call(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [args] })),
        )
        .await
    }
}

#[async_trait]
impl DeviceDriver for AppiumDriver {
    async fn start_session(&mut self) -> MobiClawResult<()> {
        if self.session_id.is_some() {
            return Ok(());
        }
        let value = self
            .raw_call(Method::POST, "/session", Some(self.capabilities()))
            .await
            .map_err(|e| MobiClawError::DriverSession(format!("cannot reach {}: {e}", self.cfg.server_url)))?
            .map_err(|e| MobiClawError::DriverSession(format!("{}: {}", e.error, e.message)))?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| MobiClawError::DriverSession("session reply carried no sessionId".into()))?;
        tracing::info!(session = id, server = %self.cfg.server_url, "driver session started");
        self.session_id = Some(id.to_string());
        Ok(())
    }

    async fn end_session(&mut self) -> MobiClawResult<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        self.call(Method::DELETE, &format!("/session/{id}"), None)
            .await
            .map_err(|e| MobiClawError::DriverSession(e.to_string()))?;
        tracing::info!(session = %id, "driver session ended");
        Ok(())
    }

    async fn find_element(&self, locator: &Locator, timeout: Duration) -> MobiClawResult<ElementId> {
        let path = self.session_path("/element")?;
        let body = json!({ "using": locator.strategy(), "value": locator.selector() });
        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(50));
        let started = Instant::now();

        loop {
            match self.raw_call(Method::POST, &path, Some(body.clone())).await? {
                Ok(value) => {
                    let id = value
                        .get(ELEMENT_KEY)
                        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            MobiClawError::DriverOperationFailed(format!(
                                "element reply without reference: {value}"
                            ))
                        })?;
                    return Ok(ElementId(id.to_string()));
                }
                Err(e) if e.is_no_such_element() => {
                    if started.elapsed() >= timeout {
                        return Err(MobiClawError::ElementNotFound {
                            locator: locator.to_string(),
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(poll).await;
                }
                Err(e) => {
                    return Err(MobiClawError::DriverOperationFailed(format!(
                        "{}: {}",
                        e.error, e.message
                    )))
                }
            }
        }
    }

    async fn click(&self, element: &ElementId) -> MobiClawResult<()> {
        self.session_call(Method::POST, &format!("/element/{}/click", element.0), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> MobiClawResult<()> {
        self.session_call(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementId) -> MobiClawResult<()> {
        self.session_call(Method::POST, &format!("/element/{}/clear", element.0), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn element_rect(&self, element: &ElementId) -> MobiClawResult<Rect> {
        let v = self
            .session_call(Method::GET, &format!("/element/{}/rect", element.0), None)
            .await?;
        Ok(Rect {
            x: number(&v, "x"),
            y: number(&v, "y"),
            width: number(&v, "width"),
            height: number(&v, "height"),
        })
    }

    async fn window_size(&self) -> MobiClawResult<Size> {
        let v = self.session_call(Method::GET, "/window/rect", None).await?;
        Ok(Size {
            width: number(&v, "width"),
            height: number(&v, "height"),
        })
    }

    async fn perform_gesture(&self, gesture: &Gesture) -> MobiClawResult<()> {
        self.session_call(Method::POST, "/actions", Some(pointer_actions(gesture)))
            .await?;
        // Release any pointer left down if the server aborted mid-sequence.
        if let Err(e) = self.session_call(Method::DELETE, "/actions", None).await {
            tracing::debug!(error = %e, "release actions failed");
        }
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> MobiClawResult<()> {
        self.execute_mobile("mobile: activateApp", json!({ "appId": app_id }))
            .await?;
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> MobiClawResult<()> {
        self.execute_mobile("mobile: terminateApp", json!({ "appId": app_id }))
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> MobiClawResult<Vec<u8>> {
        let v = self.session_call(Method::GET, "/screenshot", None).await?;
        let encoded: String = v
            .as_str()
            .ok_or_else(|| MobiClawError::EvidenceCaptureFailed("screenshot reply is not a string".into()))?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| MobiClawError::EvidenceCaptureFailed(format!("screenshot base64: {e}")))
    }

    async fn back(&self) -> MobiClawResult<()> {
        self.session_call(Method::POST, "/back", Some(json!({}))).await?;
        Ok(())
    }
}

fn number(v: &Value, key: &str) -> i64 {
    v.get(key)
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)))
        .unwrap_or_default()
}

/// W3C pointer action sequence for a single touch.
fn pointer_actions(g: &Gesture) -> Value {
    let mut steps = vec![
        json!({ "type": "pointerMove", "duration": 0, "origin": "viewport", "x": g.start.x, "y": g.start.y }),
        json!({ "type": "pointerDown", "button": 0 }),
    ];
    if !g.hold.is_zero() {
        steps.push(json!({ "type": "pause", "duration": g.hold.as_millis() as u64 }));
    }
    if g.end != g.start || !g.travel.is_zero() {
        steps.push(json!({
            "type": "pointerMove",
            "duration": g.travel.as_millis() as u64,
            "origin": "viewport",
            "x": g.end.x,
            "y": g.end.y,
        }));
    }
    steps.push(json!({ "type": "pointerUp", "button": 0 }));

    json!({
        "actions": [{
            "type": "pointer",
            "id": "finger",
            "parameters": { "pointerType": "touch" },
            "actions": steps,
        }]
    })
}

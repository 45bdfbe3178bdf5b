//! CDP page adapter.
//!
//! [`BrowserDriver`] speaks CDP on behalf of the geometry and input core: it
//! implements [`RemoteQuery`] and [`EventDispatch`] on top of any
//! [`CdpTransport`], hands out [`RemoteHandle`]s for selectors, and turns
//! page-lifecycle events into cancellation of in-flight waits.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::{CancelSignal, CancelSource};
use crate::cdp::{CdpClient, CdpEvent, CdpTransport};
use crate::channel::{EventDispatch, RawBoxModel, RemoteQuery};
use crate::config::InputConfig;
use crate::error::BrowserError;
use crate::geometry::Viewport;
use crate::handle::RemoteHandle;
use crate::keyboard::{KeyEvent, KeyEventType};
use crate::mouse::MouseEvent;

/// Error message Chromium returns from `DOM.getBoxModel` for nodes without layout.
const NO_BOX_MODEL_MESSAGE: &str = "Could not compute box model";

/// Resolves on the page's next animation frame.
const NEXT_FRAME_EXPRESSION: &str =
    "new Promise(resolve => requestAnimationFrame(() => resolve()))";

/// CDP-backed implementation of the remote query and event dispatch channels.
pub struct BrowserDriver {
    transport: Arc<dyn CdpTransport>,
    lifecycle: Arc<CancelSource>,
    _lifecycle_watcher: Option<tokio::task::JoinHandle<()>>,
}

impl BrowserDriver {
    /// Connect to a DevTools page target and enable the DOM, Page and
    /// Runtime domains.
    ///
    /// Main-frame navigations and execution-context resets cancel every
    /// [`CancelSignal`] taken before them.
    pub async fn connect(ws_url: &str, config: &InputConfig) -> Result<Self, BrowserError> {
        let mut client = CdpClient::connect(ws_url)
            .await?
            .with_command_timeout(config.command_timeout());

        client.enable_domain("Page").await?;
        client.enable_domain("DOM").await?;
        client.enable_domain("Runtime").await?;

        let events = client.take_events();
        let mut driver = Self::from_transport(Arc::new(client));

        if let Some(mut events) = events {
            let lifecycle = Arc::clone(&driver.lifecycle);
            driver._lifecycle_watcher = Some(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if is_context_teardown(&event) {
                        tracing::info!(method = %event.method, "page context torn down");
                        lifecycle.cancel();
                    }
                }
            }));
        }

        Ok(driver)
    }

    /// Build a driver over an existing transport (for testing or when the
    /// connection is managed elsewhere).
    pub fn from_transport(transport: Arc<dyn CdpTransport>) -> Self {
        Self {
            transport,
            lifecycle: Arc::new(CancelSource::new()),
            _lifecycle_watcher: None,
        }
    }

    pub fn transport(&self) -> &Arc<dyn CdpTransport> {
        &self.transport
    }

    /// A cancellation signal bound to the current page context.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.lifecycle.signal()
    }

    /// The source behind [`cancel_signal`](Self::cancel_signal), for owners
    /// that learn about teardown through other channels.
    pub fn lifecycle(&self) -> &CancelSource {
        &self.lifecycle
    }

    /// Evaluate a JavaScript expression in the page, awaiting promises.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .transport
            .send_command("Runtime.evaluate", build_evaluate_params(expression))
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| exception.get("text").and_then(|t| t.as_str()))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn get_document_root(&self) -> Result<i64, BrowserError> {
        let result = self
            .transport
            .send_command("DOM.getDocument", serde_json::json!({}))
            .await?;

        result
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(|n| n.as_i64())
            .ok_or_else(|| BrowserError::Protocol {
                detail: "DOM.getDocument did not return a root nodeId".to_string(),
            })
    }

    /// Resolve the first element matching `selector` to a remote handle.
    ///
    /// Returns `Ok(None)` when nothing matches.
    pub async fn query_selector(
        &self,
        selector: &str,
    ) -> Result<Option<RemoteHandle>, BrowserError> {
        let root_id = self.get_document_root().await?;

        let result = self
            .transport
            .send_command(
                "DOM.querySelector",
                serde_json::json!({ "nodeId": root_id, "selector": selector }),
            )
            .await?;

        let node_id = result.get("nodeId").and_then(|n| n.as_i64()).unwrap_or(0);
        if node_id == 0 {
            return Ok(None);
        }

        let resolved = self
            .transport
            .send_command("DOM.resolveNode", serde_json::json!({ "nodeId": node_id }))
            .await?;

        let object_id = resolved
            .get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|id| id.as_str())
            .ok_or_else(|| BrowserError::Protocol {
                detail: format!("DOM.resolveNode returned no objectId for node {node_id}"),
            })?;

        Ok(Some(RemoteHandle::with_details(
            object_id,
            None,
            None,
            Some(selector.to_string()),
        )))
    }

    /// Like [`query_selector`](Self::query_selector) but a miss is an error.
    pub async fn require_selector(&self, selector: &str) -> Result<RemoteHandle, BrowserError> {
        self.query_selector(selector)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    /// Dispose a handle and release its remote object.
    ///
    /// Idempotent: only the first call talks to the browser.
    pub async fn dispose(&self, handle: &RemoteHandle) -> Result<(), BrowserError> {
        if !handle.mark_disposed() {
            return Ok(());
        }
        tracing::debug!(handle = %handle, "releasing remote object");
        self.transport
            .send_command(
                "Runtime.releaseObject",
                serde_json::json!({ "objectId": handle.object_id() }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteQuery for BrowserDriver {
    async fn resolve_box_model(
        &self,
        handle: &RemoteHandle,
    ) -> Result<Option<RawBoxModel>, BrowserError> {
        handle.ensure_alive()?;
        let result = self
            .transport
            .send_command("DOM.getBoxModel", build_box_model_params(handle))
            .await;

        match result {
            Ok(value) => parse_box_model_response(&value).map(Some),
            Err(err) if is_not_rendered_error(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn current_viewport(&self) -> Result<Viewport, BrowserError> {
        let metrics = self
            .transport
            .send_command("Page.getLayoutMetrics", serde_json::json!({}))
            .await?;
        parse_layout_viewport(&metrics)
    }

    async fn next_frame(&self) -> Result<(), BrowserError> {
        self.evaluate(NEXT_FRAME_EXPRESSION).await?;
        Ok(())
    }
}

#[async_trait]
impl EventDispatch for BrowserDriver {
    async fn dispatch_mouse_event(&self, event: &MouseEvent) -> Result<(), BrowserError> {
        self.transport
            .send_command("Input.dispatchMouseEvent", build_mouse_event_params(event))
            .await?;
        Ok(())
    }

    async fn dispatch_key_event(&self, event: &KeyEvent) -> Result<(), BrowserError> {
        self.transport
            .send_command("Input.dispatchKeyEvent", build_key_event_params(event))
            .await?;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), BrowserError> {
        self.transport
            .send_command("Input.insertText", serde_json::json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn focus(&self, handle: &RemoteHandle) -> Result<(), BrowserError> {
        handle.ensure_alive()?;
        self.transport
            .send_command(
                "DOM.focus",
                serde_json::json!({ "objectId": handle.object_id() }),
            )
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CDP parameter builders and response parsers
// ---------------------------------------------------------------------------

/// Whether `event` means every execution context of the page is gone.
pub fn is_context_teardown(event: &CdpEvent) -> bool {
    match event.method.as_str() {
        "Runtime.executionContextsCleared" => true,
        "Page.frameNavigated" => event
            .params
            .get("frame")
            .map(|frame| frame.get("parentId").is_none())
            .unwrap_or(false),
        _ => false,
    }
}

/// Whether a CDP error from `DOM.getBoxModel` means "no layout" rather
/// than a real failure.
pub fn is_not_rendered_error(err: &BrowserError) -> bool {
    matches!(err, BrowserError::CdpError { message, .. } if message.contains(NO_BOX_MODEL_MESSAGE))
}

/// Build CDP `Runtime.evaluate` parameters.
pub fn build_evaluate_params(expression: &str) -> Value {
    serde_json::json!({
        "expression": expression,
        "returnByValue": true,
        "awaitPromise": true,
    })
}

/// Build CDP `DOM.getBoxModel` parameters.
pub fn build_box_model_params(handle: &RemoteHandle) -> Value {
    match handle.backend_node_id() {
        Some(backend_node_id) => serde_json::json!({ "backendNodeId": backend_node_id }),
        None => serde_json::json!({ "objectId": handle.object_id() }),
    }
}

/// Extract and type-check the `model` of a `DOM.getBoxModel` result.
pub fn parse_box_model_response(result: &Value) -> Result<RawBoxModel, BrowserError> {
    let model = result
        .get("model")
        .ok_or_else(|| BrowserError::MalformedBoxModel {
            detail: "DOM.getBoxModel did not return a model".to_string(),
        })?;
    serde_json::from_value(model.clone()).map_err(|e| BrowserError::MalformedBoxModel {
        detail: e.to_string(),
    })
}

/// Read the CSS layout viewport out of `Page.getLayoutMetrics`.
pub fn parse_layout_viewport(metrics: &Value) -> Result<Viewport, BrowserError> {
    let viewport = metrics
        .get("cssLayoutViewport")
        .or_else(|| metrics.get("layoutViewport"))
        .ok_or_else(|| BrowserError::Protocol {
            detail: "Page.getLayoutMetrics returned no layout viewport".to_string(),
        })?;

    let dimension = |name: &str| {
        viewport
            .get(name)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| BrowserError::Protocol {
                detail: format!("layout viewport is missing {name}"),
            })
    };

    Ok(Viewport::new(dimension("clientWidth")?, dimension("clientHeight")?))
}

/// Build CDP `Input.dispatchMouseEvent` parameters.
pub fn build_mouse_event_params(event: &MouseEvent) -> Value {
    serde_json::json!({
        "type": event.kind.as_cdp(),
        "x": event.point.x,
        "y": event.point.y,
        "button": event.button.as_cdp(),
        "buttons": event.buttons,
        "clickCount": event.click_count,
        "modifiers": event.modifiers,
    })
}

/// Build CDP `Input.dispatchKeyEvent` parameters. Absent description fields
/// are omitted rather than sent as null. Only text-producing events carry
/// `text`; a `keyUp` never does.
pub fn build_key_event_params(event: &KeyEvent) -> Value {
    let desc = &event.description;
    let mut params = serde_json::json!({
        "type": event.kind.as_cdp(),
        "modifiers": event.modifiers,
        "autoRepeat": event.auto_repeat,
    });

    if let Some(key_code) = desc.key_code {
        params["windowsVirtualKeyCode"] = key_code.into();
    }
    if let Some(code) = &desc.code {
        params["code"] = code.as_str().into();
    }
    if let Some(key) = &desc.key {
        params["key"] = key.as_str().into();
    }
    let produces_text = matches!(event.kind, KeyEventType::KeyDown | KeyEventType::Char);
    if let Some(text) = desc.text.as_deref().filter(|_| produces_text) {
        params["text"] = text.into();
        params["unmodifiedText"] = text.into();
    }
    if let Some(location) = desc.location {
        params["location"] = location.into();
        params["isKeypad"] = (location == crate::keyboard::layout::NUMPAD).into();
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::keyboard::lookup;
    use crate::mouse::{MouseButton, MouseEventType};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned results and records every command sent.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, BrowserError>>>,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<Result<Value, BrowserError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn methods(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl CdpTransport for ScriptedTransport {
        async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
            self.sent.lock().unwrap().push((method.to_string(), params));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(serde_json::json!({})))
        }
    }

    fn box_model_reply() -> Value {
        serde_json::json!({
            "model": {
                "content": [100, 200, 300, 200, 300, 400, 100, 400],
                "padding": [100, 200, 300, 200, 300, 400, 100, 400],
                "border": [95, 195, 305, 195, 305, 405, 95, 405],
                "margin": [90, 190, 310, 190, 310, 410, 90, 410],
                "width": 200,
                "height": 200
            }
        })
    }

    #[tokio::test]
    async fn resolve_box_model_parses_reply() {
        let transport = ScriptedTransport::with(vec![Ok(box_model_reply())]);
        let driver = BrowserDriver::from_transport(transport.clone());
        let handle = RemoteHandle::new("obj-1");

        let raw = driver.resolve_box_model(&handle).await.unwrap().unwrap();
        assert_eq!(raw.content.len(), 8);
        assert_eq!(raw.width, 200.0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, "DOM.getBoxModel");
        assert_eq!(sent[0].1["objectId"], "obj-1");
    }

    #[tokio::test]
    async fn no_box_model_error_means_not_rendered() {
        let transport = ScriptedTransport::with(vec![Err(BrowserError::CdpError {
            code: -32000,
            message: "Could not compute box model.".into(),
            data: None,
        })]);
        let driver = BrowserDriver::from_transport(transport);
        let raw = driver.resolve_box_model(&RemoteHandle::new("obj-1")).await.unwrap();
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn other_cdp_errors_propagate() {
        let transport = ScriptedTransport::with(vec![Err(BrowserError::CdpError {
            code: -32000,
            message: "Cannot find context with specified id".into(),
            data: None,
        })]);
        let driver = BrowserDriver::from_transport(transport);
        let err = driver
            .resolve_box_model(&RemoteHandle::new("obj-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::CdpError { .. }));
    }

    #[tokio::test]
    async fn disposed_handle_is_not_sent() {
        let transport = ScriptedTransport::with(vec![]);
        let driver = BrowserDriver::from_transport(transport.clone());
        let handle = RemoteHandle::new("obj-1");
        handle.mark_disposed();
        let err = driver.resolve_box_model(&handle).await.unwrap_err();
        assert!(matches!(err, BrowserError::HandleDisposed { .. }));
        assert!(transport.methods().is_empty());
    }

    #[test]
    fn malformed_model_values_are_rejected() {
        let reply = serde_json::json!({
            "model": {
                "content": [0, 0, "x", 0, 1, 1, 0, 1],
                "padding": [], "border": [], "margin": [],
                "width": 1, "height": 1
            }
        });
        assert!(matches!(
            parse_box_model_response(&reply),
            Err(BrowserError::MalformedBoxModel { .. })
        ));
        assert!(matches!(
            parse_box_model_response(&serde_json::json!({})),
            Err(BrowserError::MalformedBoxModel { .. })
        ));
    }

    #[test]
    fn layout_viewport_prefers_css_pixels() {
        let metrics = serde_json::json!({
            "layoutViewport": { "clientWidth": 1600, "clientHeight": 1200 },
            "cssLayoutViewport": { "clientWidth": 800, "clientHeight": 600 }
        });
        assert_eq!(parse_layout_viewport(&metrics).unwrap(), Viewport::new(800.0, 600.0));

        let legacy = serde_json::json!({
            "layoutViewport": { "clientWidth": 1024, "clientHeight": 768 }
        });
        assert_eq!(parse_layout_viewport(&legacy).unwrap(), Viewport::new(1024.0, 768.0));
        assert!(parse_layout_viewport(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn query_selector_resolves_object_id() {
        let transport = ScriptedTransport::with(vec![
            Ok(serde_json::json!({ "root": { "nodeId": 1 } })),
            Ok(serde_json::json!({ "nodeId": 42 })),
            Ok(serde_json::json!({ "object": { "type": "object", "objectId": "obj-42" } })),
        ]);
        let driver = BrowserDriver::from_transport(transport.clone());
        let handle = driver.query_selector("#go").await.unwrap().unwrap();
        assert_eq!(handle.object_id(), "obj-42");
        assert_eq!(handle.to_string(), "#go (obj-42)");
        assert_eq!(
            transport.methods(),
            vec!["DOM.getDocument", "DOM.querySelector", "DOM.resolveNode"]
        );
    }

    #[tokio::test]
    async fn query_selector_miss_is_none() {
        let transport = ScriptedTransport::with(vec![
            Ok(serde_json::json!({ "root": { "nodeId": 1 } })),
            Ok(serde_json::json!({ "nodeId": 0 })),
        ]);
        let driver = BrowserDriver::from_transport(transport);
        assert!(driver.query_selector(".missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dispose_releases_once() {
        let transport = ScriptedTransport::with(vec![]);
        let driver = BrowserDriver::from_transport(transport.clone());
        let handle = RemoteHandle::new("obj-1");
        driver.dispose(&handle).await.unwrap();
        driver.dispose(&handle).await.unwrap();
        assert_eq!(transport.methods(), vec!["Runtime.releaseObject"]);
        assert!(handle.is_disposed());
    }

    #[tokio::test]
    async fn evaluate_surfaces_exceptions() {
        let transport = ScriptedTransport::with(vec![Ok(serde_json::json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "description": "ReferenceError: foo is not defined" }
            }
        }))]);
        let driver = BrowserDriver::from_transport(transport);
        match driver.evaluate("foo").await.unwrap_err() {
            BrowserError::JsException { message } => {
                assert_eq!(message, "ReferenceError: foo is not defined")
            }
            other => panic!("expected JsException, got {other}"),
        }
    }

    #[test]
    fn enter_key_params() {
        let event = KeyEvent {
            kind: KeyEventType::KeyDown,
            description: lookup("Enter").unwrap(),
            modifiers: 0,
            auto_repeat: false,
        };
        let params = build_key_event_params(&event);
        assert_eq!(params["type"], "keyDown");
        assert_eq!(params["windowsVirtualKeyCode"], 13);
        assert_eq!(params["code"], "Enter");
        assert_eq!(params["key"], "Enter");
        assert_eq!(params["text"], "\r");
        assert_eq!(params["unmodifiedText"], "\r");
        assert!(params.get("location").is_none());
    }

    #[test]
    fn key_up_params_carry_no_text() {
        let event = KeyEvent {
            kind: KeyEventType::KeyUp,
            description: lookup("a").unwrap(),
            modifiers: 0,
            auto_repeat: false,
        };
        let params = build_key_event_params(&event);
        assert_eq!(params["type"], "keyUp");
        assert_eq!(params["key"], "a");
        assert!(params.get("text").is_none());
        assert!(params.get("unmodifiedText").is_none());
    }

    #[test]
    fn numpad_key_params_are_keypad() {
        let event = KeyEvent {
            kind: KeyEventType::RawKeyDown,
            description: lookup("Numpad4").unwrap(),
            modifiers: 0,
            auto_repeat: true,
        };
        let params = build_key_event_params(&event);
        assert_eq!(params["location"], 3);
        assert_eq!(params["isKeypad"], true);
        assert_eq!(params["autoRepeat"], true);
    }

    #[test]
    fn unlisted_character_params_have_no_key_code() {
        let event = KeyEvent {
            kind: KeyEventType::KeyDown,
            description: lookup("好").unwrap(),
            modifiers: 0,
            auto_repeat: false,
        };
        let params = build_key_event_params(&event);
        assert_eq!(params["text"], "好");
        assert!(params.get("windowsVirtualKeyCode").is_none());
        assert!(params.get("code").is_none());
    }

    #[test]
    fn mouse_params() {
        let event = MouseEvent {
            kind: MouseEventType::Pressed,
            point: Point::new(100.0, 200.5),
            button: MouseButton::Left,
            buttons: 1,
            click_count: 2,
            modifiers: 8,
        };
        let params = build_mouse_event_params(&event);
        assert_eq!(params["type"], "mousePressed");
        assert_eq!(params["x"], 100.0);
        assert_eq!(params["y"], 200.5);
        assert_eq!(params["button"], "left");
        assert_eq!(params["buttons"], 1);
        assert_eq!(params["clickCount"], 2);
        assert_eq!(params["modifiers"], 8);
    }

    #[test]
    fn teardown_detection() {
        let cleared = CdpEvent {
            method: "Runtime.executionContextsCleared".into(),
            params: Value::Null,
        };
        let main_nav = CdpEvent {
            method: "Page.frameNavigated".into(),
            params: serde_json::json!({ "frame": { "id": "F1" } }),
        };
        let child_nav = CdpEvent {
            method: "Page.frameNavigated".into(),
            params: serde_json::json!({ "frame": { "id": "F2", "parentId": "F1" } }),
        };
        let other = CdpEvent {
            method: "Page.loadEventFired".into(),
            params: Value::Null,
        };
        assert!(is_context_teardown(&cleared));
        assert!(is_context_teardown(&main_nav));
        assert!(!is_context_teardown(&child_nav));
        assert!(!is_context_teardown(&other));
    }

    #[test]
    fn box_model_params_prefer_backend_node_id() {
        let by_object = RemoteHandle::new("obj-1");
        assert_eq!(build_box_model_params(&by_object)["objectId"], "obj-1");
        let by_backend = RemoteHandle::with_details("obj-2", Some(77), None, None);
        assert_eq!(build_box_model_params(&by_backend)["backendNodeId"], 77);
    }
}

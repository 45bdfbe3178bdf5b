//! Boundary traits between the geometry/input core and the browser.
//!
//! [`RemoteQuery`] answers geometry questions and [`EventDispatch`] delivers
//! synthesized input. [`BrowserDriver`](crate::driver::BrowserDriver)
//! implements both over CDP; tests substitute scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;
use crate::geometry::Viewport;
use crate::handle::RemoteHandle;
use crate::keyboard::KeyEvent;
use crate::mouse::MouseEvent;

/// The `model` object of a `DOM.getBoxModel` response, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBoxModel {
    pub content: Vec<f64>,
    pub padding: Vec<f64>,
    pub border: Vec<f64>,
    pub margin: Vec<f64>,
    pub width: f64,
    pub height: f64,
}

/// Read-only geometry queries against the page.
#[async_trait]
pub trait RemoteQuery: Send + Sync {
    /// Fetch the raw box model of the node behind `handle`.
    ///
    /// Returns `Ok(None)` when the node has no layout (not rendered).
    async fn resolve_box_model(
        &self,
        handle: &RemoteHandle,
    ) -> Result<Option<RawBoxModel>, BrowserError>;

    /// Current size of the layout viewport in CSS pixels.
    async fn current_viewport(&self) -> Result<Viewport, BrowserError>;

    /// Resolve at the page's next animation frame boundary.
    async fn next_frame(&self) -> Result<(), BrowserError>;
}

/// Delivery of synthesized input. Each call returns once the browser has
/// acknowledged the event.
#[async_trait]
pub trait EventDispatch: Send + Sync {
    async fn dispatch_mouse_event(&self, event: &MouseEvent) -> Result<(), BrowserError>;

    async fn dispatch_key_event(&self, event: &KeyEvent) -> Result<(), BrowserError>;

    /// Insert text as if typed by an IME, with no key events.
    async fn insert_text(&self, text: &str) -> Result<(), BrowserError>;

    async fn focus(&self, handle: &RemoteHandle) -> Result<(), BrowserError>;
}

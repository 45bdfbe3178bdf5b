//! Error types for the tactile-browser crate.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{Point, Viewport};

/// Errors that can occur during geometry queries and input synthesis.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to Chrome DevTools.
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A single CDP command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format, etc.).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// JavaScript evaluation returned an exception.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// No element matched the selector.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote handle was disposed or its execution context destroyed.
    #[error("handle {handle} is disposed")]
    HandleDisposed { handle: String },

    /// The browser returned a box model that does not satisfy the quad contract.
    #[error("malformed box model: {detail}")]
    MalformedBoxModel { detail: String },

    /// The node is not part of the render tree (e.g. `display: none` or detached).
    #[error("element {handle} is not rendered")]
    ElementNotRendered { handle: String },

    /// The element did not become stable and visible in time.
    #[error("element {handle} did not become stable and visible within {elapsed:?}")]
    WaitForStabilityTimeout { handle: String, elapsed: Duration },

    /// The owning page or frame was torn down while waiting.
    #[error("operation on {handle} cancelled: page context was torn down")]
    ElementHandleCancelled { handle: String },

    /// The interaction point could not be placed inside both viewport and element.
    #[error("point ({}, {}) cannot be clipped into viewport {}x{} without leaving the element", point.x, point.y, viewport.width, viewport.height)]
    PointOutsideViewport { point: Point, viewport: Viewport },

    /// A structural offset is missing a coordinate or has a non-numeric one.
    #[error("invalid offset: {reason}")]
    InvalidOffset { reason: String },

    /// The offset source is neither absent, an offset, nor an `{x, y}` structure.
    #[error("unsupported offset source: {kind}")]
    UnsupportedOffsetSource { kind: String },

    /// A point was divided by zero.
    #[error("division of point by zero")]
    DivisionByZero,

    /// No key description exists for this key name.
    #[error("unknown key: {key:?}")]
    UnknownKey { key: String },
}

/// Field-less discriminant of [`BrowserError`], used by the dispatcher's
/// state machine and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ConnectionFailed,
    CdpError,
    Timeout,
    Protocol,
    JsException,
    ElementNotFound,
    Config,
    HandleDisposed,
    MalformedBoxModel,
    ElementNotRendered,
    WaitForStabilityTimeout,
    ElementHandleCancelled,
    PointOutsideViewport,
    InvalidOffset,
    UnsupportedOffsetSource,
    DivisionByZero,
    UnknownKey,
}

impl BrowserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowserError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            BrowserError::CdpError { .. } => ErrorKind::CdpError,
            BrowserError::Timeout { .. } => ErrorKind::Timeout,
            BrowserError::Protocol { .. } => ErrorKind::Protocol,
            BrowserError::JsException { .. } => ErrorKind::JsException,
            BrowserError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            BrowserError::Config(_) => ErrorKind::Config,
            BrowserError::HandleDisposed { .. } => ErrorKind::HandleDisposed,
            BrowserError::MalformedBoxModel { .. } => ErrorKind::MalformedBoxModel,
            BrowserError::ElementNotRendered { .. } => ErrorKind::ElementNotRendered,
            BrowserError::WaitForStabilityTimeout { .. } => ErrorKind::WaitForStabilityTimeout,
            BrowserError::ElementHandleCancelled { .. } => ErrorKind::ElementHandleCancelled,
            BrowserError::PointOutsideViewport { .. } => ErrorKind::PointOutsideViewport,
            BrowserError::InvalidOffset { .. } => ErrorKind::InvalidOffset,
            BrowserError::UnsupportedOffsetSource { .. } => ErrorKind::UnsupportedOffsetSource,
            BrowserError::DivisionByZero => ErrorKind::DivisionByZero,
            BrowserError::UnknownKey { .. } => ErrorKind::UnknownKey,
        }
    }

    /// Geometry failures the caller can recover from by resolving the
    /// element again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ElementNotRendered | ErrorKind::WaitForStabilityTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = BrowserError::UnknownKey {
            key: "NotAKey123".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnknownKey);
        assert_eq!(BrowserError::DivisionByZero.kind(), ErrorKind::DivisionByZero);
    }

    #[test]
    fn only_geometry_failures_are_recoverable() {
        assert!(BrowserError::ElementNotRendered {
            handle: "obj-1".into()
        }
        .is_recoverable());
        assert!(BrowserError::WaitForStabilityTimeout {
            handle: "obj-1".into(),
            elapsed: Duration::from_millis(10),
        }
        .is_recoverable());
        assert!(!BrowserError::MalformedBoxModel {
            detail: "x".into()
        }
        .is_recoverable());
        assert!(!BrowserError::ElementHandleCancelled {
            handle: "obj-1".into()
        }
        .is_recoverable());
    }

    #[test]
    fn timeout_message_carries_identity_and_elapsed() {
        let err = BrowserError::WaitForStabilityTimeout {
            handle: "node#42".into(),
            elapsed: Duration::from_millis(250),
        };
        let msg = err.to_string();
        assert!(msg.contains("node#42"));
        assert!(msg.contains("250ms"));
    }

    #[test]
    fn cancellation_and_timeout_render_differently() {
        let cancelled = BrowserError::ElementHandleCancelled {
            handle: "h".into(),
        };
        let timeout = BrowserError::WaitForStabilityTimeout {
            handle: "h".into(),
            elapsed: Duration::ZERO,
        };
        assert_ne!(cancelled.to_string(), timeout.to_string());
    }
}

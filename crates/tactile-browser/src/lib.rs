//! Element geometry and input synthesis over the Chrome DevTools Protocol.
//!
//! This crate answers "where exactly on screen is this element, is it safe
//! to interact with right now, and what events reproduce a user action on
//! it?" It can:
//!
//! - Resolve an element's box model (`DOM.getBoxModel`) into validated quads
//! - Wait until the element stops moving and is visible in the viewport
//! - Compute the interaction point, with optional offsets, clipped to the viewport
//! - Describe keys on a US keyboard layout and track held modifiers
//! - Dispatch mouse and keyboard events (`Input.dispatchMouseEvent`,
//!   `Input.dispatchKeyEvent`, `Input.insertText`)
//!
//! # Architecture
//!
//! - **Geometry core** (`geometry`, `offset`, `box_model`, `clickable`):
//!   pure value types and calculations, no I/O.
//! - **Channels** (`channel`): the `RemoteQuery` and `EventDispatch` traits
//!   the core talks through.
//! - **Waiting** (`stability`, `cancel`): the bounded, cancellable polling
//!   loop and the page-lifecycle cancellation signal.
//! - **Input** (`keyboard`, `mouse`, `dispatcher`): key tables, per-session
//!   modifier state and the interaction state machine.
//! - **CDP** (`cdp`, `driver`): WebSocket transport and the page adapter
//!   implementing both channels.
//!
//! # Chrome Setup
//!
//! Chrome must be running with the `--remote-debugging-port` flag:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! Query `http://localhost:9222/json` for available page targets.
//!
//! # Example (conceptual)
//!
//! ```ignore
//! use std::sync::Arc;
//! use tactile_browser::{BrowserDriver, InputConfig, InputDispatcher, OffsetSource};
//!
//! let config = InputConfig::default();
//! let driver = Arc::new(BrowserDriver::connect("ws://localhost:9222/devtools/page/ABC", &config).await?);
//! let dispatcher = InputDispatcher::new(driver.clone(), driver.clone(), config);
//!
//! let button = driver.require_selector("#login-button").await?;
//! let cancel = driver.cancel_signal();
//! let options = dispatcher.default_click_options();
//! let report = dispatcher.click(&button, &options, OffsetSource::Absent, &cancel).await?;
//! println!("clicked at {:?} after {} attempt(s)", report.point, report.attempts);
//! driver.dispose(&button).await?;
//! ```

pub mod box_model;
pub mod cancel;
pub mod cdp;
pub mod channel;
pub mod clickable;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod keyboard;
pub mod mouse;
pub mod offset;
pub mod stability;

// Re-export key types at the crate root for convenience.
pub use box_model::BoxModel;
pub use cancel::{CancelSignal, CancelSource};
pub use cdp::{CdpClient, CdpEvent, CdpTransport};
pub use channel::{EventDispatch, RawBoxModel, RemoteQuery};
pub use clickable::clickable_point;
pub use config::InputConfig;
pub use dispatcher::{
    AttachPolicy, InputDispatcher, InteractionFailure, InteractionReport, InteractionState,
};
pub use driver::BrowserDriver;
pub use error::{BrowserError, ErrorKind};
pub use geometry::{BoundingBox, Point, Quad, Viewport};
pub use handle::RemoteHandle;
pub use keyboard::{KeyDescription, Keyboard};
pub use mouse::{ClickOptions, Mouse, MouseButton};
pub use offset::{Offset, OffsetSource};
pub use stability::StabilityGate;

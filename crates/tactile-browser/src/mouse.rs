//! Mouse session: pointer position, held buttons and event synthesis.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::channel::EventDispatch;
use crate::error::BrowserError;
use crate::geometry::Point;
use crate::keyboard::Keyboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    pub fn as_cdp(&self) -> &'static str {
        match self {
            MouseButton::None => "none",
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Back => "back",
            MouseButton::Forward => "forward",
        }
    }

    /// Bit in the CDP `buttons` mask.
    pub fn bit(&self) -> u32 {
        match self {
            MouseButton::None => 0,
            MouseButton::Left => 1,
            MouseButton::Right => 2,
            MouseButton::Middle => 4,
            MouseButton::Back => 8,
            MouseButton::Forward => 16,
        }
    }
}

const HELD_ORDER: [MouseButton; 5] = [
    MouseButton::Left,
    MouseButton::Right,
    MouseButton::Middle,
    MouseButton::Back,
    MouseButton::Forward,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventType {
    Moved,
    Pressed,
    Released,
}

impl MouseEventType {
    pub fn as_cdp(&self) -> &'static str {
        match self {
            MouseEventType::Moved => "mouseMoved",
            MouseEventType::Pressed => "mousePressed",
            MouseEventType::Released => "mouseReleased",
        }
    }
}

/// One pointer event as handed to [`EventDispatch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventType,
    pub point: Point,
    pub button: MouseButton,
    /// Mask of all buttons held after this event.
    pub buttons: u32,
    pub click_count: u32,
    pub modifiers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub click_count: u32,
    /// Pause between each press and release.
    pub delay: Duration,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct MouseState {
    position: Point,
    button: MouseButton,
    buttons: u32,
}

/// Mouse input session bound to one page. Shares modifier state with the
/// page's [`Keyboard`].
pub struct Mouse {
    events: Arc<dyn EventDispatch>,
    keyboard: Arc<Keyboard>,
    state: Mutex<MouseState>,
}

impl Mouse {
    pub fn new(events: Arc<dyn EventDispatch>, keyboard: Arc<Keyboard>) -> Self {
        Self {
            events,
            keyboard,
            state: Mutex::new(MouseState {
                position: Point::ORIGIN,
                button: MouseButton::None,
                buttons: 0,
            }),
        }
    }

    pub async fn position(&self) -> Point {
        self.state.lock().await.position
    }

    /// Move to `target` in `steps` evenly spaced `mouseMoved` events.
    pub async fn move_to(&self, target: Point, steps: u32) -> Result<(), BrowserError> {
        let modifiers = self.keyboard.modifiers().await;
        let mut state = self.state.lock().await;
        let from = state.position;
        let steps = steps.max(1);

        for i in 1..=steps {
            let t = f64::from(i) / f64::from(steps);
            let point = Point::new(
                from.x + (target.x - from.x) * t,
                from.y + (target.y - from.y) * t,
            );
            let event = MouseEvent {
                kind: MouseEventType::Moved,
                point,
                button: state.button,
                buttons: state.buttons,
                click_count: 0,
                modifiers,
            };
            self.events.dispatch_mouse_event(&event).await?;
            state.position = point;
        }
        Ok(())
    }

    pub async fn down(&self, button: MouseButton, click_count: u32) -> Result<(), BrowserError> {
        let modifiers = self.keyboard.modifiers().await;
        let mut state = self.state.lock().await;
        state.button = button;
        state.buttons |= button.bit();
        let event = MouseEvent {
            kind: MouseEventType::Pressed,
            point: state.position,
            button,
            buttons: state.buttons,
            click_count,
            modifiers,
        };
        self.events.dispatch_mouse_event(&event).await
    }

    pub async fn up(&self, button: MouseButton, click_count: u32) -> Result<(), BrowserError> {
        let modifiers = self.keyboard.modifiers().await;
        let mut state = self.state.lock().await;
        state.buttons &= !button.bit();
        if state.button == button {
            state.button = MouseButton::None;
        }
        let event = MouseEvent {
            kind: MouseEventType::Released,
            point: state.position,
            button,
            buttons: state.buttons,
            click_count,
            modifiers,
        };
        self.events.dispatch_mouse_event(&event).await
    }

    /// Release every button still held, e.g. after a click was cut short
    /// between press and release.
    pub async fn release_all(&self) -> Result<(), BrowserError> {
        let modifiers = self.keyboard.modifiers().await;
        let mut state = self.state.lock().await;
        let mut remaining = state.buttons;
        state.buttons = 0;
        state.button = MouseButton::None;

        let mut first_error = None;
        for button in HELD_ORDER {
            if remaining & button.bit() == 0 {
                continue;
            }
            remaining &= !button.bit();
            let event = MouseEvent {
                kind: MouseEventType::Released,
                point: state.position,
                button,
                buttons: remaining,
                click_count: 1,
                modifiers,
            };
            tracing::debug!(button = button.as_cdp(), "releasing held button");
            if let Err(err) = self.events.dispatch_mouse_event(&event).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Move to `point`, then press and release `click_count` times with an
    /// increasing `clickCount`, so the page sees a double click as such.
    pub async fn click(
        &self,
        point: Point,
        options: &ClickOptions,
        move_steps: u32,
    ) -> Result<(), BrowserError> {
        self.move_to(point, move_steps).await?;
        for count in 1..=options.click_count.max(1) {
            self.down(options.button, count).await?;
            if !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }
            self.up(options.button, count).await?;
        }
        tracing::debug!(x = point.x, y = point.y, button = options.button.as_cdp(), "clicked");
        Ok(())
    }
}

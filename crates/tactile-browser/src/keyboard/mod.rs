//! Keyboard session: key descriptions plus the modifier state they depend on.
//!
//! A [`Keyboard`] tracks which modifiers and key codes are held for one input
//! session. All state changes and the event dispatch that follows them happen
//! under a single async mutex, so concurrent `down` calls cannot race on the
//! modifier set.

pub mod layout;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::channel::EventDispatch;
use crate::error::BrowserError;

pub use layout::{describe_key, key_definition, lookup, KeyDefinition, KeyDescription};

/// CDP modifier bits, as used by `Input.dispatchKeyEvent` and
/// `Input.dispatchMouseEvent`.
pub mod modifiers {
    pub const NONE: u32 = 0;
    pub const ALT: u32 = 1;
    pub const CONTROL: u32 = 2;
    pub const META: u32 = 4;
    pub const SHIFT: u32 = 8;

    /// Modifier bit toggled by a key with this DOM `key` value.
    pub fn bit_for_key(key: &str) -> u32 {
        match key {
            "Alt" => ALT,
            "Control" => CONTROL,
            "Meta" => META,
            "Shift" => SHIFT,
            _ => NONE,
        }
    }
}

/// CDP `Input.dispatchKeyEvent` event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key down that produces text.
    KeyDown,
    /// Key down with no text (arrows, modifiers, function keys).
    RawKeyDown,
    KeyUp,
    Char,
}

impl KeyEventType {
    pub fn as_cdp(&self) -> &'static str {
        match self {
            KeyEventType::KeyDown => "keyDown",
            KeyEventType::RawKeyDown => "rawKeyDown",
            KeyEventType::KeyUp => "keyUp",
            KeyEventType::Char => "char",
        }
    }
}

/// One fully validated key event, ready to hand to [`EventDispatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub kind: KeyEventType,
    pub description: KeyDescription,
    pub modifiers: u32,
    pub auto_repeat: bool,
}

#[derive(Debug, Default)]
struct KeyboardState {
    modifiers: u32,
    /// Held codes, mapped to the key name they were pressed with.
    pressed: HashMap<String, String>,
}

/// Keyboard input session bound to one page.
pub struct Keyboard {
    events: Arc<dyn EventDispatch>,
    state: Mutex<KeyboardState>,
}

impl Keyboard {
    pub fn new(events: Arc<dyn EventDispatch>) -> Self {
        Self {
            events,
            state: Mutex::new(KeyboardState::default()),
        }
    }

    /// Currently held modifier bits.
    pub async fn modifiers(&self) -> u32 {
        self.state.lock().await.modifiers
    }

    /// Press `key` without releasing it.
    ///
    /// Pressing a key whose code is already down is sent as an auto-repeat.
    pub async fn down(&self, key: &str) -> Result<KeyDescription, BrowserError> {
        let mut state = self.state.lock().await;
        let description = describe_key(key, state.modifiers)?;

        let pressed_code = pressed_code(key, &description);
        let auto_repeat = state.pressed.insert(pressed_code, key.to_string()).is_some();
        if let Some(k) = &description.key {
            state.modifiers |= modifiers::bit_for_key(k);
        }

        let kind = if description.text.is_some() {
            KeyEventType::KeyDown
        } else {
            KeyEventType::RawKeyDown
        };
        let event = KeyEvent {
            kind,
            description: description.clone(),
            modifiers: state.modifiers,
            auto_repeat,
        };
        tracing::debug!(key = key, modifiers = state.modifiers, auto_repeat = auto_repeat, "key down");
        self.events.dispatch_key_event(&event).await?;
        Ok(description)
    }

    /// Release `key`.
    pub async fn up(&self, key: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().await;
        let description = describe_key(key, state.modifiers)?;

        if let Some(k) = &description.key {
            state.modifiers &= !modifiers::bit_for_key(k);
        }
        state.pressed.remove(&pressed_code(key, &description));

        let event = KeyEvent {
            kind: KeyEventType::KeyUp,
            description,
            modifiers: state.modifiers,
            auto_repeat: false,
        };
        tracing::debug!(key = key, modifiers = state.modifiers, "key up");
        self.events.dispatch_key_event(&event).await
    }

    /// Release every key still held and forget the modifier state.
    ///
    /// The state is cleared before the first `keyUp` goes out, so a failed
    /// dispatch still leaves the session with nothing held. Returns the first
    /// dispatch error after attempting every release.
    pub async fn release_all(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().await;
        let mut held: Vec<String> = state.pressed.drain().map(|(_, name)| name).collect();
        held.sort();
        let mut remaining = state.modifiers;
        state.modifiers = modifiers::NONE;

        let mut first_error = None;
        for name in held {
            let description = match describe_key(&name, remaining) {
                Ok(description) => description,
                Err(_) => continue,
            };
            if let Some(k) = &description.key {
                remaining &= !modifiers::bit_for_key(k);
            }
            let event = KeyEvent {
                kind: KeyEventType::KeyUp,
                description,
                modifiers: remaining,
                auto_repeat: false,
            };
            tracing::debug!(key = %name, "releasing held key");
            if let Err(err) = self.events.dispatch_key_event(&event).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Down, optional pause, up.
    pub async fn press(&self, key: &str, delay: Duration) -> Result<(), BrowserError> {
        self.down(key).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.up(key).await
    }

    /// Insert a character directly, without key events.
    pub async fn send_character(&self, ch: char) -> Result<(), BrowserError> {
        let mut buf = [0u8; 4];
        self.events.insert_text(ch.encode_utf8(&mut buf)).await
    }

    /// Type `text` one character at a time.
    ///
    /// Characters present in the layout are pressed as keys; anything else is
    /// inserted with [`send_character`](Self::send_character).
    pub async fn type_text(&self, text: &str, delay: Duration) -> Result<(), BrowserError> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let name: &str = ch.encode_utf8(&mut buf);
            if key_definition(name).is_some() {
                self.press(name, delay).await?;
            } else {
                self.send_character(ch).await?;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Ok(())
    }
}

/// Identity of a held key: its physical code, or the name for code-less keys.
fn pressed_code(name: &str, description: &KeyDescription) -> String {
    description
        .code
        .clone()
        .unwrap_or_else(|| name.to_string())
}

//! US keyboard layout and key descriptions.
//!
//! `US_KEYBOARD_LAYOUT` maps every logical key name the input layer accepts
//! to the values Chromium expects in `Input.dispatchKeyEvent`: the DOM `key`
//! and `code`, the Windows virtual key code, the text the key produces, and
//! its location (standard, left, right, numpad, mobile). Lookup is exact and
//! case-sensitive.
//!
//! Names fall into three groups:
//!
//! - physical codes (`KeyA`, `Digit1`, `Numpad4`, `ShiftLeft`),
//! - logical keys (`Enter`, `ArrowLeft`, `Shift`),
//! - the characters a US keyboard types directly (`a`, `A`, `!`, `\r`).
//!
//! A name that is missing from the table but is a single printable character
//! still gets a description (text only, no key code) so arbitrary Unicode
//! text can be typed. Every other unknown name is an error.

use serde::Serialize;

use crate::error::BrowserError;

use super::modifiers;

pub const LEFT: u32 = 1;
pub const RIGHT: u32 = 2;
pub const NUMPAD: u32 = 3;
pub const MOBILE: u32 = 4;

/// One row of the layout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    pub name: &'static str,
    pub key_code: Option<u32>,
    pub shift_key_code: Option<u32>,
    pub key: &'static str,
    pub shift_key: Option<&'static str>,
    pub code: Option<&'static str>,
    pub text: Option<&'static str>,
    pub location: Option<u32>,
}

/// The payload needed to synthesize one key event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyDescription {
    pub key_code: Option<u32>,
    pub key: Option<String>,
    pub text: Option<String>,
    pub code: Option<String>,
    pub location: Option<u32>,
}

const fn key(
    name: &'static str,
    key_code: u32,
    key: &'static str,
    code: &'static str,
) -> KeyDefinition {
    KeyDefinition {
        name,
        key_code: Some(key_code),
        shift_key_code: None,
        key,
        shift_key: None,
        code: Some(code),
        text: None,
        location: None,
    }
}

const fn key_without_code(name: &'static str, key_code: u32, key: &'static str) -> KeyDefinition {
    KeyDefinition {
        code: None,
        ..self::key(name, key_code, key, "")
    }
}

const fn key_without_code_point(
    name: &'static str,
    key: &'static str,
    code: &'static str,
) -> KeyDefinition {
    KeyDefinition {
        key_code: None,
        ..self::key(name, 0, key, code)
    }
}

impl KeyDefinition {
    const fn shifted(self, shift_key_code: u32, shift_key: &'static str) -> Self {
        KeyDefinition {
            shift_key_code: Some(shift_key_code),
            shift_key: Some(shift_key),
            ..self
        }
    }

    const fn with_shift_key(self, shift_key: &'static str) -> Self {
        KeyDefinition {
            shift_key: Some(shift_key),
            ..self
        }
    }

    const fn with_text(self, text: &'static str) -> Self {
        KeyDefinition {
            text: Some(text),
            ..self
        }
    }

    const fn at(self, location: u32) -> Self {
        KeyDefinition {
            location: Some(location),
            ..self
        }
    }
}

pub static US_KEYBOARD_LAYOUT: &[KeyDefinition] = &[
    // Digits
    key("0", 48, "0", "Digit0"),
    key("1", 49, "1", "Digit1"),
    key("2", 50, "2", "Digit2"),
    key("3", 51, "3", "Digit3"),
    key("4", 52, "4", "Digit4"),
    key("5", 53, "5", "Digit5"),
    key("6", 54, "6", "Digit6"),
    key("7", 55, "7", "Digit7"),
    key("8", 56, "8", "Digit8"),
    key("9", 57, "9", "Digit9"),
    // System and editing
    key_without_code_point("Power", "Power", "Power"),
    key_without_code_point("Eject", "Eject", "Eject"),
    key("Abort", 3, "Cancel", "Abort"),
    key("Help", 6, "Help", "Help"),
    key("Backspace", 8, "Backspace", "Backspace"),
    key("Tab", 9, "Tab", "Tab"),
    key("Numpad5", 12, "Clear", "Numpad5").shifted(101, "5").at(NUMPAD),
    key("NumpadEnter", 13, "Enter", "NumpadEnter").with_text("\r").at(NUMPAD),
    key("Enter", 13, "Enter", "Enter").with_text("\r"),
    key("\r", 13, "Enter", "Enter").with_text("\r"),
    key("\n", 13, "Enter", "Enter").with_text("\r"),
    key("ShiftLeft", 16, "Shift", "ShiftLeft").at(LEFT),
    key("ShiftRight", 16, "Shift", "ShiftRight").at(RIGHT),
    key("ControlLeft", 17, "Control", "ControlLeft").at(LEFT),
    key("ControlRight", 17, "Control", "ControlRight").at(RIGHT),
    key("AltLeft", 18, "Alt", "AltLeft").at(LEFT),
    key("AltRight", 18, "Alt", "AltRight").at(RIGHT),
    key("Pause", 19, "Pause", "Pause"),
    key("CapsLock", 20, "CapsLock", "CapsLock"),
    key("Escape", 27, "Escape", "Escape"),
    key("Convert", 28, "Convert", "Convert"),
    key("NonConvert", 29, "NonConvert", "NonConvert"),
    key("Space", 32, " ", "Space"),
    // Navigation, with their numpad twins
    key("Numpad9", 33, "PageUp", "Numpad9").shifted(105, "9").at(NUMPAD),
    key("PageUp", 33, "PageUp", "PageUp"),
    key("Numpad3", 34, "PageDown", "Numpad3").shifted(99, "3").at(NUMPAD),
    key("PageDown", 34, "PageDown", "PageDown"),
    key("Numpad1", 35, "End", "Numpad1").shifted(97, "1").at(NUMPAD),
    key("End", 35, "End", "End"),
    key("Numpad7", 36, "Home", "Numpad7").shifted(103, "7").at(NUMPAD),
    key("Home", 36, "Home", "Home"),
    key("Numpad4", 37, "ArrowLeft", "Numpad4").shifted(100, "4").at(NUMPAD),
    key("ArrowLeft", 37, "ArrowLeft", "ArrowLeft"),
    key("Numpad8", 38, "ArrowUp", "Numpad8").shifted(104, "8").at(NUMPAD),
    key("ArrowUp", 38, "ArrowUp", "ArrowUp"),
    key("Numpad6", 39, "ArrowRight", "Numpad6").shifted(102, "6").at(NUMPAD),
    key("ArrowRight", 39, "ArrowRight", "ArrowRight"),
    key("Numpad2", 40, "ArrowDown", "Numpad2").shifted(98, "2").at(NUMPAD),
    key("ArrowDown", 40, "ArrowDown", "ArrowDown"),
    key("Select", 41, "Select", "Select"),
    key("Open", 43, "Execute", "Open"),
    key("PrintScreen", 44, "PrintScreen", "PrintScreen"),
    key("Insert", 45, "Insert", "Insert"),
    key("Numpad0", 45, "Insert", "Numpad0").shifted(96, "0").at(NUMPAD),
    key("Delete", 46, "Delete", "Delete"),
    key("NumpadDecimal", 46, "\u{0}", "NumpadDecimal").shifted(110, ".").at(NUMPAD),
    // Physical digit and letter keys
    key("Digit0", 48, "0", "Digit0").with_shift_key(")"),
    key("Digit1", 49, "1", "Digit1").with_shift_key("!"),
    key("Digit2", 50, "2", "Digit2").with_shift_key("@"),
    key("Digit3", 51, "3", "Digit3").with_shift_key("#"),
    key("Digit4", 52, "4", "Digit4").with_shift_key("$"),
    key("Digit5", 53, "5", "Digit5").with_shift_key("%"),
    key("Digit6", 54, "6", "Digit6").with_shift_key("^"),
    key("Digit7", 55, "7", "Digit7").with_shift_key("&"),
    key("Digit8", 56, "8", "Digit8").with_shift_key("*"),
    key("Digit9", 57, "9", "Digit9").with_shift_key("("),
    key("KeyA", 65, "a", "KeyA").with_shift_key("A"),
    key("KeyB", 66, "b", "KeyB").with_shift_key("B"),
    key("KeyC", 67, "c", "KeyC").with_shift_key("C"),
    key("KeyD", 68, "d", "KeyD").with_shift_key("D"),
    key("KeyE", 69, "e", "KeyE").with_shift_key("E"),
    key("KeyF", 70, "f", "KeyF").with_shift_key("F"),
    key("KeyG", 71, "g", "KeyG").with_shift_key("G"),
    key("KeyH", 72, "h", "KeyH").with_shift_key("H"),
    key("KeyI", 73, "i", "KeyI").with_shift_key("I"),
    key("KeyJ", 74, "j", "KeyJ").with_shift_key("J"),
    key("KeyK", 75, "k", "KeyK").with_shift_key("K"),
    key("KeyL", 76, "l", "KeyL").with_shift_key("L"),
    key("KeyM", 77, "m", "KeyM").with_shift_key("M"),
    key("KeyN", 78, "n", "KeyN").with_shift_key("N"),
    key("KeyO", 79, "o", "KeyO").with_shift_key("O"),
    key("KeyP", 80, "p", "KeyP").with_shift_key("P"),
    key("KeyQ", 81, "q", "KeyQ").with_shift_key("Q"),
    key("KeyR", 82, "r", "KeyR").with_shift_key("R"),
    key("KeyS", 83, "s", "KeyS").with_shift_key("S"),
    key("KeyT", 84, "t", "KeyT").with_shift_key("T"),
    key("KeyU", 85, "u", "KeyU").with_shift_key("U"),
    key("KeyV", 86, "v", "KeyV").with_shift_key("V"),
    key("KeyW", 87, "w", "KeyW").with_shift_key("W"),
    key("KeyX", 88, "x", "KeyX").with_shift_key("X"),
    key("KeyY", 89, "y", "KeyY").with_shift_key("Y"),
    key("KeyZ", 90, "z", "KeyZ").with_shift_key("Z"),
    // Modifiers, numpad operators, function keys
    key("MetaLeft", 91, "Meta", "MetaLeft").at(LEFT),
    key("MetaRight", 92, "Meta", "MetaRight").at(RIGHT),
    key("ContextMenu", 93, "ContextMenu", "ContextMenu"),
    key("NumpadMultiply", 106, "*", "NumpadMultiply").at(NUMPAD),
    key("NumpadAdd", 107, "+", "NumpadAdd").at(NUMPAD),
    key("NumpadSubtract", 109, "-", "NumpadSubtract").at(NUMPAD),
    key("NumpadDivide", 111, "/", "NumpadDivide").at(NUMPAD),
    key("F1", 112, "F1", "F1"),
    key("F2", 113, "F2", "F2"),
    key("F3", 114, "F3", "F3"),
    key("F4", 115, "F4", "F4"),
    key("F5", 116, "F5", "F5"),
    key("F6", 117, "F6", "F6"),
    key("F7", 118, "F7", "F7"),
    key("F8", 119, "F8", "F8"),
    key("F9", 120, "F9", "F9"),
    key("F10", 121, "F10", "F10"),
    key("F11", 122, "F11", "F11"),
    key("F12", 123, "F12", "F12"),
    key("F13", 124, "F13", "F13"),
    key("F14", 125, "F14", "F14"),
    key("F15", 126, "F15", "F15"),
    key("F16", 127, "F16", "F16"),
    key("F17", 128, "F17", "F17"),
    key("F18", 129, "F18", "F18"),
    key("F19", 130, "F19", "F19"),
    key("F20", 131, "F20", "F20"),
    key("F21", 132, "F21", "F21"),
    key("F22", 133, "F22", "F22"),
    key("F23", 134, "F23", "F23"),
    key("F24", 135, "F24", "F24"),
    key("NumLock", 144, "NumLock", "NumLock"),
    key("ScrollLock", 145, "ScrollLock", "ScrollLock"),
    key("AudioVolumeMute", 173, "AudioVolumeMute", "AudioVolumeMute"),
    key("AudioVolumeDown", 174, "AudioVolumeDown", "AudioVolumeDown"),
    key("AudioVolumeUp", 175, "AudioVolumeUp", "AudioVolumeUp"),
    key("MediaTrackNext", 176, "MediaTrackNext", "MediaTrackNext"),
    key("MediaTrackPrevious", 177, "MediaTrackPrevious", "MediaTrackPrevious"),
    key("MediaStop", 178, "MediaStop", "MediaStop"),
    key("MediaPlayPause", 179, "MediaPlayPause", "MediaPlayPause"),
    // Punctuation keys
    key("Semicolon", 186, ";", "Semicolon").with_shift_key(":"),
    key("Equal", 187, "=", "Equal").with_shift_key("+"),
    key("NumpadEqual", 187, "=", "NumpadEqual").at(NUMPAD),
    key("Comma", 188, ",", "Comma").with_shift_key("<"),
    key("Minus", 189, "-", "Minus").with_shift_key("_"),
    key("Period", 190, ".", "Period").with_shift_key(">"),
    key("Slash", 191, "/", "Slash").with_shift_key("?"),
    key("Backquote", 192, "`", "Backquote").with_shift_key("~"),
    key("BracketLeft", 219, "[", "BracketLeft").with_shift_key("{"),
    key("Backslash", 220, "\\", "Backslash").with_shift_key("|"),
    key("BracketRight", 221, "]", "BracketRight").with_shift_key("}"),
    key("Quote", 222, "'", "Quote").with_shift_key("\""),
    key("AltGraph", 225, "AltGraph", "AltGraph"),
    key("Props", 247, "CrSel", "Props"),
    // Logical key names
    key("Cancel", 3, "Cancel", "Abort"),
    key("Clear", 12, "Clear", "Numpad5").at(NUMPAD),
    key("Shift", 16, "Shift", "ShiftLeft").at(LEFT),
    key("Control", 17, "Control", "ControlLeft").at(LEFT),
    key("Alt", 18, "Alt", "AltLeft").at(LEFT),
    key_without_code("Accept", 30, "Accept"),
    key_without_code("ModeChange", 31, "ModeChange"),
    key(" ", 32, " ", "Space"),
    key_without_code("Print", 42, "Print"),
    key("Execute", 43, "Execute", "Open"),
    key("\u{0}", 46, "\u{0}", "NumpadDecimal").at(NUMPAD),
    key("a", 65, "a", "KeyA"),
    key("b", 66, "b", "KeyB"),
    key("c", 67, "c", "KeyC"),
    key("d", 68, "d", "KeyD"),
    key("e", 69, "e", "KeyE"),
    key("f", 70, "f", "KeyF"),
    key("g", 71, "g", "KeyG"),
    key("h", 72, "h", "KeyH"),
    key("i", 73, "i", "KeyI"),
    key("j", 74, "j", "KeyJ"),
    key("k", 75, "k", "KeyK"),
    key("l", 76, "l", "KeyL"),
    key("m", 77, "m", "KeyM"),
    key("n", 78, "n", "KeyN"),
    key("o", 79, "o", "KeyO"),
    key("p", 80, "p", "KeyP"),
    key("q", 81, "q", "KeyQ"),
    key("r", 82, "r", "KeyR"),
    key("s", 83, "s", "KeyS"),
    key("t", 84, "t", "KeyT"),
    key("u", 85, "u", "KeyU"),
    key("v", 86, "v", "KeyV"),
    key("w", 87, "w", "KeyW"),
    key("x", 88, "x", "KeyX"),
    key("y", 89, "y", "KeyY"),
    key("z", 90, "z", "KeyZ"),
    key("Meta", 91, "Meta", "MetaLeft").at(LEFT),
    key("*", 106, "*", "NumpadMultiply").at(NUMPAD),
    key("+", 107, "+", "NumpadAdd").at(NUMPAD),
    key("-", 109, "-", "NumpadSubtract").at(NUMPAD),
    key("/", 111, "/", "NumpadDivide").at(NUMPAD),
    key(";", 186, ";", "Semicolon"),
    key("=", 187, "=", "Equal"),
    key(",", 188, ",", "Comma"),
    key(".", 190, ".", "Period"),
    key("`", 192, "`", "Backquote"),
    key("[", 219, "[", "BracketLeft"),
    key("\\", 220, "\\", "Backslash"),
    key("]", 221, "]", "BracketRight"),
    key("'", 222, "'", "Quote"),
    key_without_code("Attn", 246, "Attn"),
    key("CrSel", 247, "CrSel", "Props"),
    key_without_code("ExSel", 248, "ExSel"),
    key_without_code("EraseEof", 249, "EraseEof"),
    key_without_code("Play", 250, "Play"),
    key_without_code("ZoomOut", 251, "ZoomOut"),
    // Shifted characters
    key(")", 48, ")", "Digit0"),
    key("!", 49, "!", "Digit1"),
    key("@", 50, "@", "Digit2"),
    key("#", 51, "#", "Digit3"),
    key("$", 52, "$", "Digit4"),
    key("%", 53, "%", "Digit5"),
    key("^", 54, "^", "Digit6"),
    key("&", 55, "&", "Digit7"),
    key("(", 57, "(", "Digit9"),
    key("A", 65, "A", "KeyA"),
    key("B", 66, "B", "KeyB"),
    key("C", 67, "C", "KeyC"),
    key("D", 68, "D", "KeyD"),
    key("E", 69, "E", "KeyE"),
    key("F", 70, "F", "KeyF"),
    key("G", 71, "G", "KeyG"),
    key("H", 72, "H", "KeyH"),
    key("I", 73, "I", "KeyI"),
    key("J", 74, "J", "KeyJ"),
    key("K", 75, "K", "KeyK"),
    key("L", 76, "L", "KeyL"),
    key("M", 77, "M", "KeyM"),
    key("N", 78, "N", "KeyN"),
    key("O", 79, "O", "KeyO"),
    key("P", 80, "P", "KeyP"),
    key("Q", 81, "Q", "KeyQ"),
    key("R", 82, "R", "KeyR"),
    key("S", 83, "S", "KeyS"),
    key("T", 84, "T", "KeyT"),
    key("U", 85, "U", "KeyU"),
    key("V", 86, "V", "KeyV"),
    key("W", 87, "W", "KeyW"),
    key("X", 88, "X", "KeyX"),
    key("Y", 89, "Y", "KeyY"),
    key("Z", 90, "Z", "KeyZ"),
    key(":", 186, ":", "Semicolon"),
    key("<", 188, "<", "Comma"),
    key("_", 189, "_", "Minus"),
    key(">", 190, ">", "Period"),
    key("?", 191, "?", "Slash"),
    key("~", 192, "~", "Backquote"),
    key("{", 219, "{", "BracketLeft"),
    key("|", 220, "|", "Backslash"),
    key("}", 221, "}", "BracketRight"),
    key("\"", 222, "\"", "Quote"),
    // Mobile keys
    key_without_code_point("SoftLeft", "SoftLeft", "SoftLeft").at(MOBILE),
    key_without_code_point("SoftRight", "SoftRight", "SoftRight").at(MOBILE),
    key("Camera", 44, "Camera", "Camera").at(MOBILE),
    key_without_code_point("Call", "Call", "Call").at(MOBILE),
    key("EndCall", 95, "EndCall", "EndCall").at(MOBILE),
    key("VolumeDown", 182, "AudioVolumeDown", "VolumeDown").at(MOBILE),
    key("VolumeUp", 183, "AudioVolumeUp", "VolumeUp").at(MOBILE),
];

/// Find the table row for `name`, exact match only.
pub fn key_definition(name: &str) -> Option<&'static KeyDefinition> {
    US_KEYBOARD_LAYOUT.iter().find(|def| def.name == name)
}

/// Describe `name` with no modifiers held.
pub fn lookup(name: &str) -> Result<KeyDescription, BrowserError> {
    describe_key(name, modifiers::NONE)
}

/// Describe `name` as it would be sent with the `held` modifier bits.
///
/// Shift selects the shifted key and key code. A single-character key
/// produces itself as text unless the table overrides it; any modifier other
/// than Shift suppresses text entirely.
pub fn describe_key(name: &str, held: u32) -> Result<KeyDescription, BrowserError> {
    let Some(def) = key_definition(name) else {
        return describe_unlisted(name);
    };

    let shift = held & modifiers::SHIFT != 0;
    let key = match def.shift_key {
        Some(shift_key) if shift => shift_key,
        _ => def.key,
    };
    let key_code = match def.shift_key_code {
        Some(code) if shift => Some(code),
        _ => def.key_code,
    };

    let mut text = (key.chars().count() == 1).then(|| key.to_string());
    if let Some(explicit) = def.text {
        text = Some(explicit.to_string());
    }
    if held & !modifiers::SHIFT != 0 {
        text = None;
    }

    Ok(KeyDescription {
        key_code,
        key: Some(key.to_string()),
        text,
        code: def.code.map(str::to_string),
        location: def.location,
    })
}

fn describe_unlisted(name: &str) -> Result<KeyDescription, BrowserError> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if !ch.is_control() => Ok(KeyDescription {
            key: Some(ch.to_string()),
            text: Some(ch.to_string()),
            ..KeyDescription::default()
        }),
        _ => Err(BrowserError::UnknownKey {
            key: name.to_string(),
        }),
    }
}

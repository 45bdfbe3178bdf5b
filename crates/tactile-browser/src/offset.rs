//! Click offsets relative to an element's origin.

use serde_json::Value;

use crate::error::BrowserError;
use crate::geometry::Point;

/// A validated `(x, y)` offset in CSS pixels, relative to the top-left of
/// an element's quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    x: f64,
    y: f64,
}

/// Every shape an offset argument can arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetSource {
    Absent,
    Offset(Offset),
    Structural { x: Option<f64>, y: Option<f64> },
    /// Any other input; carries a short description of what was given.
    Unsupported(String),
}

impl Offset {
    pub fn new(x: f64, y: f64) -> Result<Self, BrowserError> {
        for (name, value) in [("x", x), ("y", y)] {
            if !value.is_finite() {
                return Err(BrowserError::InvalidOffset {
                    reason: format!("{name} is not a finite number ({value})"),
                });
            }
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Convert an offset argument, refusing to default missing coordinates.
    pub fn from_source(source: OffsetSource) -> Result<Option<Offset>, BrowserError> {
        match source {
            OffsetSource::Absent => Ok(None),
            OffsetSource::Offset(offset) => Ok(Some(offset)),
            OffsetSource::Structural { x, y } => {
                let x = x.ok_or_else(|| BrowserError::InvalidOffset {
                    reason: "missing x".to_string(),
                })?;
                let y = y.ok_or_else(|| BrowserError::InvalidOffset {
                    reason: "missing y".to_string(),
                })?;
                Offset::new(x, y).map(Some)
            }
            OffsetSource::Unsupported(kind) => Err(BrowserError::UnsupportedOffsetSource { kind }),
        }
    }

    pub fn as_point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Offset> for OffsetSource {
    fn from(offset: Offset) -> Self {
        OffsetSource::Offset(offset)
    }
}

impl From<Option<Offset>> for OffsetSource {
    fn from(offset: Option<Offset>) -> Self {
        offset.map_or(OffsetSource::Absent, OffsetSource::Offset)
    }
}

impl OffsetSource {
    /// Classify a JSON argument.
    ///
    /// `null` is absent, an object is structural (a coordinate that is present
    /// but not a number is reported as invalid), anything else is unsupported.
    pub fn from_json(value: &Value) -> Result<OffsetSource, BrowserError> {
        match value {
            Value::Null => Ok(OffsetSource::Absent),
            Value::Object(map) => {
                let coord = |name: &str| -> Result<Option<f64>, BrowserError> {
                    match map.get(name) {
                        None | Some(Value::Null) => Ok(None),
                        Some(v) => v.as_f64().map(Some).ok_or_else(|| BrowserError::InvalidOffset {
                            reason: format!("{name} is not a number: {v}"),
                        }),
                    }
                };
                Ok(OffsetSource::Structural {
                    x: coord("x")?,
                    y: coord("y")?,
                })
            }
            Value::Bool(_) => Ok(OffsetSource::Unsupported("boolean".into())),
            Value::Number(_) => Ok(OffsetSource::Unsupported("number".into())),
            Value::String(_) => Ok(OffsetSource::Unsupported("string".into())),
            Value::Array(_) => Ok(OffsetSource::Unsupported("array".into())),
        }
    }
}

/// Convenience: classify and convert a JSON offset argument in one step.
pub fn offset_from_json(value: &Value) -> Result<Option<Offset>, BrowserError> {
    Offset::from_source(OffsetSource::from_json(value)?)
}

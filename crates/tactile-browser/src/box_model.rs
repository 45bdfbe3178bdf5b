//! Structured box models resolved from `DOM.getBoxModel` payloads.

use serde::Serialize;

use crate::channel::{RawBoxModel, RemoteQuery};
use crate::error::BrowserError;
use crate::geometry::{BoundingBox, Quad};
use crate::handle::RemoteHandle;

/// The four layout quads of an element plus its content size.
///
/// A snapshot of one instant; it is not kept in sync with the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxModel {
    pub content: Quad,
    pub padding: Quad,
    pub border: Quad,
    pub margin: Quad,
    pub width: f64,
    pub height: f64,
}

impl BoxModel {
    /// Validate a raw payload. Every quad must be exactly 8 finite numbers.
    pub fn from_raw(raw: &RawBoxModel) -> Result<Self, BrowserError> {
        let quad = |name: &str, coords: &[f64]| {
            Quad::from_coords(coords).map_err(|e| match e {
                BrowserError::MalformedBoxModel { detail } => BrowserError::MalformedBoxModel {
                    detail: format!("{name}: {detail}"),
                },
                other => other,
            })
        };

        if !(raw.width.is_finite() && raw.height.is_finite()) || raw.width < 0.0 || raw.height < 0.0 {
            return Err(BrowserError::MalformedBoxModel {
                detail: format!("invalid content size {}x{}", raw.width, raw.height),
            });
        }

        Ok(Self {
            content: quad("content", &raw.content)?,
            padding: quad("padding", &raw.padding)?,
            border: quad("border", &raw.border)?,
            margin: quad("margin", &raw.margin)?,
            width: raw.width,
            height: raw.height,
        })
    }

    /// Bounding box of the border quad, i.e. the element's visual extent.
    pub fn bounding_box(&self) -> BoundingBox {
        self.border.bounding_box()
    }
}

/// Resolve the current box model of `handle`.
///
/// Returns `Ok(None)` when the node is not rendered. The handle is checked
/// both before the query and after it returns, so a dispose racing the
/// query surfaces as [`BrowserError::HandleDisposed`] instead of stale data.
pub async fn resolve_box_model(
    query: &dyn RemoteQuery,
    handle: &RemoteHandle,
) -> Result<Option<BoxModel>, BrowserError> {
    handle.ensure_alive()?;
    let raw = query.resolve_box_model(handle).await?;
    handle.ensure_alive()?;

    match raw {
        Some(raw) => BoxModel::from_raw(&raw).map(Some),
        None => {
            tracing::debug!(handle = %handle, "box model unavailable, node not rendered");
            Ok(None)
        }
    }
}

/// Resolve the element's bounding box, or `None` when it is not rendered.
pub async fn resolve_bounding_box(
    query: &dyn RemoteQuery,
    handle: &RemoteHandle,
) -> Result<Option<BoundingBox>, BrowserError> {
    Ok(resolve_box_model(query, handle).await?.map(|m| m.bounding_box()))
}

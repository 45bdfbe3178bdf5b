//! Choosing the pixel that receives a synthesized pointer event.

use crate::box_model::BoxModel;
use crate::error::BrowserError;
use crate::geometry::{Point, Quad, Viewport};
use crate::offset::Offset;

/// The quad clicks are aimed at: content, or border when content has no area
/// (e.g. an empty inline element).
pub fn target_quad(model: &BoxModel) -> &Quad {
    if model.content.area() > 0.0 {
        &model.content
    } else {
        &model.border
    }
}

/// Compute the interaction point for a stable box model.
///
/// Without an offset this is the centroid of the target quad. An offset is
/// relative to the quad's top-left corner, not its centre. The result is
/// clamped into the viewport; if clamping would move it off the element the
/// call fails instead of aiming at whatever else sits there.
pub fn clickable_point(
    model: &BoxModel,
    offset: Option<Offset>,
    viewport: &Viewport,
) -> Result<Point, BrowserError> {
    let quad = target_quad(model);
    let point = match offset {
        Some(offset) => quad.top_left() + offset.as_point(),
        None => quad.centroid()?,
    };

    if !point.is_finite() {
        return Err(BrowserError::PointOutsideViewport {
            point,
            viewport: *viewport,
        });
    }

    let clipped = viewport.clamp(point);
    if !viewport.contains(&clipped)
        || (clipped != point && !quad.bounding_box().contains(&clipped))
    {
        return Err(BrowserError::PointOutsideViewport {
            point,
            viewport: *viewport,
        });
    }

    Ok(clipped)
}

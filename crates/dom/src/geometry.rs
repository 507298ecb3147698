//! Geometry engine - pure functions behind element positioning
//!
//! Everything here is synchronous and side-effect free. Protocol quads come
//! in frame-local, get shifted by the accumulated OOPIF offset, then clipped
//! against the client viewport before any clickability decision is made.

use crate::error::Result;
use crate::types::{
    BoundingBox, BoxModel, FrameOffset, LocalSpace, PageSpace, Point, Quad, RawBoxModel, Space,
};
use smallvec::SmallVec;

/// Quads at or below this area (square CSS pixels) are treated as slivers
pub const MIN_CLICKABLE_AREA: f64 = 1.0;

/// Parse a flat protocol quad
pub fn quad_from_protocol(raw: &[f64]) -> Result<Quad<LocalSpace>> {
    Quad::try_from(raw)
}

/// Move a frame-local quad into page space
pub fn apply_offset(quad: Quad<LocalSpace>, offset: FrameOffset) -> Quad<PageSpace> {
    Quad::new((*quad.points()).map(|p| p.offset(offset.x, offset.y)))
}

/// Clamp every point to `[0, width] x [0, height]`
pub fn clip_to_viewport(quad: Quad<PageSpace>, width: f64, height: f64) -> Quad<PageSpace> {
    quad.map(|p| Point::new(p.x.max(0.0).min(width), p.y.max(0.0).min(height)))
}

/// Absolute polygon area (shoelace formula)
pub fn quad_area<S: Space>(quad: &Quad<S>) -> f64 {
    let points = quad.points();
    let mut area = 0.0;
    for i in 0..points.len() {
        let p1 = points[i];
        let p2 = points[(i + 1) % points.len()];
        area += (p1.x * p2.y - p2.x * p1.y) / 2.0;
    }
    area.abs()
}

/// Sum per-frame offsets along an OOPIF chain
pub fn accumulate_offsets(offsets: impl IntoIterator<Item = FrameOffset>) -> FrameOffset {
    offsets
        .into_iter()
        .fold(FrameOffset::default(), |acc, o| FrameOffset::new(acc.x + o.x, acc.y + o.y))
}

/// Smallest axis-aligned box containing the quad
pub fn bounding_box(quad: &Quad<PageSpace>) -> BoundingBox {
    let min = quad.min();
    let max = quad.max();
    BoundingBox::new(min.x, min.y, max.x - min.x, max.y - min.y)
}

/// Bounding box of the border quad, in page space
pub fn border_bounding_box(raw: &RawBoxModel, offset: FrameOffset) -> Result<BoundingBox> {
    let border = quad_from_protocol(&raw.border)?;
    Ok(bounding_box(&apply_offset(border, offset)))
}

/// Convert every quad of a protocol box model into page space
pub fn box_model(raw: &RawBoxModel, offset: FrameOffset) -> Result<BoxModel> {
    let page = |q: &[f64]| -> Result<Quad<PageSpace>> {
        Ok(apply_offset(quad_from_protocol(q)?, offset))
    };
    Ok(BoxModel {
        content: page(&raw.content)?,
        padding: page(&raw.padding)?,
        border: page(&raw.border)?,
        margin: page(&raw.margin)?,
        width: raw.width,
        height: raw.height,
    })
}

/// Page-space quads that are still clickable after viewport clipping
///
/// Order is preserved; quads with area <= [`MIN_CLICKABLE_AREA`] are dropped.
pub fn visible_quads(
    quads: impl IntoIterator<Item = Quad<PageSpace>>,
    viewport_width: f64,
    viewport_height: f64,
) -> SmallVec<[Quad<PageSpace>; 2]> {
    quads
        .into_iter()
        .map(|q| clip_to_viewport(q, viewport_width, viewport_height))
        .filter(|q| quad_area(q) > MIN_CLICKABLE_AREA)
        .collect()
}

/// Pick the dispatch point for a pointer event
///
/// Takes the first clickable quad. With `offset`, the point is relative to
/// the quad's top-left corner; otherwise it is the quad's centroid.
/// Returns `None` when nothing survives clipping.
pub fn clickable_point(
    quads: impl IntoIterator<Item = Quad<PageSpace>>,
    viewport_width: f64,
    viewport_height: f64,
    offset: Option<Point>,
) -> Option<Point> {
    let quads = visible_quads(quads, viewport_width, viewport_height);
    let quad = quads.first()?;
    Some(match offset {
        Some(offset) => {
            let min = quad.min();
            Point::new(min.x + offset.x, min.y + offset.y)
        }
        None => quad.centroid(),
    })
}

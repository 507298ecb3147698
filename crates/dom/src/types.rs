//! Core geometry types for element positioning
//!
//! Key design principles:
//! 1. Quads carry their coordinate space in the type (`Quad<LocalSpace>` vs `Quad<PageSpace>`)
//! 2. The only way from local to page space is an explicit offset application
//! 3. Protocol payloads deserialize straight into these types (camelCase on the wire)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{DomError, Result};

/// A point in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by (dx, dy)
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Coordinate space marker for [`Quad`]
pub trait Space: fmt::Debug + Clone + Copy + PartialEq + 'static {
    const NAME: &'static str;
}

/// Coordinates relative to the frame the element lives in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSpace;

/// Coordinates relative to the top-level page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpace;

impl Space for LocalSpace {
    const NAME: &'static str = "local";
}

impl Space for PageSpace {
    const NAME: &'static str = "page";
}

/// Four points, clockwise, starting at the top-left corner
///
/// The space parameter keeps frame-local quads from being mixed with
/// page-space quads. `geometry::apply_offset` is the only conversion.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Quad<S: Space> {
    points: [Point; 4],
    #[serde(skip)]
    _space: PhantomData<S>,
}

impl<S: Space> Quad<S> {
    pub fn new(points: [Point; 4]) -> Self {
        Self {
            points,
            _space: PhantomData,
        }
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    /// Top-left corner as reported by the protocol (first point)
    pub fn first(&self) -> Point {
        self.points[0]
    }

    /// Smallest x and y over all four points
    pub fn min(&self) -> Point {
        self.points.iter().fold(
            Point::new(f64::INFINITY, f64::INFINITY),
            |acc, p| Point::new(acc.x.min(p.x), acc.y.min(p.y)),
        )
    }

    /// Largest x and y over all four points
    pub fn max(&self) -> Point {
        self.points.iter().fold(
            Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            |acc, p| Point::new(acc.x.max(p.x), acc.y.max(p.y)),
        )
    }

    /// Arithmetic mean of the four points
    pub fn centroid(&self) -> Point {
        let sum = self
            .points
            .iter()
            .fold(Point::default(), |acc, p| acc.offset(p.x, p.y));
        Point::new(sum.x / 4.0, sum.y / 4.0)
    }

    pub(crate) fn map(self, f: impl Fn(Point) -> Point) -> Self {
        Self::new(self.points.map(f))
    }
}

impl<S: Space> fmt::Debug for Quad<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quad")
            .field("space", &S::NAME)
            .field("points", &self.points)
            .finish()
    }
}

impl TryFrom<&[f64]> for Quad<LocalSpace> {
    type Error = DomError;

    /// Protocol quads are flat `[x1, y1, x2, y2, x3, y3, x4, y4]` arrays
    fn try_from(raw: &[f64]) -> Result<Self> {
        if raw.len() != 8 {
            return Err(DomError::InvalidQuad(raw.len()));
        }
        Ok(Self::new([
            Point::new(raw[0], raw[1]),
            Point::new(raw[2], raw[3]),
            Point::new(raw[4], raw[5]),
            Point::new(raw[6], raw[7]),
        ]))
    }
}

/// Accumulated translation of an out-of-process frame relative to the page
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameOffset {
    pub x: f64,
    pub y: f64,
}

impl FrameOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point> for FrameOffset {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Axis-aligned box in page space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// `DOM.getBoxModel` payload, still in frame-local coordinates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBoxModel {
    #[serde(default)]
    pub content: Vec<f64>,
    #[serde(default)]
    pub padding: Vec<f64>,
    #[serde(default)]
    pub border: Vec<f64>,
    #[serde(default)]
    pub margin: Vec<f64>,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// Element box model with every quad in page space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxModel {
    pub content: Quad<PageSpace>,
    pub padding: Quad<PageSpace>,
    pub border: Quad<PageSpace>,
    pub margin: Quad<PageSpace>,
    pub width: f64,
    pub height: f64,
}

/// Legacy `layoutViewport` / `cssLayoutViewport` entry
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutViewport {
    #[serde(default)]
    pub page_x: f64,
    #[serde(default)]
    pub page_y: f64,
    pub client_width: f64,
    pub client_height: f64,
}

/// `visualViewport` / `cssVisualViewport` entry
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualViewport {
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    pub page_x: f64,
    pub page_y: f64,
    pub client_width: f64,
    pub client_height: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// `Page.getLayoutMetrics` result
///
/// Newer peers report CSS-pixel variants next to the legacy device-pixel
/// ones; readers prefer the CSS variants when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub layout_viewport: LayoutViewport,
    #[serde(default)]
    pub css_layout_viewport: Option<LayoutViewport>,
    #[serde(default)]
    pub visual_viewport: Option<VisualViewport>,
    #[serde(default)]
    pub css_visual_viewport: Option<VisualViewport>,
}

impl LayoutMetrics {
    /// Client viewport size (width, height)
    pub fn client_size(&self) -> (f64, f64) {
        let vp = self.css_layout_viewport.unwrap_or(self.layout_viewport);
        (vp.client_width, vp.client_height)
    }

    /// Current page scroll position
    pub fn page_scroll(&self) -> Point {
        match self.css_visual_viewport {
            Some(vv) => Point::new(vv.page_x, vv.page_y),
            None => Point::new(self.layout_viewport.page_x, self.layout_viewport.page_y),
        }
    }
}

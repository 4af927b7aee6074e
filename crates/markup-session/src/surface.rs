//! Seam between the session and the host's raster drawing surface
//!
//! The session never rasterizes strokes itself; the host (a canvas, an
//! offscreen bitmap, a test double) implements [`FreehandSurface`] and the
//! session drives it through tool styles and page-navigation snapshots.

use crate::tool::StrokeStyle;
use markup_core::{GlyphRun, Rect, Rotation};

pub trait FreehandSurface {
    /// Start a stroke at a display-space point with the resolved style.
    fn begin_stroke(&mut self, style: &StrokeStyle, x: f64, y: f64);

    /// Extend the current stroke to a new point.
    fn stroke_to(&mut self, x: f64, y: f64);

    /// Draw a finished shape. `fill` carries the fill color when the shape
    /// is filled.
    fn draw_shape(&mut self, style: &StrokeStyle, rect: &Rect, ellipse: bool, fill: Option<&str>);

    /// Snapshot the current ink as PNG bytes, or `None` when the surface
    /// is untouched.
    fn snapshot_png(&self) -> Option<Vec<u8>>;

    /// Clear all ink.
    fn clear(&mut self);

    /// Restore previously snapshotted ink, as when navigating back to a
    /// page that already has a freehand layer.
    fn restore_png(&mut self, png: &[u8]);
}

/// Host-side page renderer. The session asks it to paint pages and to
/// report positioned glyph runs for text extraction.
pub trait RenderSurface {
    /// Paint a page at the given scale and rotation.
    fn render_page(&mut self, page: u32, scale: f64, rotation: Rotation);

    /// Positioned glyph runs for a page, measured in display pixels at the
    /// given scale. An imageless or empty page reports no runs.
    fn glyph_runs(&self, page: u32, scale: f64) -> Vec<GlyphRun>;
}

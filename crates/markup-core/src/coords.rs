//! Coordinate mapping between display space and document-native space
//!
//! All persisted geometry lives in document-native units with the origin at
//! the top-left of the page. Display coordinates are document coordinates
//! multiplied by the current scale. The flip to PDF's bottom-up coordinate
//! system happens only at composite time, via [`pdf_rect_y`] and
//! [`text_baseline_y`].

use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.2;

/// Baseline nudge applied to replacement and edited-item text so the new
/// glyphs sit visually on top of the masked originals.
pub const REPLACEMENT_NUDGE: f64 = 2.0;

pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

pub fn zoom_in(scale: f64) -> f64 {
    clamp_scale(scale + ZOOM_STEP)
}

pub fn zoom_out(scale: f64) -> f64 {
    clamp_scale(scale - ZOOM_STEP)
}

/// Display pixels to document-native units at the given scale.
pub fn to_document(display: f64, scale: f64) -> f64 {
    display / scale
}

/// Document-native units to display pixels at the given scale.
pub fn to_display(document: f64, scale: f64) -> f64 {
    document * scale
}

/// Bottom-up y for a rectangle whose top edge sits at `y` in top-left
/// document coordinates.
pub fn pdf_rect_y(page_height: f64, y: f64, height: f64) -> f64 {
    page_height - y - height
}

/// Bottom-up baseline y for text whose box top sits at `y`. The baseline is
/// approximated as one font size below the top edge.
pub fn text_baseline_y(page_height: f64, y: f64, font_size: f64) -> f64 {
    page_height - y - font_size
}

/// Viewer rotation in quarter turns. Rotation affects on-screen presentation
/// only; persisted geometry is always unrotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn rotate_cw(self) -> Self {
        match self {
            Rotation::None => Rotation::Quarter,
            Rotation::Quarter => Rotation::Half,
            Rotation::Half => Rotation::ThreeQuarter,
            Rotation::ThreeQuarter => Rotation::None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

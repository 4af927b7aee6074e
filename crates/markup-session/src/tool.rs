//! Drawing tools and their stroke rendering parameters

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR: &str = "#FF0000";
pub const DEFAULT_SIZE: f64 = 3.0;

/// Width multiplier for the eraser so it clears slightly more than the pen
/// lays down.
const ERASER_WIDTH_FACTOR: f64 = 1.5;
const HIGHLIGHTER_ALPHA: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Pen,
    Highlighter,
    Rectangle,
    Circle,
    TextInsert,
    Eraser,
}

impl ToolKind {
    /// Tools that lay down freehand or shape ink on the raster layer.
    pub fn draws_ink(self) -> bool {
        !matches!(self, ToolKind::TextInsert)
    }

    pub fn is_shape(self) -> bool {
        matches!(self, ToolKind::Rectangle | ToolKind::Circle)
    }
}

/// Active tool configuration. Strokes capture an immutable copy of this at
/// pointer-down, so changing the tool mid-stroke never affects ink already
/// being laid down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub kind: ToolKind,
    pub color: String,
    pub size: f64,
    pub fill: bool,
    pub fill_color: String,
}

impl Default for Tool {
    fn default() -> Self {
        Self {
            kind: ToolKind::Pen,
            color: DEFAULT_COLOR.to_string(),
            size: DEFAULT_SIZE,
            fill: false,
            fill_color: DEFAULT_COLOR.to_string(),
        }
    }
}

/// How stroke pixels combine with what is already on the raster layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    SourceOver,
    DestinationOut,
    Multiply,
}

/// Resolved rendering parameters for one stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub width: f64,
    pub color: String,
    pub alpha: f64,
    pub composite: CompositeMode,
}

impl Tool {
    /// Derive the stroke style for this tool. The eraser is destructive
    /// (it removes ink, it does not paint white) and widened; the
    /// highlighter multiplies at partial opacity so underlying content
    /// shows through.
    pub fn stroke_style(&self) -> StrokeStyle {
        match self.kind {
            ToolKind::Eraser => StrokeStyle {
                width: self.size * ERASER_WIDTH_FACTOR,
                color: self.color.clone(),
                alpha: 1.0,
                composite: CompositeMode::DestinationOut,
            },
            ToolKind::Highlighter => StrokeStyle {
                width: self.size,
                color: self.color.clone(),
                alpha: HIGHLIGHTER_ALPHA,
                composite: CompositeMode::Multiply,
            },
            _ => StrokeStyle {
                width: self.size,
                color: self.color.clone(),
                alpha: 1.0,
                composite: CompositeMode::SourceOver,
            },
        }
    }
}

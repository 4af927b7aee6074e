//! Pointer interaction state machine
//!
//! Tracks what a pointer gesture currently means: laying down ink,
//! previewing a shape, dragging an inserted text box, or selecting text for
//! replacement. Each ink gesture captures an immutable snapshot of the
//! active tool at pointer-down.

use crate::tool::{Tool, ToolKind};
use markup_core::{ItemId, Rect};
use serde::{Deserialize, Serialize};

/// What clicking extracted text items does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Edit,
    Delete,
}

/// Current pointer gesture. Coordinates are display pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Freehand ink in progress with the tool captured at pointer-down.
    Drawing { tool: Tool, last_x: f64, last_y: f64 },
    /// Rubber-band shape anchored at the start point.
    ShapePreview { tool: Tool, start_x: f64, start_y: f64 },
    /// A text box was requested at this point; awaiting committed text.
    TextPending { x: f64, y: f64 },
    /// Dragging an inserted text box, keeping the grab offset.
    TextDragging { id: ItemId, grab_dx: f64, grab_dy: f64 },
    /// Rubber-band selection over rendered text for replacement.
    TextSelecting { start_x: f64, start_y: f64 },
}

impl InteractionState {
    /// Begin a gesture for the given tool at a display-space point. Text
    /// tools open a pending text box instead of inking.
    pub fn begin(tool: &Tool, x: f64, y: f64) -> Self {
        let x = x.max(0.0);
        let y = y.max(0.0);
        match tool.kind {
            ToolKind::TextInsert => InteractionState::TextPending { x, y },
            _ if tool.kind.is_shape() => InteractionState::ShapePreview {
                tool: tool.clone(),
                start_x: x,
                start_y: y,
            },
            _ => InteractionState::Drawing {
                tool: tool.clone(),
                last_x: x,
                last_y: y,
            },
        }
    }

    pub fn begin_text_drag(id: ItemId, grab_dx: f64, grab_dy: f64) -> Self {
        InteractionState::TextDragging { id, grab_dx, grab_dy }
    }

    pub fn begin_text_selection(x: f64, y: f64) -> Self {
        InteractionState::TextSelecting {
            start_x: x.max(0.0),
            start_y: y.max(0.0),
        }
    }

    /// Advance the gesture to a new pointer position. Only drawing states
    /// track movement; everything else resolves at pointer-up.
    pub fn moved(&mut self, x: f64, y: f64) {
        if let InteractionState::Drawing { last_x, last_y, .. } = self {
            *last_x = x.max(0.0);
            *last_y = y.max(0.0);
        }
    }

    /// End the gesture, returning to idle. Shape and selection states
    /// report their final rectangle.
    pub fn finish(&mut self, x: f64, y: f64) -> Option<Rect> {
        let result = match self {
            InteractionState::ShapePreview { start_x, start_y, .. }
            | InteractionState::TextSelecting { start_x, start_y } => {
                Some(corner_rect(*start_x, *start_y, x.max(0.0), y.max(0.0)))
            }
            _ => None,
        };
        *self = InteractionState::Idle;
        result
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }
}

/// Normalize two corner points into a rectangle, regardless of drag
/// direction.
pub fn corner_rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
    Rect::new(
        x1.min(x2),
        y1.min(y2),
        (x1 - x2).abs(),
        (y1 - y2).abs(),
    )
}

/// Hit test a display-space point against an item rectangle.
pub fn hit_test(rect: &Rect, x: f64, y: f64) -> bool {
    x >= rect.x && x <= rect.x + rect.width && y >= rect.y && y <= rect.y + rect.height
}

//! Interactive editing session layer
//!
//! Builds on `markup-core` with everything stateful: the active tool and
//! its stroke styles, the pointer interaction state machine, page
//! navigation with freehand flush/restore, and the storage and surface
//! traits that keep the session free of any particular host platform.

pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod surface;
pub mod tool;

pub use error::SessionError;
pub use session::{EditorSession, ExportResult};
pub use state::{corner_rect, hit_test, InteractionMode, InteractionState};
pub use storage::{load_or_default, AnnotationRecord, AnnotationStore, ExportSink};
pub use surface::{FreehandSurface, RenderSurface};
pub use tool::{CompositeMode, StrokeStyle, Tool, ToolKind};

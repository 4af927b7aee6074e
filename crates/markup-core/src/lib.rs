//! Core engine for paginated-document markup
//!
//! Holds the edit ledger (pending, per-page modifications), the glyph-run
//! grouping that turns extracted text into editable items, the raster
//! pipeline for freehand snapshots, and the compositor that flattens
//! everything into a new PDF. All geometry in the ledger is in
//! document-native units with a top-left origin; the bottom-up flip happens
//! only inside the compositor.

pub mod compose;
pub mod coords;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod raster;

pub use compose::{compose, parse_hex_color};
pub use coords::{clamp_scale, zoom_in, zoom_out, Rotation, MAX_SCALE, MIN_SCALE, ZOOM_STEP};
pub use error::{ComposeError, RasterError};
pub use extract::{group_runs, GlyphRun};
pub use ledger::{
    EditLedger, ExtractedTextItem, FreehandLayer, ItemId, Rect, TextDeletion, TextInsertion,
    TextReplacement,
};
pub use raster::DecodedImage;

/// Number of pages in a PDF document.
pub fn get_page_count(pdf_bytes: &[u8]) -> Result<u32, ComposeError> {
    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ComposeError::InvalidDocument(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

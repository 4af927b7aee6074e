//! Editing session for a single open document
//!
//! Owns the original bytes (never mutated), the edit ledger, the viewer
//! state (page, zoom, rotation) and the active tool. The host's raster
//! surface is handed in for operations that need it, such as page
//! navigation and export, so the session itself stays platform-free.

use crate::error::SessionError;
use crate::state::{InteractionMode, InteractionState};
use crate::storage::{load_or_default, AnnotationRecord, AnnotationStore};
use crate::surface::{FreehandSurface, RenderSurface};
use crate::tool::Tool;
use markup_core::coords;
use markup_core::{
    compose, get_page_count, group_runs, EditLedger, FreehandLayer, GlyphRun, ItemId, Rect,
    Rotation,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Defaults for a freshly inserted text box, in document-native units.
const INSERT_BOX_WIDTH: f64 = 200.0;
const INSERT_BOX_HEIGHT: f64 = 30.0;
const INSERT_FONT_SIZE: f64 = 16.0;
const INSERT_COLOR: &str = "#000000";

/// Floors applied when a replacement is created from an on-screen
/// selection, so short selections still produce a usable editing region.
const REPLACE_MIN_WIDTH: f64 = 100.0;
const REPLACE_MIN_HEIGHT: f64 = 20.0;
const REPLACE_MIN_FONT_SIZE: f64 = 12.0;
const REPLACE_BACKGROUND: &str = "#FFFFFF";

/// Outcome of an export. `edited` is false when the caller received the
/// original bytes unchanged, either because nothing was pending or because
/// compositing failed.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub bytes: Vec<u8>,
    pub edited: bool,
}

pub struct EditorSession {
    document_name: String,
    original: Vec<u8>,
    page_count: u32,
    current_page: u32,
    scale: f64,
    rotation: Rotation,
    mode: InteractionMode,
    tool: Tool,
    interaction: InteractionState,
    ledger: EditLedger,
    extraction_done: BTreeSet<u32>,
}

impl EditorSession {
    pub fn new(name: &str, bytes: &[u8]) -> Result<Self, SessionError> {
        let page_count = get_page_count(bytes)?;
        Ok(Self {
            document_name: name.to_string(),
            original: bytes.to_vec(),
            page_count,
            current_page: 1,
            scale: 1.0,
            rotation: Rotation::default(),
            mode: InteractionMode::default(),
            tool: Tool::default(),
            interaction: InteractionState::Idle,
            ledger: EditLedger::new(),
            extraction_done: BTreeSet::new(),
        })
    }

    /// Open a session and pick up any previously saved edits.
    pub fn resume(name: &str, bytes: &[u8], store: &dyn AnnotationStore) -> Result<Self, SessionError> {
        let mut session = Self::new(name, bytes)?;
        session.ledger = load_or_default(store, name);
        session.ledger.migrate_legacy_deletions();
        Ok(session)
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn original_bytes(&self) -> &[u8] {
        &self.original
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn ledger(&self) -> &EditLedger {
        &self.ledger
    }

    pub fn has_changes(&self) -> bool {
        self.ledger.has_pending_changes()
    }

    // ---- Viewer state ----

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn zoom_in(&mut self) {
        self.scale = coords::zoom_in(self.scale);
    }

    pub fn zoom_out(&mut self) {
        self.scale = coords::zoom_out(self.scale);
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = coords::clamp_scale(scale);
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Rotate the on-screen view a quarter turn. Persisted geometry stays
    /// unrotated.
    pub fn rotate_cw(&mut self) {
        self.rotation = self.rotation.rotate_cw();
    }

    // ---- Tool and interaction ----

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Start a pointer gesture on the freehand surface. Ink tools begin a
    /// stroke immediately with an immutable copy of the current tool.
    pub fn pointer_down(&mut self, surface: &mut dyn FreehandSurface, x: f64, y: f64) {
        self.interaction = InteractionState::begin(&self.tool, x, y);
        if let InteractionState::Drawing { tool, last_x, last_y } = &self.interaction {
            surface.begin_stroke(&tool.stroke_style(), *last_x, *last_y);
        }
    }

    pub fn pointer_move(&mut self, surface: &mut dyn FreehandSurface, x: f64, y: f64) {
        self.interaction.moved(x, y);
        if matches!(self.interaction, InteractionState::Drawing { .. }) {
            surface.stroke_to(x.max(0.0), y.max(0.0));
        }
    }

    /// End the gesture. Shapes are committed to the surface; a pending
    /// text location is returned for the host to collect input at.
    pub fn pointer_up(
        &mut self,
        surface: &mut dyn FreehandSurface,
        x: f64,
        y: f64,
    ) -> Option<(f64, f64)> {
        if let InteractionState::TextPending { x, y } = self.interaction {
            self.interaction = InteractionState::Idle;
            return Some((x, y));
        }
        let was_ink = matches!(
            self.interaction,
            InteractionState::Drawing { .. } | InteractionState::ShapePreview { .. }
        );
        let tool = match &self.interaction {
            InteractionState::ShapePreview { tool, .. } => Some(tool.clone()),
            _ => None,
        };
        if let Some(rect) = self.interaction.finish(x, y) {
            if let Some(tool) = tool {
                let fill = tool.fill.then_some(tool.fill_color.as_str());
                let ellipse = tool.kind == crate::tool::ToolKind::Circle;
                surface.draw_shape(&tool.stroke_style(), &rect, ellipse, fill);
            }
        }
        // Strokes and shapes commit immediately: the surface is snapshotted
        // into the ledger so pending-change checks see the new ink.
        if was_ink {
            self.flush_ink(surface);
        }
        None
    }

    /// Overlays for extracted text items are shown only once extraction
    /// has finished for the page and no ink gesture is in flight.
    pub fn overlays_visible(&self) -> bool {
        self.extraction_done.contains(&self.current_page) && self.interaction.is_idle()
    }

    pub fn extraction_complete(&self, page: u32) -> bool {
        self.extraction_done.contains(&page)
    }

    // ---- Page navigation ----

    /// Move to another page. The current page's ink is flushed into the
    /// ledger first, then the surface is reset and any saved ink for the
    /// target page is restored.
    pub fn goto_page(&mut self, surface: &mut dyn FreehandSurface, page: u32) {
        let page = page.clamp(1, self.page_count);
        if page == self.current_page {
            return;
        }
        self.flush_ink(surface);
        surface.clear();
        if let Some(layer) = self.ledger.freehand(page) {
            surface.restore_png(&layer.png);
        }
        self.current_page = page;
        self.interaction = InteractionState::Idle;
        self.mode = InteractionMode::default();
    }

    pub fn next_page(&mut self, surface: &mut dyn FreehandSurface) {
        self.goto_page(surface, self.current_page + 1);
    }

    pub fn prev_page(&mut self, surface: &mut dyn FreehandSurface) {
        self.goto_page(surface, self.current_page.saturating_sub(1));
    }

    /// Snapshot the surface's ink into the ledger for the current page. An
    /// untouched surface clears any stale layer.
    pub fn flush_ink(&mut self, surface: &dyn FreehandSurface) {
        match surface.snapshot_png() {
            Some(png) => self
                .ledger
                .set_freehand(self.current_page, FreehandLayer::from_png(png)),
            None => self.ledger.clear_freehand(self.current_page),
        }
    }

    // ---- Text extraction ----

    /// Install grouped text items for a page from the renderer's glyph
    /// runs. `scale` is the render scale the runs were measured at. Late
    /// results always land on the page they were requested for.
    pub fn ingest_glyph_runs(&mut self, page: u32, runs: &[GlyphRun], scale: f64) {
        let items = group_runs(page, runs, scale);
        debug!(
            "Extraction for page {} produced {} items from {} runs",
            page,
            items.len(),
            runs.len()
        );
        self.ledger.set_extracted(page, items);
        self.extraction_done.insert(page);
    }

    /// Ask the host to repaint the current page at the current view state.
    pub fn repaint(&self, renderer: &mut dyn RenderSurface) {
        renderer.render_page(self.current_page, self.scale, self.rotation);
    }

    /// Pull glyph runs from the renderer and ingest them. Navigation never
    /// cancels a pending request; when the host delivers runs for a page
    /// the user has already left, they still land on that page.
    pub fn request_extraction(&mut self, renderer: &dyn RenderSurface, page: u32) {
        let runs = renderer.glyph_runs(page, self.scale);
        self.ingest_glyph_runs(page, &runs, self.scale);
    }

    // ---- Edits ----

    /// Insert a text box at a display-space point on the current page,
    /// with the default box size and font.
    pub fn insert_text(&mut self, x: f64, y: f64, text: &str) -> Option<ItemId> {
        self.ledger.add_insertion(
            self.current_page,
            coords::to_document(x, self.scale),
            coords::to_document(y, self.scale),
            INSERT_BOX_WIDTH,
            INSERT_BOX_HEIGHT,
            text,
            INSERT_FONT_SIZE,
            INSERT_COLOR,
        )
    }

    pub fn move_text(&mut self, id: ItemId, x: f64, y: f64) -> bool {
        self.ledger.move_insertion(
            id,
            coords::to_document(x, self.scale),
            coords::to_document(y, self.scale),
        )
    }

    pub fn remove_text(&mut self, id: ItemId) -> bool {
        self.ledger.remove_insertion(id)
    }

    /// Replace text under a display-space selection band. The editing
    /// region is floored to a minimum size and the font size derived from
    /// the region height.
    pub fn replace_selection(
        &mut self,
        selection: Rect,
        original_text: &str,
        new_text: &str,
        font_color: &str,
    ) -> Option<ItemId> {
        let bounds = Rect::new(
            coords::to_document(selection.x, self.scale),
            coords::to_document(selection.y, self.scale),
            coords::to_document(selection.width, self.scale).max(REPLACE_MIN_WIDTH),
            coords::to_document(selection.height, self.scale).max(REPLACE_MIN_HEIGHT),
        );
        let font_size = (bounds.height * 0.8).round().max(REPLACE_MIN_FONT_SIZE);
        self.ledger.add_replacement(
            self.current_page,
            bounds,
            original_text,
            new_text,
            font_size,
            font_color,
            REPLACE_BACKGROUND,
        )
    }

    pub fn delete_extracted(&mut self, id: ItemId) {
        self.ledger.mark_deleted(id);
    }

    pub fn edit_extracted(&mut self, id: ItemId, new_text: &str) {
        self.ledger.mark_edited(id, new_text);
    }

    pub fn restore_extracted(&mut self, id: ItemId) {
        self.ledger.restore(id);
    }

    pub fn clear_page(&mut self, surface: &mut dyn FreehandSurface) {
        self.ledger.clear_page(self.current_page);
        surface.clear();
        self.interaction = InteractionState::Idle;
    }

    // ---- Persistence and export ----

    pub fn save(&mut self, surface: &dyn FreehandSurface, store: &mut dyn AnnotationStore) -> Result<(), SessionError> {
        self.flush_ink(surface);
        store.save(&AnnotationRecord {
            document_name: self.document_name.clone(),
            ledger: self.ledger.snapshot(),
        })
    }

    /// Flatten all pending edits into a new document. Compositing works on
    /// a point-in-time snapshot of the ledger; edits made while an export
    /// runs simply miss this one. A compositor failure falls back to the
    /// original bytes so the user always gets a document.
    pub fn export(&mut self, surface: &dyn FreehandSurface) -> ExportResult {
        self.flush_ink(surface);
        let snapshot = self.ledger.snapshot();
        if !snapshot.has_pending_changes() {
            return ExportResult {
                bytes: self.original.clone(),
                edited: false,
            };
        }
        match compose(&self.original, &snapshot) {
            Ok(bytes) => ExportResult { bytes, edited: true },
            Err(e) => {
                warn!("Export failed, falling back to original document: {}", e);
                ExportResult {
                    bytes: self.original.clone(),
                    edited: false,
                }
            }
        }
    }

    pub fn export_file_name(&self) -> String {
        format!("edited-{}", self.document_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{StrokeStyle, ToolKind};
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};
    use pretty_assertions::assert_eq;

    fn create_test_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = pages as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Surface double that records ink as an opaque page tag.
    #[derive(Default)]
    struct FakeSurface {
        ink: Option<Vec<u8>>,
        strokes: usize,
        shapes: Vec<StrokeStyle>,
    }

    impl FreehandSurface for FakeSurface {
        fn begin_stroke(&mut self, _style: &StrokeStyle, _x: f64, _y: f64) {
            self.strokes += 1;
            self.ink = Some(vec![self.strokes as u8]);
        }

        fn stroke_to(&mut self, _x: f64, _y: f64) {}

        fn draw_shape(
            &mut self,
            style: &StrokeStyle,
            _rect: &Rect,
            _ellipse: bool,
            _fill: Option<&str>,
        ) {
            self.shapes.push(style.clone());
            self.ink = Some(vec![0xAB]);
        }

        fn snapshot_png(&self) -> Option<Vec<u8>> {
            self.ink.clone()
        }

        fn clear(&mut self) {
            self.ink = None;
        }

        fn restore_png(&mut self, png: &[u8]) {
            self.ink = Some(png.to_vec());
        }
    }

    fn session(pages: usize) -> EditorSession {
        EditorSession::new("doc.pdf", &create_test_pdf(pages)).unwrap()
    }

    #[test]
    fn new_session_starts_clean_on_page_one() {
        let s = session(3);
        assert_eq!(s.page_count(), 3);
        assert_eq!(s.current_page(), 1);
        assert_eq!(s.scale(), 1.0);
        assert!(!s.has_changes());
    }

    #[test]
    fn navigation_flushes_and_restores_ink() {
        let mut s = session(3);
        let mut surface = FakeSurface::default();

        s.pointer_down(&mut surface, 10.0, 10.0);
        s.pointer_up(&mut surface, 20.0, 20.0);
        s.goto_page(&mut surface, 2);

        // Page 1 ink was captured into the ledger and the surface reset.
        assert!(s.ledger().freehand(1).is_some());
        assert!(surface.ink.is_none());

        s.goto_page(&mut surface, 1);
        assert_eq!(surface.ink, Some(vec![1]));
    }

    #[test]
    fn navigation_resets_interaction_mode() {
        let mut s = session(2);
        let mut surface = FakeSurface::default();
        s.set_mode(InteractionMode::Delete);

        s.goto_page(&mut surface, 2);
        assert_eq!(s.mode(), InteractionMode::Edit);
    }

    #[test]
    fn navigation_clamps_to_document_range() {
        let mut s = session(2);
        let mut surface = FakeSurface::default();
        s.goto_page(&mut surface, 99);
        assert_eq!(s.current_page(), 2);
        s.prev_page(&mut surface);
        s.prev_page(&mut surface);
        assert_eq!(s.current_page(), 1);
    }

    #[test]
    fn shape_gesture_draws_with_captured_style() {
        let mut s = session(1);
        let mut surface = FakeSurface::default();
        s.set_tool(Tool {
            kind: ToolKind::Rectangle,
            fill: true,
            ..Tool::default()
        });

        s.pointer_down(&mut surface, 10.0, 10.0);
        s.pointer_up(&mut surface, 60.0, 40.0);

        assert_eq!(surface.shapes.len(), 1);
        assert!(s.interaction().is_idle());
    }

    #[test]
    fn stroke_commits_to_ledger_on_pointer_up() {
        let mut s = session(1);
        let mut surface = FakeSurface::default();

        s.pointer_down(&mut surface, 10.0, 10.0);
        s.pointer_move(&mut surface, 15.0, 15.0);
        s.pointer_up(&mut surface, 20.0, 20.0);

        assert!(s.ledger().freehand(1).is_some());
        assert!(s.has_changes());
    }

    #[test]
    fn shape_commits_to_ledger_on_pointer_up() {
        let mut s = session(1);
        let mut surface = FakeSurface::default();
        s.set_tool(Tool {
            kind: ToolKind::Rectangle,
            ..Tool::default()
        });

        s.pointer_down(&mut surface, 10.0, 10.0);
        s.pointer_up(&mut surface, 60.0, 40.0);

        assert!(s.ledger().freehand(1).is_some());
        assert!(s.has_changes());
    }

    #[test]
    fn text_tool_reports_pending_location() {
        let mut s = session(1);
        let mut surface = FakeSurface::default();
        s.set_tool(Tool {
            kind: ToolKind::TextInsert,
            ..Tool::default()
        });

        s.pointer_down(&mut surface, 30.0, 40.0);
        let at = s.pointer_up(&mut surface, 30.0, 40.0);
        assert_eq!(at, Some((30.0, 40.0)));
        assert_eq!(surface.strokes, 0);
    }

    #[test]
    fn insert_text_converts_display_to_document_units() {
        let mut s = session(1);
        s.set_scale(2.0);
        let id = s.insert_text(100.0, 200.0, "scaled").unwrap();
        let item = &s.ledger().insertions(1)[0];
        assert_eq!(item.id, id);
        assert_eq!((item.x, item.y), (50.0, 100.0));
        assert_eq!((item.width, item.height), (200.0, 30.0));
        assert_eq!(item.font_size, 16.0);
    }

    #[test]
    fn replace_selection_applies_floors() {
        let mut s = session(1);
        let id = s
            .replace_selection(Rect::new(100.0, 200.0, 80.0, 10.0), "Old", "New", "#000000")
            .unwrap();
        let item = s
            .ledger()
            .replacements(1)
            .iter()
            .find(|r| r.id == id)
            .unwrap();
        assert_eq!(item.bounds.width, 100.0);
        assert_eq!(item.bounds.height, 20.0);
        // round(20 * 0.8) = 16
        assert_eq!(item.font_size, 16.0);
        assert_eq!(item.background_color, "#FFFFFF");
    }

    #[test]
    fn overlays_wait_for_extraction() {
        let mut s = session(1);
        assert!(!s.overlays_visible());

        s.ingest_glyph_runs(
            1,
            &[GlyphRun {
                text: "hello".to_string(),
                left: 10.0,
                top: 10.0,
                right: 60.0,
                bottom: 22.0,
                font_size: 12.0,
                font_family: "Helvetica".to_string(),
            }],
            1.0,
        );
        assert!(s.overlays_visible());
        assert_eq!(s.ledger().extracted(1).len(), 1);
    }

    /// Renderer double that records paint requests and serves canned runs.
    #[derive(Default)]
    struct FakeRenderer {
        painted: Vec<(u32, f64)>,
    }

    impl RenderSurface for FakeRenderer {
        fn render_page(&mut self, page: u32, scale: f64, _rotation: markup_core::Rotation) {
            self.painted.push((page, scale));
        }

        fn glyph_runs(&self, _page: u32, scale: f64) -> Vec<GlyphRun> {
            vec![GlyphRun {
                text: "rendered".to_string(),
                left: 10.0 * scale,
                top: 10.0 * scale,
                right: 80.0 * scale,
                bottom: 22.0 * scale,
                font_size: 12.0 * scale,
                font_family: "Helvetica".to_string(),
            }]
        }
    }

    #[test]
    fn repaint_and_extraction_drive_the_renderer() {
        let mut s = session(2);
        let mut renderer = FakeRenderer::default();
        s.zoom_in();

        s.repaint(&mut renderer);
        assert_eq!(renderer.painted, vec![(1, s.scale())]);

        s.request_extraction(&renderer, 1);
        assert!(s.extraction_complete(1));
        let items = s.ledger().extracted(1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "rendered");
        // Runs come back scaled; the stored item is in document units.
        assert!((items[0].bounds.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn late_extraction_lands_on_requested_page() {
        let mut s = session(3);
        let mut surface = FakeSurface::default();
        s.goto_page(&mut surface, 2);

        // Result for page 1 arrives after we have moved on.
        s.ingest_glyph_runs(
            1,
            &[GlyphRun {
                text: "late".to_string(),
                left: 0.0,
                top: 0.0,
                right: 40.0,
                bottom: 12.0,
                font_size: 12.0,
                font_family: "Helvetica".to_string(),
            }],
            1.0,
        );
        assert_eq!(s.ledger().extracted(1).len(), 1);
        assert!(s.ledger().extracted(2).is_empty());
        assert!(s.extraction_complete(1));
        assert!(!s.extraction_complete(2));
    }

    #[test]
    fn export_with_no_changes_returns_original() {
        let mut s = session(1);
        let surface = FakeSurface::default();
        let result = s.export(&surface);
        assert!(!result.edited);
        assert_eq!(result.bytes, s.original_bytes());
    }

    #[test]
    fn export_flattens_pending_edits() {
        let mut s = session(1);
        let surface = FakeSurface::default();
        s.insert_text(50.0, 50.0, "Hello");

        let result = s.export(&surface);
        assert!(result.edited);
        assert_ne!(result.bytes, s.original_bytes());
        // The session keeps editing after export.
        assert!(s.has_changes());
    }

    #[test]
    fn export_file_name_is_prefixed() {
        let s = session(1);
        assert_eq!(s.export_file_name(), "edited-doc.pdf");
    }

    #[test]
    fn clear_page_resets_ledger_and_surface() {
        let mut s = session(1);
        let mut surface = FakeSurface::default();
        s.insert_text(10.0, 10.0, "x");
        s.pointer_down(&mut surface, 5.0, 5.0);
        s.pointer_up(&mut surface, 6.0, 6.0);

        s.clear_page(&mut surface);
        assert!(!s.has_changes());
        assert!(surface.ink.is_none());
        assert!(s.interaction().is_idle());
    }

    #[test]
    fn zoom_and_rotation_track_viewer_state() {
        let mut s = session(1);
        s.zoom_in();
        assert!((s.scale() - 1.2).abs() < 1e-9);
        s.set_scale(99.0);
        assert_eq!(s.scale(), 3.0);
        s.rotate_cw();
        assert_eq!(s.rotation().degrees(), 90);
    }
}

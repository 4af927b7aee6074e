//! Edit ledger for tracking pending page modifications
//!
//! The ledger is the authoritative record of everything the user has changed
//! but not yet exported: freehand raster snapshots, inserted text, text
//! replacements, legacy standalone deletions, and extracted text items with
//! their edited/deleted flags. All collections are keyed by 1-based page
//! number; pages with no edits hold no storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ItemId = u64;

/// Asymmetric padding applied when an extracted item is marked deleted, so
/// the mask covers descenders, ascenders and anti-aliasing halos.
const DELETE_PAD_LEFT: f64 = 4.0;
const DELETE_PAD_TOP: f64 = 3.0;
const DELETE_PAD_WIDTH: f64 = 8.0;
const DELETE_PAD_HEIGHT: f64 = 6.0;
const DELETE_MIN_HEIGHT: f64 = 20.0;

/// Rectangle in document-native units, origin top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow the rectangle by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

/// Rasterized union of all pen/highlighter/shape/eraser strokes committed to
/// one page, stored as PNG bytes. Replacing a snapshot overwrites it
/// entirely; there is no stroke-level delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreehandLayer {
    pub png: Vec<u8>,
}

impl FreehandLayer {
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    /// Accept a `data:image/png;base64,...` URL as produced by a canvas
    /// snapshot. Returns `None` for anything that is not a base64 PNG URL.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let png = crate::raster::decode_data_url(url)?;
        Some(Self { png })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextInsertion {
    pub id: ItemId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
    pub font_size: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextReplacement {
    pub id: ItemId,
    pub page: u32,
    pub bounds: Rect,
    pub original_text: String,
    pub new_text: String,
    pub font_size: f64,
    pub font_color: String,
    pub background_color: String,
}

/// Standalone deletion from the older editing flow. Kept as a legacy input
/// format; `EditLedger::migrate_legacy_deletions` folds these into the
/// extracted-item model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextDeletion {
    pub id: ItemId,
    pub page: u32,
    pub bounds: Rect,
    pub deleted_text: String,
}

/// A grouped, editable unit derived from a page's positioned glyph runs.
///
/// Items are independent overlays: they reference nothing in the source
/// document and carry their own edited/deleted flags. Deleting expands the
/// bounds asymmetrically so the mask fully occludes the original glyphs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedTextItem {
    pub id: ItemId,
    pub page: u32,
    pub text: String,
    pub bounds: Rect,
    pub font_size: f64,
    pub font_family: String,
    pub is_deleted: bool,
    pub is_edited: bool,
    pub edited_text: Option<String>,
}

/// Per-page collections of pending edits.
///
/// Mutations are total: unknown ids are no-ops, flag operations are
/// idempotent, and removing the last entry for a page drops the page key so
/// `has_pending_changes` stays cheap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditLedger {
    next_id: ItemId,
    freehand: BTreeMap<u32, FreehandLayer>,
    insertions: BTreeMap<u32, Vec<TextInsertion>>,
    replacements: BTreeMap<u32, Vec<TextReplacement>>,
    deletions: BTreeMap<u32, Vec<TextDeletion>>,
    extracted: BTreeMap<u32, Vec<ExtractedTextItem>>,
}

impl EditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ---- Freehand layer ----

    pub fn set_freehand(&mut self, page: u32, layer: FreehandLayer) {
        self.freehand.insert(page, layer);
    }

    pub fn freehand(&self, page: u32) -> Option<&FreehandLayer> {
        self.freehand.get(&page)
    }

    pub fn clear_freehand(&mut self, page: u32) {
        self.freehand.remove(&page);
    }

    // ---- Text insertions ----

    /// Add an inserted text box. Blank text is discarded and never stored.
    #[allow(clippy::too_many_arguments)]
    pub fn add_insertion(
        &mut self,
        page: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        text: &str,
        font_size: f64,
        color: &str,
    ) -> Option<ItemId> {
        if text.trim().is_empty() {
            return None;
        }
        let id = self.next_id();
        self.insertions.entry(page).or_default().push(TextInsertion {
            id,
            page,
            x: x.max(0.0),
            y: y.max(0.0),
            width,
            height,
            text: text.to_string(),
            font_size,
            color: color.to_string(),
        });
        Some(id)
    }

    /// Reposition an existing insertion, clamping to non-negative coordinates.
    pub fn move_insertion(&mut self, id: ItemId, x: f64, y: f64) -> bool {
        for items in self.insertions.values_mut() {
            if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                item.x = x.max(0.0);
                item.y = y.max(0.0);
                return true;
            }
        }
        false
    }

    pub fn remove_insertion(&mut self, id: ItemId) -> bool {
        Self::remove_from(&mut self.insertions, |i| i.id == id)
    }

    pub fn insertions(&self, page: u32) -> &[TextInsertion] {
        self.insertions.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---- Text replacements ----

    /// Record a replacement of existing page text. `new_text` must be
    /// non-empty for the replacement to exist at all.
    #[allow(clippy::too_many_arguments)]
    pub fn add_replacement(
        &mut self,
        page: u32,
        bounds: Rect,
        original_text: &str,
        new_text: &str,
        font_size: f64,
        font_color: &str,
        background_color: &str,
    ) -> Option<ItemId> {
        if new_text.trim().is_empty() {
            return None;
        }
        let id = self.next_id();
        self.replacements
            .entry(page)
            .or_default()
            .push(TextReplacement {
                id,
                page,
                bounds,
                original_text: original_text.to_string(),
                new_text: new_text.to_string(),
                font_size,
                font_color: font_color.to_string(),
                background_color: background_color.to_string(),
            });
        Some(id)
    }

    pub fn remove_replacement(&mut self, id: ItemId) -> bool {
        Self::remove_from(&mut self.replacements, |r| r.id == id)
    }

    pub fn replacements(&self, page: u32) -> &[TextReplacement] {
        self.replacements
            .get(&page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ---- Legacy standalone deletions ----

    pub fn add_deletion(
        &mut self,
        page: u32,
        bounds: Rect,
        deleted_text: &str,
    ) -> ItemId {
        let id = self.next_id();
        self.deletions.entry(page).or_default().push(TextDeletion {
            id,
            page,
            bounds,
            deleted_text: deleted_text.to_string(),
        });
        id
    }

    pub fn remove_deletion(&mut self, id: ItemId) -> bool {
        Self::remove_from(&mut self.deletions, |d| d.id == id)
    }

    pub fn deletions(&self, page: u32) -> &[TextDeletion] {
        self.deletions.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fold legacy standalone deletions into the extracted-item model. Each
    /// deletion becomes an already-deleted item with its bounds taken as-is
    /// (they were expanded when the deletion was recorded).
    pub fn migrate_legacy_deletions(&mut self) {
        let deletions = std::mem::take(&mut self.deletions);
        for (page, items) in deletions {
            for deletion in items {
                let id = self.next_id();
                self.extracted.entry(page).or_default().push(ExtractedTextItem {
                    id,
                    page,
                    text: deletion.deleted_text,
                    bounds: deletion.bounds,
                    font_size: 12.0,
                    font_family: "Helvetica".to_string(),
                    is_deleted: true,
                    is_edited: false,
                    edited_text: None,
                });
            }
        }
    }

    // ---- Extracted text items ----

    /// Install the extraction result for a page, assigning fresh ids. A late
    /// result always lands on the page it was requested for, replacing
    /// whatever that page currently holds.
    pub fn set_extracted(&mut self, page: u32, mut items: Vec<ExtractedTextItem>) {
        for item in &mut items {
            item.id = self.next_id();
            item.page = page;
        }
        if items.is_empty() {
            self.extracted.remove(&page);
        } else {
            self.extracted.insert(page, items);
        }
    }

    pub fn extracted(&self, page: u32) -> &[ExtractedTextItem] {
        self.extracted.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mark an extracted item deleted, expanding its bounds for full mask
    /// coverage. Already-deleted items are left untouched, which makes the
    /// operation idempotent. Deletion clears any pending edit.
    pub fn mark_deleted(&mut self, id: ItemId) {
        if let Some(item) = Self::find_mut(&mut self.extracted, id) {
            if item.is_deleted {
                return;
            }
            item.is_deleted = true;
            item.is_edited = false;
            item.edited_text = None;
            item.bounds = Rect {
                x: (item.bounds.x - DELETE_PAD_LEFT).max(0.0),
                y: (item.bounds.y - DELETE_PAD_TOP).max(0.0),
                width: item.bounds.width + DELETE_PAD_WIDTH,
                height: (item.bounds.height + DELETE_PAD_HEIGHT).max(DELETE_MIN_HEIGHT),
            };
        }
    }

    /// Replace an extracted item's text. Blank replacement text is ignored.
    pub fn mark_edited(&mut self, id: ItemId, new_text: &str) {
        if new_text.trim().is_empty() {
            return;
        }
        if let Some(item) = Self::find_mut(&mut self.extracted, id) {
            item.is_edited = true;
            item.edited_text = Some(new_text.to_string());
        }
    }

    /// Clear both flags on an extracted item. The expanded deletion bounds
    /// are kept; they still cover the original glyphs.
    pub fn restore(&mut self, id: ItemId) {
        if let Some(item) = Self::find_mut(&mut self.extracted, id) {
            item.is_deleted = false;
            item.is_edited = false;
            item.edited_text = None;
        }
    }

    // ---- Bulk operations and queries ----

    /// Drop every pending edit on one page.
    pub fn clear_page(&mut self, page: u32) {
        self.freehand.remove(&page);
        self.insertions.remove(&page);
        self.replacements.remove(&page);
        self.deletions.remove(&page);
        self.extracted.remove(&page);
    }

    pub fn clear_all(&mut self) {
        self.freehand.clear();
        self.insertions.clear();
        self.replacements.clear();
        self.deletions.clear();
        self.extracted.clear();
    }

    /// True if exporting now would differ from the original document.
    pub fn has_pending_changes(&self) -> bool {
        !self.freehand.is_empty()
            || !self.insertions.is_empty()
            || !self.replacements.is_empty()
            || !self.deletions.is_empty()
            || self
                .extracted
                .values()
                .flatten()
                .any(|item| item.is_deleted || item.is_edited)
    }

    /// Pages that carry at least one edit, in ascending order.
    pub fn edited_pages(&self) -> Vec<u32> {
        let mut pages: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
        pages.extend(self.freehand.keys());
        pages.extend(self.insertions.keys());
        pages.extend(self.replacements.keys());
        pages.extend(self.deletions.keys());
        pages.extend(self.extracted.iter().filter_map(|(page, items)| {
            items
                .iter()
                .any(|i| i.is_deleted || i.is_edited)
                .then_some(page)
        }));
        pages.into_iter().collect()
    }

    /// Point-in-time copy handed to the compositor and extraction routines
    /// so they never observe a live, mutating view.
    pub fn snapshot(&self) -> EditLedger {
        self.clone()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn remove_from<T>(map: &mut BTreeMap<u32, Vec<T>>, matches: impl Fn(&T) -> bool) -> bool {
        let mut emptied = None;
        let mut removed = false;
        for (page, items) in map.iter_mut() {
            if let Some(pos) = items.iter().position(&matches) {
                items.remove(pos);
                removed = true;
                if items.is_empty() {
                    emptied = Some(*page);
                }
                break;
            }
        }
        if let Some(page) = emptied {
            map.remove(&page);
        }
        removed
    }

    fn find_mut(
        map: &mut BTreeMap<u32, Vec<ExtractedTextItem>>,
        id: ItemId,
    ) -> Option<&mut ExtractedTextItem> {
        map.values_mut().flatten().find(|item| item.id == id)
    }
}

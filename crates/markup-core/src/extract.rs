//! Glyph-run grouping into editable text items
//!
//! Text extraction hands us positioned glyph runs in display pixels at some
//! render scale. Runs that sit on the same visual line and nearly touch get
//! merged into one editable item, then converted to document-native units.

use crate::ledger::{ExtractedTextItem, Rect};
use serde::{Deserialize, Serialize};

/// Maximum horizontal gap, in display pixels, between two runs that still
/// read as one piece of text.
const MAX_HORIZONTAL_GAP: f64 = 10.0;

/// How far apart, in display pixels, the top and bottom edges of two runs
/// may sit while still counting as the same line.
const LINE_TOLERANCE: f64 = 5.0;

/// One positioned text run as reported by the renderer, in display pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub font_size: f64,
    pub font_family: String,
}

impl GlyphRun {
    fn is_usable(&self) -> bool {
        !self.text.trim().is_empty() && self.right > self.left && self.bottom > self.top
    }

    fn same_line(&self, other: &GlyphRun) -> bool {
        (self.top - other.top).abs() <= LINE_TOLERANCE
            && (self.bottom - other.bottom).abs() <= LINE_TOLERANCE
    }
}

/// Group a page's glyph runs into editable items.
///
/// Runs are sorted top-to-bottom then left-to-right and merged greedily: a
/// run joins the open group when it sits on the same line and its left edge
/// is within [`MAX_HORIZONTAL_GAP`] of the group's right edge. Blank and
/// zero-area runs are discarded. Identical input always yields identical
/// groups. Resulting items are in document-native units (display divided by
/// `scale`) with unassigned ids; [`crate::ledger::EditLedger::set_extracted`]
/// assigns them.
pub fn group_runs(page: u32, runs: &[GlyphRun], scale: f64) -> Vec<ExtractedTextItem> {
    let mut usable: Vec<&GlyphRun> = runs.iter().filter(|r| r.is_usable()).collect();
    usable.sort_by(|a, b| {
        a.top
            .partial_cmp(&b.top)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut groups: Vec<Vec<&GlyphRun>> = Vec::new();
    for run in usable {
        let joined = groups.iter_mut().rev().find(|group| {
            let last = group.last().unwrap();
            run.same_line(last) && run.left - last.right <= MAX_HORIZONTAL_GAP && run.left >= last.left
        });
        match joined {
            Some(group) => group.push(run),
            None => groups.push(vec![run]),
        }
    }

    groups
        .into_iter()
        .map(|group| {
            // Runs carry their own spacing; concatenate in run order and
            // trim the edges.
            let text = group
                .iter()
                .map(|r| r.text.as_str())
                .collect::<String>()
                .trim()
                .to_string();
            let left = group.iter().map(|r| r.left).fold(f64::INFINITY, f64::min);
            let top = group.iter().map(|r| r.top).fold(f64::INFINITY, f64::min);
            let right = group.iter().map(|r| r.right).fold(f64::NEG_INFINITY, f64::max);
            let bottom = group.iter().map(|r| r.bottom).fold(f64::NEG_INFINITY, f64::max);
            let first = group[0];
            ExtractedTextItem {
                id: 0,
                page,
                text,
                bounds: Rect::new(
                    left / scale,
                    top / scale,
                    (right - left) / scale,
                    (bottom - top) / scale,
                ),
                font_size: first.font_size / scale,
                font_family: first.font_family.clone(),
                is_deleted: false,
                is_edited: false,
                edited_text: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str, left: f64, top: f64, right: f64, bottom: f64) -> GlyphRun {
        GlyphRun {
            text: text.to_string(),
            left,
            top,
            right,
            bottom,
            font_size: 12.0,
            font_family: "Helvetica".to_string(),
        }
    }

    #[test]
    fn adjacent_runs_on_one_line_merge() {
        let runs = vec![
            run("Hello ", 10.0, 100.0, 50.0, 112.0),
            run("world", 55.0, 100.0, 95.0, 112.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Hello world");
        assert_eq!(items[0].bounds, Rect::new(10.0, 100.0, 85.0, 12.0));
    }

    #[test]
    fn merged_runs_keep_their_own_spacing() {
        // A word split across two runs must not gain a separator.
        let runs = vec![
            run("Hel", 10.0, 100.0, 30.0, 112.0),
            run("lo", 31.0, 100.0, 45.0, 112.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Hello");
    }

    #[test]
    fn wide_gap_splits_groups() {
        let runs = vec![
            run("Left", 10.0, 100.0, 50.0, 112.0),
            run("Right", 200.0, 100.0, 240.0, 112.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Left");
        assert_eq!(items[1].text, "Right");
    }

    #[test]
    fn different_lines_never_merge() {
        let runs = vec![
            run("Top", 10.0, 100.0, 50.0, 112.0),
            run("Below", 10.0, 120.0, 60.0, 132.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn slight_vertical_jitter_still_merges() {
        let runs = vec![
            run("a", 10.0, 100.0, 20.0, 112.0),
            run("b", 24.0, 103.0, 34.0, 115.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "ab");
    }

    #[test]
    fn blank_and_zero_area_runs_are_discarded() {
        let runs = vec![
            run("   ", 10.0, 100.0, 50.0, 112.0),
            run("flat", 10.0, 100.0, 10.0, 112.0),
            run("ok", 10.0, 200.0, 30.0, 212.0),
        ];
        let items = group_runs(1, &runs, 1.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "ok");
    }

    #[test]
    fn bounds_are_divided_by_scale() {
        let runs = vec![run("Scaled", 30.0, 150.0, 90.0, 174.0)];
        let items = group_runs(1, &runs, 1.5);
        let b = items[0].bounds;
        assert_eq!(b, Rect::new(20.0, 100.0, 40.0, 16.0));
        assert_eq!(items[0].font_size, 8.0);
    }

    #[test]
    fn grouping_is_deterministic() {
        let runs = vec![
            run("b", 55.0, 100.0, 95.0, 112.0),
            run("a", 10.0, 100.0, 50.0, 112.0),
            run("c", 10.0, 130.0, 50.0, 142.0),
        ];
        let first = group_runs(1, &runs, 1.0);
        let second = group_runs(1, &runs, 1.0);
        assert_eq!(first, second);
        assert_eq!(first[0].text, "ab");
        assert_eq!(first[1].text, "c");
    }

    #[test]
    fn empty_input_yields_no_items() {
        assert!(group_runs(1, &[], 1.0).is_empty());
    }
}

//! Flattened export: burn pending edits into page content streams
//!
//! Edits never touch the original page content. Each edited page gets one
//! appended content stream, wrapped in q/Q, drawn in a fixed layer order:
//! freehand snapshot, inserted text, replacements, extracted-item edits and
//! deletions, then legacy standalone deletions. Original text is hidden by
//! the triple-rectangle mask rather than removed from the stream, so the
//! operation is purely additive and resilient to unusual source documents.

use crate::coords::{pdf_rect_y, text_baseline_y, REPLACEMENT_NUDGE};
use crate::error::ComposeError;
use crate::ledger::{EditLedger, Rect};
use crate::raster::DecodedImage;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

/// Resource names are prefixed to avoid colliding with the document's own
/// fonts and graphics states.
const FONT_NAME: &str = "MkHelv";
const MASK_GS: &str = "MkMask";

/// Inflation radii for the three stacked mask rectangles, outermost first.
/// The middle rectangle blends at slightly under full opacity so hairline
/// remnants of the original glyphs wash out instead of ghosting.
const MASK_PADS: [f64; 3] = [3.0, 2.0, 1.0];
const MASK_BLEND_ALPHA: f32 = 0.98;

/// Parse a hex color string (e.g. "#FF0000" or "FF0000") to RGB floats in
/// the 0-1 range. Malformed input falls back to black.
pub fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Flatten all pending edits into a new PDF.
///
/// An empty ledger returns the original bytes verbatim. Pages named by the
/// ledger that the document does not have are skipped with a warning, as
/// are freehand snapshots that fail to decode; a bad page never poisons the
/// rest of the export.
pub fn compose(original: &[u8], ledger: &EditLedger) -> Result<Vec<u8>, ComposeError> {
    if !ledger.has_pending_changes() {
        return Ok(original.to_vec());
    }

    let mut doc =
        Document::load_mem(original).map_err(|e| ComposeError::InvalidDocument(e.to_string()))?;

    let pages = doc.get_pages();
    for page_num in ledger.edited_pages() {
        match pages.get(&page_num) {
            Some(&page_id) => compose_page(&mut doc, page_id, page_num, ledger)?,
            None => warn!("Skipping edits for missing page {}", page_num),
        }
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ComposeError::WriteError(e.to_string()))?;
    Ok(output)
}

fn compose_page(
    doc: &mut Document,
    page_id: ObjectId,
    page_num: u32,
    ledger: &EditLedger,
) -> Result<(), ComposeError> {
    let [_, _, page_width, page_height] = media_box(doc, page_id);

    let mut content = String::new();
    let mut needs_font = false;
    let mut needs_mask = false;
    let mut image: Option<(String, ObjectId)> = None;

    // Layer 1: freehand snapshot, scaled to page width and anchored to the
    // top edge.
    if let Some(layer) = ledger.freehand(page_num) {
        match DecodedImage::from_png(&layer.png) {
            Ok(mut img) => {
                img.enhance();
                if img.is_blank() {
                    debug!("Freehand layer on page {} is blank, skipping", page_num);
                } else {
                    let name = format!("MkImg{}", page_num);
                    let image_id = embed_image(doc, &img)?;
                    let drawn_height = page_width * img.height as f64 / img.width as f64;
                    let y = page_height - drawn_height;
                    content.push_str(&format!(
                        "q\n{:.2} 0 0 {:.2} 0 {:.2} cm\n/{} Do\nQ\n",
                        page_width, drawn_height, y, name
                    ));
                    image = Some((name, image_id));
                }
            }
            Err(e) => warn!("Skipping freehand layer on page {}: {}", page_num, e),
        }
    }

    // Layer 2: inserted text boxes.
    for item in ledger.insertions(page_num) {
        let baseline = text_baseline_y(page_height, item.y, item.font_size);
        push_text(&mut content, item.x, baseline, item.font_size, &item.color, &item.text);
        needs_font = true;
    }

    // Layer 3: replacements mask the original region, then draw the new
    // text nudged to sit where the old glyphs were.
    for item in ledger.replacements(page_num) {
        push_mask(&mut content, page_height, &item.bounds);
        needs_mask = true;
        let baseline =
            text_baseline_y(page_height, item.bounds.y, item.font_size) + REPLACEMENT_NUDGE;
        push_text(
            &mut content,
            item.bounds.x + REPLACEMENT_NUDGE,
            baseline,
            item.font_size,
            &item.font_color,
            &item.new_text,
        );
        needs_font = true;
    }

    // Layer 4: extracted items. Deletion wins over a stale edit flag.
    for item in ledger.extracted(page_num) {
        if item.is_deleted {
            push_mask(&mut content, page_height, &item.bounds);
            needs_mask = true;
        } else if item.is_edited {
            let text = item.edited_text.as_deref().unwrap_or(&item.text);
            push_mask(&mut content, page_height, &item.bounds);
            needs_mask = true;
            let baseline =
                text_baseline_y(page_height, item.bounds.y, item.font_size) + REPLACEMENT_NUDGE;
            push_text(
                &mut content,
                item.bounds.x + REPLACEMENT_NUDGE,
                baseline,
                item.font_size,
                "#000000",
                text,
            );
            needs_font = true;
        }
    }

    // Layer 5: legacy standalone deletions that were never migrated.
    for item in ledger.deletions(page_num) {
        push_mask(&mut content, page_height, &item.bounds);
        needs_mask = true;
    }

    if content.is_empty() {
        return Ok(());
    }

    localize_resources(doc, page_id)?;
    if needs_font {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        add_resource(doc, page_id, "Font", FONT_NAME, Object::Reference(font_id))?;
    }
    if needs_mask {
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "BM" => "Multiply",
            "ca" => Object::Real(MASK_BLEND_ALPHA),
        });
        add_resource(doc, page_id, "ExtGState", MASK_GS, Object::Reference(gs_id))?;
    }
    if let Some((name, image_id)) = image {
        add_resource(doc, page_id, "XObject", &name, Object::Reference(image_id))?;
    }

    // Leading newline: the previous content stream may end without trailing
    // whitespace, and raw concatenation would otherwise merge its last
    // operator with our opening q.
    append_content(doc, page_id, format!("\nq\n{}Q\n", content))
}

fn push_text(out: &mut String, x: f64, baseline: f64, font_size: f64, color: &str, text: &str) {
    let (r, g, b) = parse_hex_color(color);
    out.push_str(&format!(
        "BT\n/{} {:.2} Tf\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} Td\n({}) Tj\nET\n",
        FONT_NAME,
        font_size,
        r,
        g,
        b,
        x,
        baseline,
        escape_pdf_string(text)
    ));
}

/// Three stacked white rectangles over the region, inflated 3, 2 and 1
/// units. The middle one multiplies at 98% opacity; the outer and inner are
/// plain opaque fills.
fn push_mask(out: &mut String, page_height: f64, bounds: &Rect) {
    for (idx, pad) in MASK_PADS.iter().enumerate() {
        let r = bounds.inflate(*pad);
        let y = pdf_rect_y(page_height, r.y, r.height);
        if idx == 1 {
            out.push_str(&format!(
                "q\n/{} gs\n1 1 1 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                MASK_GS, r.x, y, r.width, r.height
            ));
        } else {
            out.push_str(&format!(
                "q\n1 1 1 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                r.x, y, r.width, r.height
            ));
        }
    }
}

/// Register the enhanced snapshot as a DeviceRGB image XObject with its
/// alpha channel attached as an SMask.
fn embed_image(doc: &mut Document, img: &DecodedImage) -> Result<ObjectId, ComposeError> {
    let (mut image, smask) = img
        .to_xobjects()
        .map_err(|e| ComposeError::WriteError(e.to_string()))?;
    let smask_id = doc.add_object(smask);
    image.dict.set("SMask", Object::Reference(smask_id));
    Ok(doc.add_object(image))
}

/// Page size as [x, y, width, height], from the page's MediaBox or the
/// nearest ancestor that carries one. Defaults to US Letter.
fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(rect) = dict.get(b"MediaBox").ok().and_then(|obj| parse_box(doc, obj)) {
            return rect;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok());
    }
    [0.0, 0.0, 612.0, 792.0]
}

fn parse_box(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match obj {
        Object::Array(a) => a,
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        _ => return None,
    };
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0f64; 4];
    for (i, item) in arr.iter().enumerate() {
        values[i] = match item {
            Object::Integer(n) => *n as f64,
            Object::Real(r) => *r as f64,
            _ => return None,
        };
    }
    Some([
        values[0],
        values[1],
        values[2] - values[0],
        values[3] - values[1],
    ])
}

/// Replace the page's Resources entry with an inline copy so additions
/// never mutate a dictionary shared with other pages. Inherited resources
/// are cloned down from the ancestor chain; the Font, XObject and
/// ExtGState categories are inlined as well.
fn localize_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), ComposeError> {
    let mut resources = resolve_resources(doc, page_id);
    for key in [b"Font".as_slice(), b"XObject", b"ExtGState"] {
        let inlined = match resources.get(key) {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok().cloned(),
            _ => None,
        };
        if let Some(dict) = inlined {
            resources.set(key, Object::Dictionary(dict));
        }
    }
    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn resolve_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(d)) => return d.clone(),
            Ok(Object::Reference(res_id)) => {
                if let Ok(d) = doc.get_dictionary(*res_id) {
                    return d.clone();
                }
            }
            _ => {}
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok());
    }
    Dictionary::new()
}

fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    value: Object,
) -> Result<(), ComposeError> {
    let page = page_dict_mut(doc, page_id)?;
    let resources = page
        .get_mut(b"Resources")
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| ComposeError::InvalidDocument(e.to_string()))?;
    if resources
        .get(category.as_bytes())
        .and_then(|obj| obj.as_dict())
        .is_err()
    {
        resources.set(category, Object::Dictionary(Dictionary::new()));
    }
    let bucket = resources
        .get_mut(category.as_bytes())
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| ComposeError::InvalidDocument(e.to_string()))?;
    bucket.set(name, value);
    Ok(())
}

fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: String,
) -> Result<(), ComposeError> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
    let page = page_dict_mut(doc, page_id)?;
    let new_ref = Object::Reference(stream_id);
    match page.get_mut(b"Contents") {
        Ok(Object::Array(existing)) => existing.push(new_ref),
        Ok(existing @ Object::Reference(_)) => {
            let old = existing.clone();
            *existing = Object::Array(vec![old, new_ref]);
        }
        _ => page.set("Contents", new_ref),
    }
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, ComposeError> {
    doc.get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| ComposeError::InvalidDocument(e.to_string()))
}

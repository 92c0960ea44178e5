//! Flattening - turning interactive fields into static page content
//!
//! Each visible widget's normal appearance is drawn onto its page as a Form XObject,
//! the widgets are dropped from `/Annots`, and the catalog's `/AcroForm` is removed.
//! After that nothing field-related is left to edit. Flattening a document that has
//! no form and no widgets changes nothing.

use crate::constants::{ANNOT_HIDDEN, ANNOT_NO_VIEW};
use crate::fields::{FormFields, dict_text};
use crate::fill::AppearanceBuilder;
use crate::render::*;
use crate::types::{FieldKind, Result};
use lopdf::{Document, Object, ObjectId};

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Flatten every widget of the document. Returns the number of widgets removed.
pub fn flatten(doc: &mut Document) -> Result<usize> {
    ensure_value_appearances(doc)?;

    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let mut flattened = 0;
    for page_id in page_ids {
        flattened += flatten_page(doc, page_id)?;
    }

    let removed_form = remove_acroform(doc)?;
    if flattened > 0 || removed_form {
        let pruned = doc.prune_objects();
        log::debug!("Pruned {} unreferenced object(s) after flattening", pruned.len());
    }

    log::info!("Flattened {} widget(s)", flattened);
    Ok(flattened)
}

/// Generate appearances for text-like fields whose value has none yet.
///
/// With `/NeedAppearances true` every text-like value is regenerated, since the
/// template is asking the viewer to do exactly that.
fn ensure_value_appearances(doc: &mut Document) -> Result<()> {
    let fields = FormFields::read(doc)?;
    if fields.is_empty() {
        return Ok(());
    }

    let need_appearances = {
        let catalog = doc.catalog()?;
        dict_entry(doc, catalog, b"AcroForm")
            .and_then(|form| form.get(b"NeedAppearances").ok())
            .map(|obj| matches!(resolve(doc, obj), Object::Boolean(true)))
            .unwrap_or(false)
    };

    let mut builder = AppearanceBuilder::default();
    for field in fields.iter() {
        if !matches!(
            field.kind,
            FieldKind::Text | FieldKind::Number | FieldKind::Date | FieldKind::Dropdown
        ) {
            continue;
        }
        let Some(value) = doc
            .get_dictionary(field.id)
            .ok()
            .and_then(|dict| dict_text(doc, dict, b"V"))
        else {
            continue;
        };

        let missing = field.widgets.iter().any(|w| {
            doc.get_dictionary(w.id)
                .ok()
                .and_then(|dict| dict_entry(doc, dict, b"AP"))
                .map(|ap| !ap.has(b"N"))
                .unwrap_or(true)
        });
        if missing || need_appearances {
            builder.refresh(doc, field, &value)?;
        }
    }
    Ok(())
}

/// Draw and remove the widgets of one page
fn flatten_page(doc: &mut Document, page_id: ObjectId) -> Result<usize> {
    let annots: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Annots").ok().map(|obj| resolve(doc, obj)) {
            Some(Object::Array(arr)) => arr.clone(),
            _ => return Ok(0),
        }
    };

    let mut keep = Vec::new();
    let mut draws = Vec::new();
    let mut widgets = 0;

    for annot in annots {
        let Some(dict) = resolve_dict(doc, &annot) else {
            keep.push(annot);
            continue;
        };
        if dict_name(doc, dict, b"Subtype").as_deref() != Some("Widget") {
            keep.push(annot);
            continue;
        }

        widgets += 1;
        let flags = dict_integer(doc, dict, b"F").unwrap_or(0);
        if flags & (ANNOT_HIDDEN | ANNOT_NO_VIEW) != 0 {
            continue;
        }
        if let Some(draw) = widget_drawing(doc, dict) {
            draws.push(draw);
        }
    }

    if widgets == 0 {
        return Ok(0);
    }

    let mut ops = String::new();
    for (stream_id, matrix) in draws {
        mark_as_form_xobject(doc, stream_id)?;
        let name = add_xobject(doc, page_id, "Fm", stream_id)?;
        ops.push_str(&draw_xobject_command(&name, matrix));
    }
    append_page_content(doc, page_id, &ops)?;

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if keep.is_empty() {
        page.remove(b"Annots");
    } else {
        page.set("Annots", Object::Array(keep));
    }

    Ok(widgets)
}

/// The appearance stream a widget shows and the matrix mapping it onto the widget rect
fn widget_drawing(doc: &Document, widget: &lopdf::Dictionary) -> Option<(ObjectId, [f32; 6])> {
    let (rx0, ry0, rx1, ry1) = normalized_rect(doc, widget.get(b"Rect").ok()?)?;
    let ap = dict_entry(doc, widget, b"AP")?;

    let normal = ap.get(b"N").ok()?;
    let stream_id = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            Object::Dictionary(states) => select_state(doc, widget, states)?,
            _ => return None,
        },
        Object::Dictionary(states) => select_state(doc, widget, states)?,
        _ => return None,
    };

    let stream = doc.get_object(stream_id).ok()?.as_stream().ok()?;
    let (bx0, by0, bx1, by1) = stream
        .dict
        .get(b"BBox")
        .ok()
        .and_then(|obj| normalized_rect(doc, obj))
        .unwrap_or((0.0, 0.0, rx1 - rx0, ry1 - ry0));
    let matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|obj| read_matrix(doc, obj))
        .unwrap_or(IDENTITY);

    // Appearance bbox after its own matrix, in form space
    let corners = [(bx0, by0), (bx1, by0), (bx0, by1), (bx1, by1)].map(|(x, y)| {
        (
            matrix[0] * x + matrix[2] * y + matrix[4],
            matrix[1] * x + matrix[3] * y + matrix[5],
        )
    });
    let tx0 = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
    let ty0 = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
    let tx1 = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
    let ty1 = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

    let (tw, th) = (tx1 - tx0, ty1 - ty0);
    if tw <= 0.0 || th <= 0.0 {
        return None;
    }

    let sx = (rx1 - rx0) / tw;
    let sy = (ry1 - ry0) / th;
    Some((stream_id, [sx, 0.0, 0.0, sy, rx0 - tx0 * sx, ry0 - ty0 * sy]))
}

/// Pick the appearance for the widget's current `/AS` state
fn select_state(doc: &Document, widget: &lopdf::Dictionary, states: &lopdf::Dictionary) -> Option<ObjectId> {
    let state = dict_name(doc, widget, b"AS")?;
    states.get(state.as_bytes()).ok()?.as_reference().ok()
}

fn read_matrix(doc: &Document, obj: &Object) -> Option<[f32; 6]> {
    let Object::Array(arr) = resolve(doc, obj) else {
        return None;
    };
    if arr.len() != 6 {
        return None;
    }
    let mut matrix = [0.0; 6];
    for (slot, value) in matrix.iter_mut().zip(arr) {
        *slot = extract_number(resolve(doc, value))?;
    }
    Some(matrix)
}

/// Appearance streams are Form XObjects but often omit the type entries
fn mark_as_form_xobject(doc: &mut Document, stream_id: ObjectId) -> Result<()> {
    let stream = doc.get_object_mut(stream_id)?.as_stream_mut()?;
    if !stream.dict.has(b"Subtype") {
        stream.dict.set("Type", Object::Name(b"XObject".to_vec()));
        stream.dict.set("Subtype", Object::Name(b"Form".to_vec()));
    }
    Ok(())
}

fn remove_acroform(doc: &mut Document) -> Result<bool> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_object_mut(catalog_id)?.as_dict_mut()?;
    Ok(catalog.remove(b"AcroForm").is_some())
}

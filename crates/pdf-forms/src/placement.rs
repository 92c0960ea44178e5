//! Image placement for image and signature fields
//!
//! The geometry is a "contain" fit: the image is scaled uniformly until it touches
//! the field box on one axis and is centered on the other. Placing an image hides the
//! field's own widget and draws the image straight onto the page.

use crate::constants::ANNOT_HIDDEN;
use crate::fields::{FormField, widget_rect};
use crate::render::{add_xobject, append_page_content, dict_integer, draw_xobject_command, embed_image};
use crate::types::{FieldRect, FillWarning, PlacementResult, Result};
use image::ImageReader;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::Path;

/// Compute the centered, aspect-preserving placement of an image inside a field.
///
/// Returns `None` when the box or the image has no area.
pub fn compute_placement(
    field: &FieldRect,
    image_width: f32,
    image_height: f32,
) -> Option<PlacementResult> {
    let dims = [field.width, field.height, image_width, image_height];
    if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return None;
    }

    let aspect_field = field.width / field.height;
    let aspect_image = image_width / image_height;

    let (scaled_width, scaled_height) = if aspect_image > aspect_field {
        let scaled_width = field.width;
        (scaled_width, (scaled_width / aspect_image).min(field.height))
    } else {
        let scaled_height = field.height;
        ((scaled_height * aspect_image).min(field.width), scaled_height)
    };

    Some(PlacementResult {
        x: field.x + (field.width - scaled_width) / 2.0,
        y: field.y + (field.height - scaled_height) / 2.0,
        scaled_width,
        scaled_height,
    })
}

/// Place the image at `path_text` into every widget of `field`.
///
/// Any problem is reported as an `ImagePlacement` warning and leaves the field as it
/// was, except for PDF errors after drawing has started.
pub(crate) fn place_image(
    doc: &mut Document,
    field: &FormField,
    path_text: &str,
) -> std::result::Result<Vec<PlacementResult>, FillWarning> {
    let warning = |reason: String| FillWarning::ImagePlacement {
        field: field.name.clone(),
        path: path_text.to_string(),
        reason,
    };

    if path_text.trim().is_empty() {
        return Err(warning("image path is blank".to_string()));
    }
    let path = Path::new(path_text);
    if !path.is_file() {
        return Err(warning("image file does not exist".to_string()));
    }

    let img = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| warning(format!("image could not be read: {}", e)))?
        .decode()
        .map_err(|e| warning(format!("image could not be decoded: {}", e)))?;

    // Geometry first so nothing is touched when no widget can take the image
    let targets: Vec<(ObjectId, ObjectId, PlacementResult)> = field
        .widgets
        .iter()
        .filter_map(|widget| {
            let page = widget.page?;
            let rect = widget_rect(doc, widget)?;
            let placement = compute_placement(&rect, img.width() as f32, img.height() as f32)?;
            Some((widget.id, page.id, placement))
        })
        .collect();

    if targets.is_empty() {
        return Err(warning(
            "field has no widget with a usable region on a page".to_string(),
        ));
    }

    let image_id = embed_image(doc, &img)
        .map_err(|e| warning(format!("image could not be embedded: {}", e)))?;
    let mut placements = Vec::with_capacity(targets.len());
    for (widget_id, page_id, placement) in targets {
        draw_on_widget(doc, widget_id, page_id, image_id, &placement)
            .map_err(|e| warning(e.to_string()))?;
        placements.push(placement);
    }

    log::debug!(
        "Placed image {} into field `{}` ({} widget(s))",
        path.display(),
        field.name,
        placements.len()
    );
    Ok(placements)
}

fn draw_on_widget(
    doc: &mut Document,
    widget_id: ObjectId,
    page_id: ObjectId,
    image_id: ObjectId,
    placement: &PlacementResult,
) -> Result<()> {
    hide_widget(doc, widget_id)?;

    let name = add_xobject(doc, page_id, "Im", image_id)?;
    let command = draw_xobject_command(
        &name,
        [
            placement.scaled_width,
            0.0,
            0.0,
            placement.scaled_height,
            placement.x,
            placement.y,
        ],
    );
    append_page_content(doc, page_id, &command)
}

/// Stop a widget from rendering anything of its own
fn hide_widget(doc: &mut Document, widget_id: ObjectId) -> Result<()> {
    let flags = {
        let widget = doc.get_dictionary(widget_id)?;
        dict_integer(doc, widget, b"F").unwrap_or(0)
    };

    let blank = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => Object::Array(vec![Object::Integer(0); 4]),
        },
        Vec::new(),
    );
    let blank_id = doc.add_object(blank);

    let widget = doc.get_object_mut(widget_id)?.as_dict_mut()?;
    widget.set("F", Object::Integer(flags | ANNOT_HIDDEN));
    let mut appearance = Dictionary::new();
    appearance.set("N", Object::Reference(blank_id));
    widget.set("AP", Object::Dictionary(appearance));
    widget.remove(b"AS");
    Ok(())
}

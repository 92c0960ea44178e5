//! Form filling - writing field values into a template
//!
//! This module orchestrates a fill:
//! 1. Read the template's field tree
//! 2. Assign each requested value, dispatching on its kind
//! 3. Flatten the result so the output is no longer editable
//!
//! Field-level problems never abort a fill. Each assignment returns a `Result`
//! whose error is the warning to record, and the warnings come back next to the
//! finished document.

mod appearance;

pub(crate) use appearance::AppearanceBuilder;

use crate::constants::*;
use crate::fields::{FormField, FormFields, widget_on_state};
use crate::flatten::flatten;
use crate::io::document_to_bytes;
use crate::placement::place_image;
use crate::types::*;
use lopdf::{Document, Object};

type Assignment = std::result::Result<(), FillWarning>;

/// Fill a template and return the flattened output bytes.
///
/// Fails only when the template cannot be parsed or the output cannot be
/// serialised; every per-field issue is returned as a warning instead.
pub fn fill(template: &[u8], values: &FieldValues) -> Result<FilledDocument> {
    let mut doc = Document::load_mem(template)?;
    let warnings = fill_document(&mut doc, values)?;
    let bytes = document_to_bytes(&mut doc)?;

    log::info!(
        "Filled {} field value(s) with {} warning(s), {} bytes",
        values.len(),
        warnings.len(),
        bytes.len()
    );
    Ok(FilledDocument { bytes, warnings })
}

/// Fill an in-memory document and flatten it
pub fn fill_document(doc: &mut Document, values: &FieldValues) -> Result<Vec<FillWarning>> {
    let warnings = fill_fields(doc, values)?;
    flatten(doc)?;
    Ok(warnings)
}

/// Assign field values without flattening.
///
/// The document stays editable, which is what a caller wants when it intends to
/// flatten later or inspect the assigned states.
pub fn fill_fields(doc: &mut Document, values: &FieldValues) -> Result<Vec<FillWarning>> {
    let fields = FormFields::read(doc)?;
    let mut appearance = AppearanceBuilder::default();
    let mut warnings = Vec::new();

    for (name, value) in values.iter() {
        let outcome = match fields.find(name) {
            Some(field) => assign(doc, &mut appearance, field, value),
            None => Err(FillWarning::FieldLookup {
                field: name.to_string(),
            }),
        };

        match outcome {
            Ok(()) => log::debug!("Assigned {} value to field `{}`", value.kind(), name),
            Err(warning) => {
                log::warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    Ok(warnings)
}

/// Assign one value to one field
fn assign(
    doc: &mut Document,
    appearance: &mut AppearanceBuilder,
    field: &FormField,
    value: &FieldValue,
) -> Assignment {
    match value {
        FieldValue::Text(path) if is_image_field_name(&field.name) => {
            place_image(doc, field, path).map(|_| ())
        }
        FieldValue::Text(text) => set_text(doc, appearance, field, text),
        FieldValue::Flag(checked) if field.kind.is_toggle() => set_toggle(doc, field, *checked),
        FieldValue::Flag(flag) => set_text(doc, appearance, field, &flag.to_string()),
        FieldValue::Number(number) => match format_number(*number) {
            Some(text) => set_text(doc, appearance, field, &text),
            None => Err(assignment_warning(
                field,
                format!("number {} has no textual form", number),
            )),
        },
        FieldValue::Other { kind, text } => {
            set_text(doc, appearance, field, text)?;
            Err(assignment_warning(
                field,
                format!("unexpected value kind `{}` was stored as text", kind),
            ))
        }
    }
}

fn assignment_warning(field: &FormField, reason: impl Into<String>) -> FillWarning {
    FillWarning::FieldAssignment {
        field: field.name.clone(),
        reason: reason.into(),
    }
}

/// Canonical textual form of a number (`3`, `2.5`); `None` for NaN and infinities
fn format_number(number: f64) -> Option<String> {
    if !number.is_finite() {
        return None;
    }
    // Avoid "-0"
    let number = if number == 0.0 { 0.0 } else { number };
    Some(number.to_string())
}

/// Display text in a field, interpreting it according to the field kind
fn set_text(
    doc: &mut Document,
    appearance: &mut AppearanceBuilder,
    field: &FormField,
    text: &str,
) -> Assignment {
    match field.kind {
        FieldKind::Text | FieldKind::Number | FieldKind::Date | FieldKind::Dropdown => appearance
            .write_text(doc, field, text)
            .map_err(|e| assignment_warning(field, e.to_string())),
        FieldKind::Checkbox => match checkbox_text_state(doc, field, text) {
            Some(checked) => set_toggle(doc, field, checked),
            None => Err(assignment_warning(
                field,
                format!("`{}` is not a checkbox state", text),
            )),
        },
        FieldKind::Radio => select_radio_option(doc, field, text),
        // A prefixed text field still holds plain text for non-path values
        FieldKind::Signature | FieldKind::Image if field.is_text_typed() => appearance
            .write_text(doc, field, text)
            .map_err(|e| assignment_warning(field, e.to_string())),
        FieldKind::Signature | FieldKind::Image => Err(assignment_warning(
            field,
            format!("{} fields only accept an image path", field.kind),
        )),
    }
}

/// Interpret text given to a checkbox
fn checkbox_text_state(doc: &Document, field: &FormField, text: &str) -> Option<bool> {
    let text = text.trim();
    let is_on_state = field
        .widgets
        .iter()
        .filter_map(|w| widget_on_state(doc, w.id))
        .any(|state| state.eq_ignore_ascii_case(text));

    if is_on_state {
        return Some(true);
    }
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "x" | "checked" => Some(true),
        "" | "false" | "no" | "off" | "0" | "unchecked" => Some(false),
        _ => None,
    }
}

/// Set a checkbox or radio group to its checked or unchecked sentinel
fn set_toggle(doc: &mut Document, field: &FormField, checked: bool) -> Assignment {
    if field.kind == FieldKind::Radio && checked {
        let first = field
            .widgets
            .first()
            .and_then(|w| widget_on_state(doc, w.id))
            .unwrap_or_else(|| CHECKED_SENTINEL.to_string());
        return select_radio_option(doc, field, &first);
    }

    let states: Vec<_> = field
        .widgets
        .iter()
        .map(|w| {
            let state = if checked {
                widget_on_state(doc, w.id).unwrap_or_else(|| CHECKED_SENTINEL.to_string())
            } else {
                UNCHECKED_SENTINEL.to_string()
            };
            (w.id, state)
        })
        .collect();

    let value = match (checked, states.first()) {
        (true, Some((_, state))) => state.clone(),
        (true, None) => CHECKED_SENTINEL.to_string(),
        (false, _) => UNCHECKED_SENTINEL.to_string(),
    };

    write_states(doc, field, &value, &states)
}

/// Select the radio button whose on-state is `option`, ignoring ASCII case
/// like checkbox states do. The widget's own spelling of the state is written.
fn select_radio_option(doc: &mut Document, field: &FormField, option: &str) -> Assignment {
    let option = option.trim();
    let on_states: Vec<_> = field
        .widgets
        .iter()
        .map(|w| (w.id, widget_on_state(doc, w.id)))
        .collect();

    if option.eq_ignore_ascii_case(UNCHECKED_SENTINEL) {
        let states: Vec<_> = on_states
            .iter()
            .map(|(id, _)| (*id, UNCHECKED_SENTINEL.to_string()))
            .collect();
        return write_states(doc, field, UNCHECKED_SENTINEL, &states);
    }

    let Some(selected) = on_states
        .iter()
        .filter_map(|(_, s)| s.as_deref())
        .find(|s| s.eq_ignore_ascii_case(option))
        .map(str::to_string)
    else {
        return Err(assignment_warning(
            field,
            format!("radio group has no option `{}`", option),
        ));
    };

    let states: Vec<_> = on_states
        .into_iter()
        .map(|(id, state)| match state {
            Some(s) if s == selected => (id, s),
            _ => (id, UNCHECKED_SENTINEL.to_string()),
        })
        .collect();
    write_states(doc, field, &selected, &states)
}

/// Write `/V` on the field and `/AS` on each widget
fn write_states(
    doc: &mut Document,
    field: &FormField,
    value: &str,
    widget_states: &[(lopdf::ObjectId, String)],
) -> Assignment {
    let write = |doc: &mut Document| -> Result<()> {
        doc.get_object_mut(field.id)?
            .as_dict_mut()?
            .set("V", Object::Name(value.as_bytes().to_vec()));
        for (widget_id, state) in widget_states {
            doc.get_object_mut(*widget_id)?
                .as_dict_mut()?
                .set("AS", Object::Name(state.as_bytes().to_vec()));
        }
        Ok(())
    };
    write(doc).map_err(|e| assignment_warning(field, e.to_string()))
}

//! AcroForm field discovery
//!
//! Walks the `/AcroForm /Fields` tree of a template, resolving inherited attributes
//! (`/FT`, `/Ff`, `/DA`, `/Q`) down to the terminal fields, and locates every widget
//! annotation on its page.

use crate::constants::*;
use crate::render::{dict_entry, dict_integer, dict_name, normalized_rect, resolve};
use crate::types::{FieldDefinition, FieldKind, FieldRect, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};

/// Page a widget annotation sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageRef {
    /// 1-based page number
    pub number: u32,
    pub id: ObjectId,
}

#[derive(Debug, Clone)]
pub(crate) struct Widget {
    pub id: ObjectId,
    pub page: Option<PageRef>,
}

/// A terminal form field with its resolved attributes
#[derive(Debug, Clone)]
pub(crate) struct FormField {
    pub name: String,
    pub id: ObjectId,
    pub kind: FieldKind,
    /// Resolved `/FT`, if any
    pub field_type: Option<String>,
    pub flags: i64,
    pub default_appearance: Option<String>,
    pub quadding: i64,
    pub widgets: Vec<Widget>,
    pub validation: Option<String>,
    pub unit: Option<String>,
}

impl FormField {
    pub fn is_multiline(&self) -> bool {
        self.kind == FieldKind::Text && self.flags & FF_MULTILINE != 0
    }

    /// Whether the underlying PDF field stores text (`/Tx`, or no type at all)
    pub fn is_text_typed(&self) -> bool {
        matches!(self.field_type.as_deref(), None | Some("Tx"))
    }

    pub fn definition(&self, doc: &Document) -> FieldDefinition {
        let rect = self.widgets.first().and_then(|w| widget_rect(doc, w));
        FieldDefinition {
            name: self.name.clone(),
            kind: self.kind,
            rect,
            required: self.flags & FF_REQUIRED != 0,
            validation: self.validation.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// All terminal fields of a document, in declaration order
#[derive(Debug, Clone, Default)]
pub(crate) struct FormFields {
    fields: Vec<FormField>,
}

impl FormFields {
    /// Read the field tree. A document without an AcroForm has no fields.
    pub fn read(doc: &Document) -> Result<Self> {
        let catalog = doc.catalog()?;
        let Some(acroform) = dict_entry(doc, catalog, b"AcroForm") else {
            return Ok(Self::default());
        };

        let roots: Vec<ObjectId> = match acroform.get(b"Fields").ok().map(|o| resolve(doc, o)) {
            Some(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => Vec::new(),
        };

        let annot_pages = annotation_pages(doc);
        let inherited = Inherited {
            default_appearance: dict_text(doc, acroform, b"DA"),
            quadding: dict_integer(doc, acroform, b"Q"),
            ..Default::default()
        };

        let mut walker = Walker {
            doc,
            annot_pages: &annot_pages,
            visited: HashSet::new(),
            fields: Vec::new(),
        };
        for root in roots {
            walker.walk(root, None, &inherited, 0);
        }

        Ok(Self {
            fields: walker.fields,
        })
    }

    pub fn find(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field definitions declared by a document
pub fn field_definitions(doc: &Document) -> Result<Vec<FieldDefinition>> {
    let fields = FormFields::read(doc)?;
    Ok(fields.iter().map(|f| f.definition(doc)).collect())
}

// =============================================================================
// Tree Walk
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<String>,
    flags: Option<i64>,
    default_appearance: Option<String>,
    quadding: Option<i64>,
}

struct Walker<'a> {
    doc: &'a Document,
    annot_pages: &'a HashMap<ObjectId, PageRef>,
    visited: HashSet<ObjectId>,
    fields: Vec<FormField>,
}

impl Walker<'_> {
    fn walk(&mut self, id: ObjectId, parent_name: Option<&str>, inherited: &Inherited, depth: usize) {
        if depth > MAX_FIELD_DEPTH || !self.visited.insert(id) {
            return;
        }
        let doc = self.doc;
        let Ok(dict) = doc.get_dictionary(id) else {
            return;
        };

        let name = match (parent_name, dict_text(doc, dict, b"T")) {
            (Some(parent), Some(partial)) => format!("{}.{}", parent, partial),
            (None, Some(partial)) => partial,
            (Some(parent), None) => parent.to_string(),
            (None, None) => return,
        };

        let current = Inherited {
            field_type: dict_name(doc, dict, b"FT").or_else(|| inherited.field_type.clone()),
            flags: dict_integer(doc, dict, b"Ff").or(inherited.flags),
            default_appearance: dict_text(doc, dict, b"DA")
                .or_else(|| inherited.default_appearance.clone()),
            quadding: dict_integer(doc, dict, b"Q").or(inherited.quadding),
        };

        let kids: Vec<ObjectId> = match dict.get(b"Kids").ok().map(|o| resolve(doc, o)) {
            Some(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => Vec::new(),
        };

        let (child_fields, widget_ids): (Vec<ObjectId>, Vec<ObjectId>) =
            kids.into_iter().partition(|kid| {
                doc.get_dictionary(*kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            });

        if !child_fields.is_empty() {
            for child in child_fields {
                self.walk(child, Some(&name), &current, depth + 1);
            }
            if widget_ids.is_empty() {
                return;
            }
        }

        let widget_ids = if widget_ids.is_empty() && dict.has(b"Rect") {
            vec![id]
        } else {
            widget_ids
        };
        let widgets = widget_ids
            .into_iter()
            .map(|wid| Widget {
                id: wid,
                page: self
                    .annot_pages
                    .get(&wid)
                    .copied()
                    .or_else(|| page_from_p_entry(doc, wid)),
            })
            .collect();

        let flags = current.flags.unwrap_or(0);
        let format_js = action_script(doc, dict, b"F");
        let keystroke_js = action_script(doc, dict, b"K");
        let hint = format_js.as_deref().or(keystroke_js.as_deref());

        let kind = classify(&name, current.field_type.as_deref(), flags, hint);
        self.fields.push(FormField {
            name,
            id,
            kind,
            field_type: current.field_type,
            flags,
            default_appearance: current.default_appearance,
            quadding: current.quadding.unwrap_or(0),
            widgets,
            validation: action_script(doc, dict, b"V"),
            unit: format_js.as_deref().and_then(number_unit),
        });
    }
}

/// Derive the field kind from its PDF type and flags. The `image_`/`signature_`
/// name prefixes only refine text fields; buttons and choices keep their type.
fn classify(name: &str, field_type: Option<&str>, flags: i64, format_hint: Option<&str>) -> FieldKind {
    match field_type {
        Some("Btn") if flags & FF_PUSHBUTTON != 0 => FieldKind::Image,
        Some("Btn") if flags & FF_RADIO != 0 => FieldKind::Radio,
        Some("Btn") => FieldKind::Checkbox,
        Some("Ch") => FieldKind::Dropdown,
        Some("Sig") => FieldKind::Signature,
        _ if name.starts_with(IMAGE_FIELD_PREFIX) => FieldKind::Image,
        _ if name.starts_with(SIGNATURE_FIELD_PREFIX) => FieldKind::Signature,
        _ => match format_hint {
            Some(js) if js.contains("AFNumber_") || js.contains("AFPercent_") => FieldKind::Number,
            Some(js) if js.contains("AFDate_") || js.contains("AFTime_") => FieldKind::Date,
            _ => FieldKind::Text,
        },
    }
}

/// JavaScript of the additional action `key` (`/AA /<key> /JS`)
fn action_script(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let actions = dict_entry(doc, dict, b"AA")?;
    let action = dict_entry(doc, actions, key)?;
    match resolve(doc, action.get(b"JS").ok()?) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Stream(stream) => {
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            Some(decode_text_string(&content))
        }
        _ => None,
    }
}

/// Currency/unit argument of an `AFNumber_Format(...)` call, if non-empty
fn number_unit(js: &str) -> Option<String> {
    let start = js.find("AFNumber_Format(")? + "AFNumber_Format(".len();
    let call = &js[start..];
    let call = &call[..call.find(')').unwrap_or(call.len())];
    let open = call.find('"')?;
    let rest = &call[open + 1..];
    let close = rest.find('"')?;
    let unit = rest[..close].trim();
    (!unit.is_empty()).then(|| unit.to_string())
}

// =============================================================================
// Pages and Widgets
// =============================================================================

/// Map every annotation id to the page listing it in /Annots
fn annotation_pages(doc: &Document) -> HashMap<ObjectId, PageRef> {
    let mut map = HashMap::new();
    for (number, page_id) in doc.get_pages() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Some(Object::Array(annots)) = page.get(b"Annots").ok().map(|o| resolve(doc, o)) else {
            continue;
        };
        for annot in annots {
            if let Ok(annot_id) = annot.as_reference() {
                map.entry(annot_id).or_insert(PageRef {
                    number,
                    id: page_id,
                });
            }
        }
    }
    map
}

/// Fall back to the widget's /P entry when no page lists it
fn page_from_p_entry(doc: &Document, widget_id: ObjectId) -> Option<PageRef> {
    let page_id = doc
        .get_dictionary(widget_id)
        .ok()?
        .get(b"P")
        .ok()?
        .as_reference()
        .ok()?;
    doc.get_pages()
        .into_iter()
        .find(|(_, id)| *id == page_id)
        .map(|(number, id)| PageRef { number, id })
}

/// Normalised widget rectangle as a field region
pub(crate) fn widget_rect(doc: &Document, widget: &Widget) -> Option<FieldRect> {
    let dict = doc.get_dictionary(widget.id).ok()?;
    let (llx, lly, urx, ury) = normalized_rect(doc, dict.get(b"Rect").ok()?)?;
    Some(FieldRect {
        x: llx,
        y: lly,
        width: urx - llx,
        height: ury - lly,
        page: widget.page.map(|p| p.number).unwrap_or(0),
    })
}

/// Name of the widget's "on" appearance state, if it declares one
pub(crate) fn widget_on_state(doc: &Document, widget_id: ObjectId) -> Option<String> {
    let dict = doc.get_dictionary(widget_id).ok()?;
    let ap = dict_entry(doc, dict, b"AP")?;
    ["N", "D"].iter().find_map(|key| {
        let states = dict_entry(doc, ap, key.as_bytes())?;
        states
            .iter()
            .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
            .find(|name| name != UNCHECKED_SENTINEL)
    })
}

// =============================================================================
// Text Strings
// =============================================================================

/// Text-string entry of a dictionary
pub(crate) fn dict_text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok().map(|o| resolve(doc, o)) {
        Some(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte)
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_prefix_and_type() {
        assert_eq!(classify("image_logo", Some("Tx"), 0, None), FieldKind::Image);
        assert_eq!(classify("signature_tech", Some("Sig"), 0, None), FieldKind::Signature);
        assert_eq!(classify("urgent", Some("Btn"), 0, None), FieldKind::Checkbox);
        assert_eq!(classify("shift", Some("Btn"), FF_RADIO, None), FieldKind::Radio);
        assert_eq!(classify("photo", Some("Btn"), FF_PUSHBUTTON, None), FieldKind::Image);
        assert_eq!(classify("site", Some("Ch"), 0, None), FieldKind::Dropdown);
        assert_eq!(classify("title", Some("Tx"), 0, None), FieldKind::Text);
        assert_eq!(classify("title", None, 0, None), FieldKind::Text);
    }

    #[test]
    fn test_prefix_does_not_override_button_or_choice_type() {
        assert_eq!(classify("signature_obtained", Some("Btn"), 0, None), FieldKind::Checkbox);
        assert_eq!(classify("image_side", Some("Btn"), FF_RADIO, None), FieldKind::Radio);
        assert_eq!(classify("image_style", Some("Ch"), 0, None), FieldKind::Dropdown);
        assert_eq!(classify("signature_date", None, 0, None), FieldKind::Signature);
    }

    #[test]
    fn test_classify_by_format_script() {
        let number = "AFNumber_Format(2, 0, 0, 0, \"kg\", false);";
        let date = "AFDate_FormatEx(\"dd/mm/yyyy\");";
        assert_eq!(classify("weight", Some("Tx"), 0, Some(number)), FieldKind::Number);
        assert_eq!(classify("due", Some("Tx"), 0, Some(date)), FieldKind::Date);
    }

    #[test]
    fn test_number_unit() {
        assert_eq!(
            number_unit("AFNumber_Format(2, 0, 0, 0, \"kg\", false);"),
            Some("kg".to_string())
        );
        assert_eq!(number_unit("AFNumber_Format(2, 0, 0, 0, \"\", true);"), None);
        assert_eq!(number_unit("AFDate_FormatEx(\"yyyy\");"), None);
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Pump"), "Pump");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
    }
}

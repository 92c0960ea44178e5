#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::path::Path;

/// Marker drawn by the checked appearance of the `urgent` checkbox
pub const CHECK_ON: &str = "% CHECK_ON";
/// Marker drawn by the unchecked appearance of the `urgent` checkbox
pub const CHECK_OFF: &str = "% CHECK_OFF";
/// Marker drawn by the placeholder appearance of `image_photo`
pub const PHOTO_PLACEHOLDER: &str = "% PHOTO_PLACEHOLDER";
/// Marker in the original page content
pub const PAGE_BASE: &str = "% JOB_CARD_BASE";

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![
        Object::Integer(x0),
        Object::Integer(y0),
        Object::Integer(x1),
        Object::Integer(y1),
    ])
}

fn text(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

fn name(s: &str) -> Object {
    Object::Name(s.as_bytes().to_vec())
}

/// Appearance stream without type entries, the way many authoring tools write them
fn appearance(doc: &mut Document, content: &str) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! { "BBox" => rect(0, 0, 12, 12) },
        content.as_bytes().to_vec(),
    ))
}

/// `/AP << /N << /<on> on_stream /Off off_stream >> >>`
fn toggle_appearance(doc: &mut Document, on_state: &str, on: &str, off: &str) -> Object {
    let on_id = appearance(doc, on);
    let off_id = appearance(doc, off);
    let mut states = Dictionary::new();
    states.set(on_state, Object::Reference(on_id));
    states.set("Off", Object::Reference(off_id));
    Object::Dictionary(dictionary! { "N" => states })
}

/// Build a blank one-page-per-entry document (the page tree shape of the
/// imposition tests), with `marker{i}` as each page's content.
pub fn create_test_pdf(num_pages: usize, marker: &str) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = format!("% {}{}\n", marker, i);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", name("Page")),
            ("Parent", Object::Reference(pages_id)),
            ("MediaBox", rect(0, 0, 612, 792)),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", name("Pages")),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", name("Catalog")),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    doc
}

/// Like `create_test_pdf`, but the pages inherit `MediaBox` and `Resources` from the
/// page tree root instead of carrying their own.
pub fn create_inheriting_pdf(num_pages: usize, marker: &str) -> Document {
    let mut doc = create_test_pdf(num_pages, marker);
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in &page_ids {
        let page = doc.get_object_mut(*page_id).unwrap().as_dict_mut().unwrap();
        page.remove(b"MediaBox");
        page.remove(b"Resources");
    }

    let pages_id = doc
        .catalog()
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_reference()
        .unwrap();
    let pages = doc.get_object_mut(pages_id).unwrap().as_dict_mut().unwrap();
    pages.set("MediaBox", rect(0, 0, 300, 400));
    pages.set("Resources", Object::Dictionary(Dictionary::new()));
    doc
}

/// One-page job card form.
///
/// Fields:
/// - `title`: text, auto-sized, widget merged into the field
/// - `weight`: text formatted as a number in kg, required
/// - `urgent`: checkbox with on-state `Yes`
/// - `approved`: checkbox with on-state `On`
/// - `shift`: radio group with options `day` and `night`
/// - `site`: dropdown
/// - `signature_tech`: signature field taking an image path
/// - `image_photo`: push-button image field with a placeholder appearance
///
/// The page also carries a link annotation that is not a widget.
pub fn create_job_card() -> Document {
    let mut doc = create_test_pdf(1, "JOB_CARD_BASE");
    let page_id = doc.get_pages()[&1];
    let mut annots = Vec::new();
    let mut fields = Vec::new();

    let title_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => text("title"),
        "Rect" => rect(100, 700, 400, 720),
        "DA" => text("/Helv 0 Tf 0 g"),
        "P" => Object::Reference(page_id),
    });
    annots.push(title_id);
    fields.push(title_id);

    let weight_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => text("weight"),
        "Ff" => 2,
        "Q" => 2,
        "Rect" => rect(100, 660, 200, 680),
        "DA" => text("/Helv 10 Tf 0 g"),
        "AA" => dictionary! {
            "F" => dictionary! {
                "S" => "JavaScript",
                "JS" => text("AFNumber_Format(2, 0, 0, 0, \"kg\", false);"),
            },
        },
        "P" => Object::Reference(page_id),
    });
    annots.push(weight_id);
    fields.push(weight_id);

    let urgent_ap = toggle_appearance(&mut doc, "Yes", CHECK_ON, CHECK_OFF);
    let urgent_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => text("urgent"),
        "Rect" => rect(420, 700, 432, 712),
        "V" => name("Off"),
        "AS" => name("Off"),
        "AP" => urgent_ap,
        "P" => Object::Reference(page_id),
    });
    annots.push(urgent_id);
    fields.push(urgent_id);

    let approved_ap = toggle_appearance(&mut doc, "On", "% APPROVED_ON", "% APPROVED_OFF");
    let approved_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => text("approved"),
        "Rect" => rect(440, 700, 452, 712),
        "AS" => name("Off"),
        "AP" => approved_ap,
        "P" => Object::Reference(page_id),
    });
    annots.push(approved_id);
    fields.push(approved_id);

    let shift_id = doc.new_object_id();
    let mut shift_kids = Vec::new();
    for (i, option) in ["day", "night"].into_iter().enumerate() {
        let ap = toggle_appearance(&mut doc, option, &format!("% SHIFT_{}", option), "% SHIFT_OFF");
        let x = 100 + 30 * i as i64;
        let widget_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => Object::Reference(shift_id),
            "Rect" => rect(x, 620, x + 12, 632),
            "AS" => name("Off"),
            "AP" => ap,
            "P" => Object::Reference(page_id),
        });
        annots.push(widget_id);
        shift_kids.push(Object::Reference(widget_id));
    }
    doc.objects.insert(
        shift_id,
        Object::Dictionary(dictionary! {
            "FT" => "Btn",
            "T" => text("shift"),
            "Ff" => 1 << 15,
            "V" => name("Off"),
            "Kids" => Object::Array(shift_kids),
        }),
    );
    fields.push(shift_id);

    let site_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "T" => text("site"),
        "Ff" => 1 << 17,
        "Opt" => Object::Array(vec![text("North Plant"), text("South Plant")]),
        "Rect" => rect(100, 580, 300, 600),
        "DA" => text("/Helv 9 Tf 0 0 1 rg"),
        "P" => Object::Reference(page_id),
    });
    annots.push(site_id);
    fields.push(site_id);

    let signature_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Sig",
        "T" => text("signature_tech"),
        "Rect" => rect(100, 100, 300, 150),
        "P" => Object::Reference(page_id),
    });
    annots.push(signature_id);
    fields.push(signature_id);

    let placeholder_id = appearance(&mut doc, PHOTO_PLACEHOLDER);
    let photo_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "Ff" => 1 << 16,
        "T" => text("image_photo"),
        "Rect" => rect(350, 100, 450, 200),
        "AP" => dictionary! { "N" => Object::Reference(placeholder_id) },
        "P" => Object::Reference(page_id),
    });
    annots.push(photo_id);
    fields.push(photo_id);

    let link_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect(10, 10, 50, 20),
    });

    let mut annot_refs: Vec<Object> = annots.into_iter().map(Object::Reference).collect();
    annot_refs.push(Object::Reference(link_id));
    doc.get_object_mut(page_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Annots", Object::Array(annot_refs));

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => Object::Array(fields.into_iter().map(Object::Reference).collect()),
        "DA" => text("/Helv 0 Tf 0 g"),
    });
    doc.catalog_mut()
        .unwrap()
        .set("AcroForm", Object::Reference(acroform_id));

    doc
}

/// Change the partial name (`/T`) of a field
pub fn rename_field(doc: &mut Document, from: &str, to: &str) {
    let id = doc
        .objects
        .iter()
        .find(|(_, obj)| {
            obj.as_dict()
                .ok()
                .and_then(|d| d.get(b"T").ok())
                .and_then(|t| t.as_str().ok())
                == Some(from.as_bytes())
        })
        .map(|(id, _)| *id)
        .unwrap();
    doc.get_object_mut(id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("T", text(to));
}

pub fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

pub fn job_card_bytes() -> Vec<u8> {
    to_bytes(&mut create_job_card())
}

pub fn write_pdf(doc: &mut Document, path: &Path) {
    std::fs::write(path, to_bytes(doc)).unwrap();
}

/// Write an opaque PNG of the given size
pub fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 60, 255]))
        .save(path)
        .unwrap();
}

// =============================================================================
// Inspection
// =============================================================================

pub fn has_acroform(doc: &Document) -> bool {
    doc.catalog().unwrap().has(b"AcroForm")
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        other => other,
    }
}

/// Number of widget annotations across all pages
pub fn widget_count(doc: &Document) -> usize {
    let mut count = 0;
    for page_id in doc.get_pages().values() {
        let page = doc.get_dictionary(*page_id).unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        for annot in deref(doc, annots).as_array().unwrap() {
            let dict = deref(doc, annot).as_dict().unwrap();
            if dict.get(b"Subtype").unwrap().as_name().unwrap() == b"Widget" {
                count += 1;
            }
        }
    }
    count
}

/// Streams registered as XObjects on the page
pub fn page_xobjects(doc: &Document, page_number: u32) -> Vec<Stream> {
    let page_id = doc.get_pages()[&page_number];
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = deref(doc, page.get(b"Resources").unwrap()).as_dict().unwrap();
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Vec::new();
    };
    deref(doc, xobjects)
        .as_dict()
        .unwrap()
        .iter()
        .map(|(_, obj)| deref(doc, obj).as_stream().unwrap().clone())
        .collect()
}

pub fn image_xobject_count(doc: &Document, page_number: u32) -> usize {
    page_xobjects(doc, page_number)
        .iter()
        .filter(|s| s.dict.get(b"Subtype").unwrap().as_name().unwrap() == b"Image")
        .count()
}

/// Whether any Form XObject on the page draws `marker`
pub fn page_draws(doc: &Document, page_number: u32, marker: &str) -> bool {
    page_xobjects(doc, page_number).iter().any(|s| {
        s.dict.get(b"Subtype").unwrap().as_name().unwrap() == b"Form"
            && String::from_utf8_lossy(&s.content).contains(marker)
    })
}

pub fn page_content(doc: &Document, page_number: u32) -> String {
    let page_id = doc.get_pages()[&page_number];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Top-level field dictionary by partial name
pub fn field_dict<'a>(doc: &'a Document, field: &str) -> &'a Dictionary {
    let acroform = deref(doc, doc.catalog().unwrap().get(b"AcroForm").unwrap())
        .as_dict()
        .unwrap();
    deref(doc, acroform.get(b"Fields").unwrap())
        .as_array()
        .unwrap()
        .iter()
        .map(|f| deref(doc, f).as_dict().unwrap())
        .find(|d| d.get(b"T").unwrap().as_str().unwrap() == field.as_bytes())
        .unwrap()
}

/// `/V` of a top-level field as text (names and strings alike)
pub fn field_value(doc: &Document, field: &str) -> Option<String> {
    match field_dict(doc, field).get(b"V").ok()? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        Object::String(s, _) => Some(String::from_utf8_lossy(s).into_owned()),
        _ => None,
    }
}

/// `/AS` of a widget-merged field, or of every kid widget of a field
pub fn widget_states(doc: &Document, field: &str) -> Vec<String> {
    let dict = field_dict(doc, field);
    let widgets: Vec<&Dictionary> = match dict.get(b"Kids") {
        Ok(kids) => deref(doc, kids)
            .as_array()
            .unwrap()
            .iter()
            .map(|k| deref(doc, k).as_dict().unwrap())
            .collect(),
        Err(_) => vec![dict],
    };
    widgets
        .into_iter()
        .map(|w| String::from_utf8_lossy(w.get(b"AS").unwrap().as_name().unwrap()).into_owned())
        .collect()
}

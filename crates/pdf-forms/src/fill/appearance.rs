//! Appearance streams for text-like fields
//!
//! Viewers only show what a widget's normal appearance (`/AP /N`) draws, so setting
//! `/V` alone is not enough once the form is flattened. Every text assignment
//! regenerates the appearance of each widget with a standard Helvetica font.

use crate::constants::*;
use crate::fields::{FormField, widget_rect};
use crate::render::fmt_num;
use crate::types::Result;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

/// Font size and colour taken from a field's `/DA` string
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DefaultAppearance {
    /// `None` means auto-size (`0 Tf`)
    pub font_size: Option<f32>,
    pub color_ops: String,
}

impl Default for DefaultAppearance {
    fn default() -> Self {
        Self {
            font_size: Some(DEFAULT_FONT_SIZE),
            color_ops: "0 g".to_string(),
        }
    }
}

/// Parse the relevant parts of a default appearance string such as `/Helv 0 Tf 0 g`
pub(crate) fn parse_default_appearance(da: &str) -> DefaultAppearance {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let mut parsed = DefaultAppearance::default();

    for (i, token) in tokens.iter().enumerate() {
        let operands = match *token {
            "Tf" => {
                if let Some(size) = i.checked_sub(1).and_then(|j| tokens[j].parse::<f32>().ok()) {
                    parsed.font_size = (size > 0.0).then_some(size);
                }
                continue;
            }
            "g" => 1,
            "rg" => 3,
            "k" => 4,
            _ => continue,
        };
        if i >= operands && tokens[i - operands..i].iter().all(|t| t.parse::<f32>().is_ok()) {
            parsed.color_ops = tokens[i - operands..=i].join(" ");
        }
    }

    parsed
}

/// Generates text appearances, sharing one font object per document
#[derive(Debug, Default)]
pub(crate) struct AppearanceBuilder {
    font_id: Option<ObjectId>,
}

impl AppearanceBuilder {
    fn font(&mut self, doc: &mut Document) -> ObjectId {
        *self.font_id.get_or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            })
        })
    }

    /// Set the field's value and rebuild the appearance of each of its widgets
    pub fn write_text(&mut self, doc: &mut Document, field: &FormField, text: &str) -> Result<()> {
        doc.get_object_mut(field.id)?
            .as_dict_mut()?
            .set("V", text_string(text));

        self.refresh(doc, field, text)
    }

    /// Rebuild widget appearances for `text` without touching `/V`
    pub fn refresh(&mut self, doc: &mut Document, field: &FormField, text: &str) -> Result<()> {
        let da = field
            .default_appearance
            .as_deref()
            .map(parse_default_appearance)
            .unwrap_or_default();
        let font_id = self.font(doc);

        for widget in &field.widgets {
            let Some(rect) = widget_rect(doc, widget) else {
                continue;
            };
            let content = text_content(
                text,
                rect.width,
                rect.height,
                &da,
                field.quadding,
                field.is_multiline(),
            );

            let mut fonts = Dictionary::new();
            fonts.set(APPEARANCE_FONT_NAME, Object::Reference(font_id));
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(rect.width),
                        Object::Real(rect.height),
                    ]),
                    "Resources" => dictionary! { "Font" => fonts },
                },
                content.into_bytes(),
            );
            let stream_id = doc.add_object(stream);

            let mut appearance = Dictionary::new();
            appearance.set("N", Object::Reference(stream_id));
            doc.get_object_mut(widget.id)?
                .as_dict_mut()?
                .set("AP", Object::Dictionary(appearance));
        }
        Ok(())
    }
}

/// Build the content stream drawing `text` inside a `width` × `height` box
pub(crate) fn text_content(
    text: &str,
    width: f32,
    height: f32,
    da: &DefaultAppearance,
    quadding: i64,
    multiline: bool,
) -> String {
    let lines: Vec<&str> = if multiline {
        text.split('\n').collect()
    } else {
        vec![text.lines().next().unwrap_or("")]
    };
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);

    let font_size = da.font_size.unwrap_or_else(|| {
        let by_height = if multiline {
            (height - 2.0 * TEXT_PADDING) / (lines.len() as f32 * 1.15)
        } else {
            height * 0.7
        };
        let by_width = (width - 2.0 * TEXT_PADDING) / (longest as f32 * HELVETICA_CHAR_WIDTH_RATIO);
        by_height.min(by_width).min(DEFAULT_FONT_SIZE).max(MIN_AUTO_FONT_SIZE)
    });
    let leading = font_size * 1.15;

    let mut ops = String::new();
    ops.push_str("/Tx BMC\nq\n");
    ops.push_str(&format!(
        "1 1 {} {} re W n\n",
        fmt_num((width - 2.0).max(0.0)),
        fmt_num((height - 2.0).max(0.0))
    ));
    ops.push_str("BT\n");
    ops.push_str(&format!("/{} {} Tf\n", APPEARANCE_FONT_NAME, fmt_num(font_size)));
    ops.push_str(&da.color_ops);
    ops.push('\n');

    let first_baseline = if multiline {
        height - TEXT_PADDING - font_size
    } else {
        (height - font_size) / 2.0 + font_size * 0.22
    };

    let mut previous_x = 0.0;
    for (i, line) in lines.iter().enumerate() {
        let text_width = line.chars().count() as f32 * font_size * HELVETICA_CHAR_WIDTH_RATIO;
        let x = match quadding {
            1 => (width - text_width) / 2.0,
            2 => width - TEXT_PADDING - text_width,
            _ => TEXT_PADDING,
        }
        .max(TEXT_PADDING);

        if i == 0 {
            ops.push_str(&format!("{} {} Td\n", fmt_num(x), fmt_num(first_baseline)));
        } else {
            ops.push_str(&format!("{} {} Td\n", fmt_num(x - previous_x), fmt_num(-leading)));
        }
        previous_x = x;
        ops.push_str(&format!("({}) Tj\n", escape_literal(&encode_win_ansi(line))));
    }

    ops.push_str("ET\nQ\nEMC\n");
    ops
}

/// Encode text for a WinAnsi-encoded standard font; unmappable characters become `?`
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => win_ansi_extra(c).unwrap_or(b'?'),
        })
        .collect()
}

/// WinAnsi bytes 0x80-0x9F, which differ from Latin-1
fn win_ansi_extra(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Escape bytes for use inside a PDF literal string
pub(crate) fn escape_literal(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                escaped.push('\\');
                escaped.push(b as char);
            }
            0x20..=0x7E => escaped.push(b as char),
            _ => escaped.push_str(&format!("\\{:03o}", b)),
        }
    }
    escaped
}

/// PDF text string object: literal for printable ASCII, UTF-16BE otherwise
pub(crate) fn text_string(text: &str) -> Object {
    if text.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

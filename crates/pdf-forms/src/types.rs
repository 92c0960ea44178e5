use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an operation.
///
/// A document that cannot be read, parsed or written is reported as `Pdf` (lopdf
/// could not parse or serialise it) or `Io` (the filesystem refused). Use
/// [`FormError::is_document_io`] to treat both as one document I/O failure.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Document I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error("Template initialization failed for {path}: {source}")]
    TemplateInitialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Merge source #{index} ({path}) could not be loaded: {source}")]
    MergeSource {
        index: usize,
        path: PathBuf,
        #[source]
        source: Box<FormError>,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("No documents to merge")]
    NoSources,
}

impl FormError {
    /// Whether a document could not be read, parsed or written, including a
    /// merge source that failed to load for that reason
    pub fn is_document_io(&self) -> bool {
        match self {
            FormError::Pdf(_) | FormError::Io(_) => true,
            FormError::MergeSource { source, .. } => source.is_document_io(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

/// Non-fatal problems recorded while filling a single field.
///
/// A fill always produces a document when document-level I/O succeeds; these are
/// returned next to it instead of aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FillWarning {
    #[error("field `{field}` does not exist in the template")]
    FieldLookup { field: String },
    #[error("field `{field}` could not be assigned: {reason}")]
    FieldAssignment { field: String, reason: String },
    #[error("image for field `{field}` was not placed ({path}): {reason}")]
    ImagePlacement {
        field: String,
        path: String,
        reason: String,
    },
}

impl FillWarning {
    /// Name of the field the warning is about
    pub fn field(&self) -> &str {
        match self {
            FillWarning::FieldLookup { field }
            | FillWarning::FieldAssignment { field, .. }
            | FillWarning::ImagePlacement { field, .. } => field,
        }
    }
}

/// A value supplied for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Number(f64),
    /// Any value kind the engine does not natively support. It is still rendered
    /// through `text`, but always produces a `FieldAssignment` warning.
    Other { kind: String, text: String },
}

impl FieldValue {
    /// Short name of the value kind, used in diagnostics
    pub fn kind(&self) -> &str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Flag(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Other { kind, .. } => kind,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

/// Ordered field name → value mapping for one fill request.
///
/// Insertion order is kept so that warnings come back in the order the caller
/// supplied the values. Inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    entries: Vec<(String, FieldValue)>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build values from a JSON object.
    ///
    /// Strings become text, booleans flags, numbers numbers. Every other JSON kind is
    /// kept as `FieldValue::Other` with its JSON rendering as text.
    #[cfg(feature = "serde")]
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        let object = value.as_object().ok_or_else(|| {
            FormError::Config("Field values must be a JSON object".to_string())
        })?;

        let mut values = FieldValues::new();
        for (name, value) in object {
            let field_value = match value {
                Value::String(s) => FieldValue::Text(s.clone()),
                Value::Bool(b) => FieldValue::Flag(*b),
                Value::Number(n) => match n.as_f64() {
                    Some(f) => FieldValue::Number(f),
                    None => FieldValue::Other {
                        kind: "number".to_string(),
                        text: n.to_string(),
                    },
                },
                Value::Null => FieldValue::Other {
                    kind: "null".to_string(),
                    text: String::new(),
                },
                Value::Array(_) => FieldValue::Other {
                    kind: "array".to_string(),
                    text: value.to_string(),
                },
                Value::Object(_) => FieldValue::Other {
                    kind: "object".to_string(),
                    text: value.to_string(),
                },
            };
            values.insert(name.clone(), field_value);
        }
        Ok(values)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = FieldValues::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

/// Field kinds a template can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Checkbox,
    Radio,
    Dropdown,
    Signature,
    Image,
}

impl FieldKind {
    /// Whether the field has a checked/unchecked state
    pub fn is_toggle(self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Radio)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Dropdown => "dropdown",
            FieldKind::Signature => "signature",
            FieldKind::Image => "image",
        };
        f.write_str(name)
    }
}

/// Field region in PDF user space (origin bottom-left, points)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// 1-based page number, 0 when the widget is not attached to a page
    pub page: u32,
}

/// A form field as declared by the template
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDefinition {
    /// Fully-qualified field name (`parent.child`)
    pub name: String,
    pub kind: FieldKind,
    pub rect: Option<FieldRect>,
    pub required: bool,
    pub validation: Option<String>,
    pub unit: Option<String>,
}

/// Aspect-fit image placement inside a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementResult {
    pub x: f32,
    pub y: f32,
    pub scaled_width: f32,
    pub scaled_height: f32,
}

/// Output of a fill: the finalized document bytes plus per-field diagnostics
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub warnings: Vec<FillWarning>,
}

impl FilledDocument {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

//! Shared constants for form filling
//!
//! Field flag bits, annotation flags and the text appearance defaults live here so
//! the fill, flatten and placement code agree on them.

// =============================================================================
// Naming Conventions
// =============================================================================

/// Fields with this prefix take an image path instead of text
pub const IMAGE_FIELD_PREFIX: &str = "image_";

/// Fields with this prefix take a signature image path instead of text
pub const SIGNATURE_FIELD_PREFIX: &str = "signature_";

/// Whether a field name marks an image-reference field
#[inline]
pub fn is_image_field_name(name: &str) -> bool {
    name.starts_with(IMAGE_FIELD_PREFIX) || name.starts_with(SIGNATURE_FIELD_PREFIX)
}

// =============================================================================
// Toggle Sentinels
// =============================================================================

/// Appearance state used for "checked" when a widget declares no on-state of its own
pub const CHECKED_SENTINEL: &str = "Yes";

/// Appearance state for "unchecked" (fixed by the PDF format)
pub const UNCHECKED_SENTINEL: &str = "Off";

// =============================================================================
// Field Flags (/Ff)
// =============================================================================

/// Bit 2: the field must have a value when submitted
pub const FF_REQUIRED: i64 = 1 << 1;

/// Bit 13: text field spans multiple lines
pub const FF_MULTILINE: i64 = 1 << 12;

/// Bit 16: button is a radio group
pub const FF_RADIO: i64 = 1 << 15;

/// Bit 17: button is a push-button
pub const FF_PUSHBUTTON: i64 = 1 << 16;

// =============================================================================
// Annotation Flags (/F)
// =============================================================================

/// Annotation is not displayed or printed
pub const ANNOT_HIDDEN: i64 = 1 << 1;

/// Annotation is not displayed on screen
pub const ANNOT_NO_VIEW: i64 = 1 << 5;

// =============================================================================
// Text Appearance
// =============================================================================

/// Font size used when the field's /DA gives none
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Lower bound for auto-sized text (/DA font size 0)
pub const MIN_AUTO_FONT_SIZE: f32 = 4.0;

/// Padding between the field border and its text (points)
pub const TEXT_PADDING: f32 = 2.0;

/// Approximate character width ratio for Helvetica
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Resource name of the font used in generated appearances
pub const APPEARANCE_FONT_NAME: &str = "Helv";

/// Guard against cyclic field trees
pub const MAX_FIELD_DEPTH: usize = 32;

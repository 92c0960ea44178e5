//! Page content and resource editing
//!
//! Helpers for appending drawing operations to existing pages without disturbing the
//! page's original content, and for registering XObjects in page resources.

use crate::types::Result;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Limit for reference chains and parent walks
const MAX_CHAIN_DEPTH: usize = 64;

const SAVE_STATE: &[u8] = b"q\n";
const RESTORE_STATE: &[u8] = b"Q\n";

// =============================================================================
// Object Helpers
// =============================================================================

/// Follow references until a direct object is reached.
///
/// A dangling reference is returned as-is so callers fail on the type check
/// instead of here.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_CHAIN_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Resolve an object expected to be a dictionary
pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Look up `key` in `dict` and resolve the value to a dictionary
pub fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key).ok().and_then(|obj| resolve_dict(doc, obj))
}

/// Extract numeric value from a PDF object
pub fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Integer entry of a dictionary, following one level of reference
pub fn dict_integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        Some(Object::Integer(i)) => Some(*i),
        _ => None,
    }
}

/// Name entry of a dictionary as a string
pub fn dict_name(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        Some(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Read a rectangle array and normalise it to `(llx, lly, urx, ury)`
pub fn normalized_rect(doc: &Document, obj: &Object) -> Option<(f32, f32, f32, f32)> {
    let arr = match resolve(doc, obj) {
        Object::Array(arr) if arr.len() == 4 => arr,
        _ => return None,
    };
    let values: Vec<f32> = arr
        .iter()
        .map(|o| extract_number(resolve(doc, o)))
        .collect::<Option<_>>()?;
    Some((
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ))
}

/// Format a float compactly for content streams
pub fn fmt_num(value: f32) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

// =============================================================================
// Page Attributes
// =============================================================================

/// Find a page attribute, walking up the page tree for inheritable keys.
pub fn find_inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_CHAIN_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Copy inherited attributes onto the page itself.
///
/// Needed before a page is moved under a different parent, otherwise it would lose
/// the media box or resources it inherited from its old ancestors.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE_PAGE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = find_inherited(doc, page_id, key) {
                inherited.push((key, value));
            }
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key.to_vec(), value);
    }
    Ok(())
}

// =============================================================================
// Resources
// =============================================================================

/// Give the page its own direct /Resources dictionary.
///
/// Shared or inherited resources are copied so edits stay local to this page.
fn ensure_inline_resources(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let resources = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Resources") {
            Ok(Object::Dictionary(_)) => return Ok(()),
            Ok(obj) => resolve_dict(doc, obj).cloned().unwrap_or_else(Dictionary::new),
            Err(_) => find_inherited(doc, page_id, b"Resources")
                .and_then(|obj| resolve_dict(doc, &obj).cloned())
                .unwrap_or_else(Dictionary::new),
        }
    };

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Register an XObject in the page's resources under a fresh name.
///
/// Returns the chosen resource name (`{prefix}{n}`, first unused `n`).
pub fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject_id: ObjectId,
) -> Result<String> {
    ensure_inline_resources(doc, page_id)?;

    let mut xobjects = {
        let page = doc.get_dictionary(page_id)?;
        let resources = page.get(b"Resources")?.as_dict()?;
        match resources.get(b"XObject") {
            Ok(obj) => resolve_dict(doc, obj).cloned().unwrap_or_else(Dictionary::new),
            Err(_) => Dictionary::new(),
        }
    };

    let mut n = 0;
    let name = loop {
        let candidate = format!("{}{}", prefix, n);
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };
    xobjects.set(name.clone(), Object::Reference(xobject_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .get_mut(b"Resources")?
        .as_dict_mut()?
        .set("XObject", Object::Dictionary(xobjects));

    Ok(name)
}

// =============================================================================
// Content Streams
// =============================================================================

/// Collect the content stream references of a page
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;
    let refs = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    };
    Ok(refs)
}

/// Whether the page content was already isolated by a previous append
fn is_wrapped(doc: &Document, refs: &[Object]) -> bool {
    let starts_with = |obj: Option<&Object>, prefix: &[u8], exact: bool| -> bool {
        let Some(Object::Reference(id)) = obj else {
            return false;
        };
        match doc.get_object(*id) {
            Ok(Object::Stream(stream)) => {
                if exact {
                    stream.content == prefix
                } else {
                    stream.content.starts_with(prefix)
                }
            }
            _ => false,
        }
    };
    refs.len() >= 2
        && starts_with(refs.first(), SAVE_STATE, true)
        && refs[1..].iter().any(|r| starts_with(Some(r), RESTORE_STATE, false))
}

/// Append drawing operations to a page.
///
/// The existing content is wrapped in `q … Q` the first time so that graphics state
/// it leaves behind cannot leak into the appended operations.
pub fn append_page_content(doc: &mut Document, page_id: ObjectId, ops: &str) -> Result<()> {
    if ops.is_empty() {
        return Ok(());
    }

    let existing = content_refs(doc, page_id)?;
    let mut contents = Vec::with_capacity(existing.len() + 2);

    if existing.is_empty() {
        let ops_id = doc.add_object(Stream::new(Dictionary::new(), ops.as_bytes().to_vec()));
        contents.push(Object::Reference(ops_id));
    } else if is_wrapped(doc, &existing) {
        contents.extend(existing);
        let ops_id = doc.add_object(Stream::new(Dictionary::new(), ops.as_bytes().to_vec()));
        contents.push(Object::Reference(ops_id));
    } else {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), SAVE_STATE.to_vec()));
        let mut tail = RESTORE_STATE.to_vec();
        tail.extend_from_slice(ops.as_bytes());
        let ops_id = doc.add_object(Stream::new(Dictionary::new(), tail));

        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        contents.push(Object::Reference(ops_id));
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Content stream command drawing an XObject with the given matrix
pub fn draw_xobject_command(name: &str, matrix: [f32; 6]) -> String {
    format!(
        "q {} {} {} {} {} {} cm /{} Do Q\n",
        fmt_num(matrix[0]),
        fmt_num(matrix[1]),
        fmt_num(matrix[2]),
        fmt_num(matrix[3]),
        fmt_num(matrix[4]),
        fmt_num(matrix[5]),
        name
    )
}

//! Document merging
//!
//! Completed documents are concatenated into the first one: every later source is
//! renumbered past the objects already present, its objects are moved over, and its
//! pages are appended to the root page tree in order.

use crate::render::materialize_inherited;
use crate::types::*;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// Merge documents in order. The first document's catalog is kept.
pub fn merge(sources: Vec<Document>) -> Result<Document> {
    let mut sources = sources.into_iter();
    let mut merged = sources.next().ok_or(FormError::NoSources)?;

    let pages_root_id = pages_root(&merged)?;
    for source in sources {
        append_document(&mut merged, pages_root_id, source)?;
    }

    merged.prune_objects();
    log::info!("Merged document has {} page(s)", merged.get_pages().len());
    Ok(merged)
}

/// Load every merge source, failing on the first one that cannot be loaded
pub fn load_merge_sources(paths: &[impl AsRef<Path>]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| merge_source_error(index, path, e.into()))?;
        documents.push(doc);
    }
    Ok(documents)
}

pub(crate) fn merge_source_error(index: usize, path: &Path, source: FormError) -> FormError {
    FormError::MergeSource {
        index,
        path: PathBuf::from(path),
        source: Box::new(source),
    }
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    Ok(doc.catalog()?.get(b"Pages")?.as_reference()?)
}

fn append_document(merged: &mut Document, pages_root_id: ObjectId, mut source: Document) -> Result<()> {
    // Pages are re-parented under the merged root, so they must carry what they inherit
    let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
    for page_id in &source_pages {
        materialize_inherited(&mut source, *page_id)?;
    }

    source.renumber_objects_with(merged.max_id + 1);
    let page_ids: Vec<ObjectId> = source.get_pages().values().copied().collect();

    merged.objects.extend(source.objects);
    merged.max_id = merged.max_id.max(source.max_id);

    {
        let pages_dict = merged.get_object_mut(pages_root_id)?.as_dict_mut()?;
        let count = pages_dict.get(b"Count").and_then(|c| c.as_i64()).unwrap_or(0);
        let kids = pages_dict.get_mut(b"Kids")?.as_array_mut()?;
        kids.extend(page_ids.iter().map(|id| Object::Reference(*id)));
        pages_dict.set("Count", Object::Integer(count + page_ids.len() as i64));
    }

    for page_id in &page_ids {
        merged
            .get_object_mut(*page_id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(pages_root_id));
    }

    Ok(())
}

//! Document I/O operations
//!
//! The engine itself is synchronous. These wrappers move a whole fill, flatten or
//! merge onto tokio's blocking pool and do the file access with `tokio::fs`, so
//! async callers are never blocked by PDF work.

use crate::fill::fill;
use crate::flatten::flatten;
use crate::merge::{merge, merge_source_error};
use crate::types::*;
use lopdf::Document;
use std::path::{Path, PathBuf};

/// Serialise a document to bytes
pub fn document_to_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    let mut writer = Vec::new();
    doc.save_to(&mut writer)?;
    Ok(writer)
}

/// Load a single PDF document
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref().to_owned();
    let bytes = tokio::fs::read(&path).await?;
    let doc = tokio::task::spawn_blocking(move || Document::load_mem(&bytes)).await??;
    Ok(doc)
}

/// Save a document to disk
pub async fn save_pdf(mut doc: Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref().to_owned();
    let bytes = tokio::task::spawn_blocking(move || document_to_bytes(&mut doc)).await??;
    tokio::fs::write(&path, bytes).await?;
    Ok(())
}

/// Fill a template and write the flattened result to `output`.
///
/// Returns the per-field warnings; the bytes are on disk.
pub async fn fill_to_path(
    template: Vec<u8>,
    values: FieldValues,
    output: impl AsRef<Path>,
) -> Result<Vec<FillWarning>> {
    let output = output.as_ref().to_owned();
    let filled = tokio::task::spawn_blocking(move || fill(&template, &values)).await??;
    tokio::fs::write(&output, &filled.bytes).await?;
    Ok(filled.warnings)
}

/// Flatten the document at `input` into `output`. Returns the number of widgets flattened.
pub async fn flatten_to_path(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<usize> {
    let mut doc = load_pdf(input).await?;
    let output = output.as_ref().to_owned();
    let (count, bytes) = tokio::task::spawn_blocking(move || {
        let count = flatten(&mut doc)?;
        Ok::<_, FormError>((count, document_to_bytes(&mut doc)?))
    })
    .await??;
    tokio::fs::write(&output, bytes).await?;
    Ok(count)
}

/// Merge the documents at `inputs` in order and write the result to `output`.
///
/// Any input failing to load aborts the merge before anything is written.
/// Returns the page count of the merged document.
pub async fn merge_files(inputs: &[impl AsRef<Path>], output: impl AsRef<Path>) -> Result<usize> {
    if inputs.is_empty() {
        return Err(FormError::NoSources);
    }

    let mut sources = Vec::with_capacity(inputs.len());
    for (index, path) in inputs.iter().enumerate() {
        let path: PathBuf = path.as_ref().to_owned();
        let doc = load_pdf(&path)
            .await
            .map_err(|e| merge_source_error(index, &path, e))?;
        sources.push(doc);
    }

    let output = output.as_ref().to_owned();
    let (pages, bytes) = tokio::task::spawn_blocking(move || {
        let mut merged = merge(sources)?;
        let pages = merged.get_pages().len();
        Ok::<_, FormError>((pages, document_to_bytes(&mut merged)?))
    })
    .await??;
    tokio::fs::write(&output, bytes).await?;
    Ok(pages)
}

mod common;

use lopdf::Document;
use pdf_forms::*;
use tempfile::TempDir;

fn page_markers(doc: &Document) -> Vec<String> {
    (1..=doc.get_pages().len() as u32)
        .map(|n| common::page_content(doc, n).trim().to_string())
        .collect()
}

#[test]
fn test_merge_appends_pages_in_order() {
    let a = common::create_test_pdf(2, "A");
    let b = common::create_test_pdf(3, "B");

    let merged = merge(vec![a, b]).unwrap();

    assert_eq!(merged.get_pages().len(), 5);
    assert_eq!(
        page_markers(&merged),
        vec!["% A0", "% A1", "% B0", "% B1", "% B2"]
    );
}

#[test]
fn test_merge_single_source() {
    let merged = merge(vec![common::create_test_pdf(4, "ONLY")]).unwrap();
    assert_eq!(merged.get_pages().len(), 4);
}

#[test]
fn test_merge_no_sources() {
    assert!(matches!(merge(Vec::new()), Err(FormError::NoSources)));
}

#[test]
fn test_merge_keeps_inherited_page_attributes() {
    let a = common::create_test_pdf(1, "A");
    let b = common::create_inheriting_pdf(2, "B");

    let mut merged = merge(vec![a, b]).unwrap();
    let bytes = common::to_bytes(&mut merged);
    let merged = Document::load_mem(&bytes).unwrap();

    let pages = merged.get_pages();
    for number in [2, 3] {
        let page = merged.get_dictionary(pages[&number]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 300);
        assert_eq!(media_box[3].as_i64().unwrap(), 400);
        assert!(page.has(b"Resources"));
    }
    let first = merged.get_dictionary(pages[&1]).unwrap();
    assert_eq!(
        first.get(b"MediaBox").unwrap().as_array().unwrap()[3].as_i64().unwrap(),
        792
    );
}

#[test]
fn test_merge_filled_documents() {
    let first = fill(
        &common::job_card_bytes(),
        &FieldValues::new().with("title", "First job"),
    )
    .unwrap();
    let second = fill(
        &common::job_card_bytes(),
        &FieldValues::new().with("title", "Second job"),
    )
    .unwrap();

    let sources = vec![
        Document::load_mem(&first.bytes).unwrap(),
        Document::load_mem(&second.bytes).unwrap(),
    ];
    let mut merged = merge(sources).unwrap();
    let merged = Document::load_mem(&common::to_bytes(&mut merged)).unwrap();

    assert_eq!(merged.get_pages().len(), 2);
    assert!(common::page_draws(&merged, 1, "(First job) Tj"));
    assert!(common::page_draws(&merged, 2, "(Second job) Tj"));
}

#[test]
fn test_load_merge_sources_reports_failing_index() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.pdf");
    let bad = dir.path().join("bad.pdf");
    common::write_pdf(&mut common::create_test_pdf(1, "G"), &good);
    std::fs::write(&bad, b"garbage").unwrap();

    let err = load_merge_sources(&[&good, &good, &bad]).unwrap_err();
    match err {
        FormError::MergeSource { index, path, .. } => {
            assert_eq!(index, 2);
            assert_eq!(path, bad);
        }
        other => panic!("unexpected error: {}", other),
    }

    let loaded = load_merge_sources(&[&good, &good]).unwrap();
    assert_eq!(merge(loaded).unwrap().get_pages().len(), 2);
}

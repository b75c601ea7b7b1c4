//! Integration tests for editor crate

use anyhow::Result;
use redline_editor::{
    Document, DocumentStorage, EditMode, EditorError, ErrorKind, Package, RevisionContext, RevisionKind,
    COMMENTS_PART,
};
use tempfile::TempDir;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn body(paragraphs: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{paragraphs}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    )
}

fn memory(paragraphs: &str) -> Document {
    Document::from_xml("memory.docx", &body(paragraphs), "Editor").unwrap()
}

const HELLO_WORLD: &str = r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:ins w:id="5" w:author="Ann" w:date="2024-05-01T09:00:00Z"><w:r><w:t>world</w:t></w:r></w:ins></w:p>"#;

#[test]
fn test_find_reports_mixed_segments() {
    let doc = memory(HELLO_WORLD);
    let found = doc.find("Hello world", 1).unwrap();

    assert_eq!(found.paragraph_index, 0);
    assert_eq!((found.start, found.end), (0, 11));
    let contexts: Vec<_> = found.segments.iter().map(|s| s.context).collect();
    assert_eq!(contexts, vec![RevisionContext::Regular, RevisionContext::Insertion]);
    assert_eq!(found.segments[1].revision_id, Some(5));
}

#[test]
fn test_atomic_replace_across_insertion() {
    let mut doc = memory(HELLO_WORLD);
    let changes = doc.replace("Hello world", "Hi there", 1, EditMode::Atomic).unwrap();

    assert_eq!(changes.deletions, vec![6]);
    assert_eq!(changes.insertion, Some(7));
    assert_eq!(changes.retracted, 1);
    assert_eq!(doc.get_visible_text(), "Hi there");

    let revisions = doc.list_revisions(None);
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].kind, RevisionKind::Deletion);
    assert_eq!(revisions[0].text, "Hello ");
    assert_eq!(revisions[0].author, "Editor");
    assert_eq!(revisions[1].kind, RevisionKind::Insertion);
    assert_eq!(revisions[1].text, "Hi there");
    assert!(revisions.iter().all(|r| r.id != 5));
    assert_eq!(doc.count("world").unwrap(), 0);
}

#[test]
fn test_strict_replace_is_refused_unchanged() {
    let mut doc = memory(HELLO_WORLD);
    let before = doc.tree().to_xml_string();

    let err = doc.replace("Hello world", "Hi there", 1, EditMode::Strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BoundaryConflict);
    assert!(err.kind().is_recoverable());
    assert!(err.to_string().contains('5'));

    assert_eq!(doc.tree().to_xml_string(), before);
    assert!(!doc.is_dirty());

    // A regular-only match is fine in strict mode
    doc.replace("Hello", "Howdy", 1, EditMode::Strict).unwrap();
    assert_eq!(doc.get_visible_text(), "Howdy world");
}

#[test]
fn test_deleted_text_is_invisible() {
    let doc = memory(
        r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:del w:id="1" w:author="Ann"><w:r><w:delText xml:space="preserve">old </w:delText></w:r></w:del><w:r><w:t>world</w:t></w:r></w:p>"#,
    );
    assert_eq!(doc.get_visible_text(), "Hello world");
    assert_eq!(doc.count("old").unwrap(), 0);
    assert_eq!(doc.find("Hello world", 1).unwrap().segments.len(), 2);
}

#[test]
fn test_replace_inside_split_text_elements() {
    let mut doc = memory(r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>AB</w:t><w:t>CD</w:t></w:r></w:p>"#);
    doc.replace("BC", "xx", 1, EditMode::Atomic).unwrap();
    assert_eq!(doc.get_visible_text(), "AxxD");

    doc.reject_all(None);
    assert_eq!(doc.get_visible_text(), "ABCD");
    assert!(doc.list_revisions(None).is_empty());
}

#[test]
fn test_insert_inside_insertion_splits_wrapper() {
    let mut doc = memory(r#"<w:p><w:ins w:id="3" w:author="Ann"><w:r><w:t>abcd</w:t></w:r></w:ins></w:p>"#);
    let changes = doc.insert_after("ab", "XY", 1).unwrap();
    assert_eq!(changes.insertion, Some(4));
    assert_eq!(doc.get_visible_text(), "abXYcd");

    let texts: Vec<_> = doc.list_revisions(None).into_iter().map(|r| (r.id, r.text)).collect();
    assert_eq!(
        texts,
        vec![(3, "ab".to_string()), (4, "XY".to_string()), (5, "cd".to_string())]
    );
}

#[test]
fn test_edits_inside_linked_insertion_stay_in_place() {
    let linked = r#"<w:p><w:ins w:id="1" w:author="Ann"><w:hyperlink><w:r><w:t>abcdef</w:t></w:r></w:hyperlink></w:ins></w:p>"#;

    let mut doc = memory(linked);
    doc.replace("cd", "X", 1, EditMode::Atomic).unwrap();
    assert_eq!(doc.get_visible_text(), "abXef");

    let mut doc = memory(linked);
    doc.insert_after("ab", "X", 1).unwrap();
    doc.insert_before("ef", "Y", 1).unwrap();
    assert_eq!(doc.get_visible_text(), "abXcdYef");

    doc.reject_all(None);
    assert_eq!(doc.get_visible_text(), "");
}

#[test]
fn test_occurrence_and_input_errors() {
    let mut doc = memory(r#"<w:p><w:r><w:t>one two one</w:t></w:r></w:p>"#);

    let err = doc.delete("one", 3, EditMode::Atomic).unwrap_err();
    assert!(matches!(err, EditorError::TextNotFound { found: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(doc.find("one", 0).unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(doc.insert_before("", "x", 1).unwrap_err().kind(), ErrorKind::InvalidInput);

    doc.delete("one", 2, EditMode::Atomic).unwrap();
    assert_eq!(doc.get_visible_text(), "one two ");
}

#[test]
fn test_accept_all_is_idempotent() {
    let mut doc = memory(HELLO_WORLD);
    assert_eq!(doc.accept_all(None).len(), 1);
    assert_eq!(doc.version, 1);
    assert_eq!(doc.get_visible_text(), "Hello world");

    let version = doc.version;
    assert!(doc.accept_all(None).is_empty());
    assert_eq!(doc.version, version);
}

#[test]
fn test_round_trip_through_disk() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("round.docx");

    let mut doc = memory(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>a b</w:t></w:r></w:p><w:p><w:r><w:t>tail &amp; more</w:t></w:r></w:p>"#,
    );
    doc.save_as(&path)?;
    assert_eq!(doc.storage(), DocumentStorage::File);
    assert!(!doc.is_dirty());

    let reopened = Document::open(&path, "Editor")?;
    assert_eq!(reopened.get_visible_text(), doc.get_visible_text());
    assert_eq!(reopened.tree().to_xml_string(), doc.tree().to_xml_string());
    Ok(())
}

#[test]
fn test_edits_survive_save_and_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("edits.docx");

    let mut doc = memory(r#"<w:p><w:r><w:t>a b</w:t></w:r></w:p>"#);
    doc.save_as(&path)?;

    let mut doc = Document::open(&path, "Editor")?;
    doc.replace("b", "  yy  ", 1, EditMode::Atomic)?;
    assert!(doc.is_dirty());
    doc.save()?;
    assert!(!doc.is_dirty());

    let mut reopened = Document::open(&path, "Editor")?;
    assert_eq!(reopened.get_visible_text(), "a   yy  ");
    assert_eq!(reopened.list_revisions(Some("Editor")).len(), 2);

    reopened.accept_all(None);
    assert_eq!(reopened.get_visible_text(), "a   yy  ");
    assert!(reopened.list_revisions(None).is_empty());
    Ok(())
}

#[test]
fn test_comments_persist() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("comments.docx");

    let mut doc = memory(r#"<w:p><w:r><w:t>Payment within thirty days.</w:t></w:r></w:p>"#);
    let id = doc.add_comment("thirty days", "Too short?", 1)?;
    doc.reply_to_comment(id, "Agreed")?;
    doc.save_as(&path)?;

    let package = Package::read(&path)?;
    assert!(package.contains(COMMENTS_PART));
    let content_types = String::from_utf8(package.get("[Content_Types].xml").unwrap_or_default().to_vec())?;
    assert!(content_types.contains("/word/comments.xml"));

    let mut reopened = Document::open(&path, "Other")?;
    assert_eq!(reopened.get_visible_text(), "Payment within thirty days.");
    let comments = reopened.list_comments(None);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "Too short?");
    assert_eq!(comments[0].author, "Editor");
    assert_eq!(comments[0].anchor_text.as_deref(), Some("thirty days"));
    assert_eq!(comments[0].replies.len(), 1);
    assert_eq!(comments[0].replies[0].text, "Agreed");

    reopened.resolve_comment(id)?;
    reopened.save()?;
    let resolved = Document::open(&path, "Other")?.list_comments(Some("Editor"));
    assert!(resolved[0].resolved);
    Ok(())
}

#[test]
fn test_comment_over_insertion_survives_reject() {
    let mut doc = memory(HELLO_WORLD);
    let id = doc.add_comment("lo wor", "Check this", 1).unwrap();
    doc.reject_all(None);
    assert_eq!(doc.get_visible_text(), "Hello ");

    let xml = doc.tree().to_xml_string();
    for name in ["w:commentRangeStart", "w:commentRangeEnd", "w:commentReference"] {
        assert_eq!(xml.matches(&format!(r#"<{name} w:id="{id}"/>"#)).count(), 1, "{name}");
    }
    let comments = doc.list_comments(None);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].anchor_text.as_deref(), Some("lo "));

    doc.delete_comment(id).unwrap();
    assert!(!doc.tree().to_xml_string().contains("w:comment"));
}

#[test]
fn test_missing_body_part_is_io_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.docx");
    std::fs::write(&path, b"not a zip")?;

    let err = Document::open(&path, "Editor").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    Ok(())
}

//! # Revision Ledger
//!
//! Enumerates tracked insertions and deletions and folds them back into the
//! body.
//!
//! | | accept | reject |
//! |---|---|---|
//! | insertion | unwrap, keep content | drop wrapper and content |
//! | deletion  | drop wrapper and content | unwrap, restore `w:delText` to `w:t` |
//!
//! Bulk operations walk wrappers in reverse document order, so every path
//! computed up front stays valid while later wrappers are rewritten.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use redline_common::{walk_children, Visitor, Walk};
use redline_parser::{NodePath, XmlElement, XmlNode};
use serde::{Deserialize, Serialize};

use crate::errors::{EditorError, EditorResult};
use crate::tree::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Insertion,
    Deletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accept,
    Reject,
}

/// A pending tracked change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: u32,
    pub kind: RevisionKind,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
}

/// Parse a `w:date` value; Word sometimes omits the zone suffix
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

struct WrapperCollector {
    found: Vec<(NodePath, RevisionKind)>,
}

impl Visitor for WrapperCollector {
    fn enter_element(&mut self, element: &XmlElement, path: &[usize]) -> Walk {
        if is_properties(element) {
            return Walk::Skip;
        }
        let kind = if is_insertion_wrapper(element) {
            Some(RevisionKind::Insertion)
        } else if is_deletion_wrapper(element) {
            Some(RevisionKind::Deletion)
        } else {
            None
        };
        if let Some(kind) = kind {
            if element_id(element).is_some() {
                self.found.push((path.to_vec(), kind));
            }
        }
        Walk::Descend
    }
}

/// Content wrappers in document order, with paths from the root
fn wrappers(tree: &DocumentTree) -> Vec<(NodePath, RevisionKind)> {
    let mut collector = WrapperCollector { found: Vec::new() };
    walk_children(&mut collector, tree.root());
    collector.found
}

fn describe(element: &XmlElement, kind: RevisionKind) -> Revision {
    let mut text = String::new();
    collect_text(element, &mut text);
    Revision {
        id: element_id(element).unwrap_or_default(),
        kind,
        author: element.attr(ATTR_AUTHOR).unwrap_or_default().to_string(),
        date: element.attr(ATTR_DATE).and_then(parse_date),
        text,
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in element.elements() {
        if child.is(W_T) || child.is(W_DEL_TEXT) {
            out.push_str(&child.text());
        } else if !is_properties(child) {
            collect_text(child, out);
        }
    }
}

/// Every revision in document order, optionally restricted to one author
pub fn list_revisions(tree: &DocumentTree, author: Option<&str>) -> Vec<Revision> {
    wrappers(tree)
        .into_iter()
        .filter_map(|(path, kind)| tree.root().get(&path).map(|element| describe(element, kind)))
        .filter(|revision| author.map_or(true, |author| revision.author == author))
        .collect()
}

/// Accept or reject every wrapper carrying `id`
pub fn resolve_revision(tree: &mut DocumentTree, id: u32, resolution: Resolution) -> EditorResult<Revision> {
    let targets: Vec<_> = wrappers(tree)
        .into_iter()
        .filter(|(path, _)| tree.root().get(path).and_then(element_id) == Some(id))
        .collect();

    let Some((first_path, first_kind)) = targets.first() else {
        return Err(EditorError::RevisionNotFound(id));
    };
    let revision = tree
        .root()
        .get(first_path)
        .map(|element| describe(element, *first_kind))
        .ok_or(EditorError::RevisionNotFound(id))?;

    for (path, kind) in targets.iter().rev() {
        apply(tree.root_mut(), path, *kind, resolution);
    }
    tracing::debug!(id, kind = ?revision.kind, ?resolution, "resolved revision");
    Ok(revision)
}

/// Accept or reject all revisions, optionally by one author only.
/// Returns what was resolved, in document order.
pub fn resolve_all(tree: &mut DocumentTree, author: Option<&str>, resolution: Resolution) -> Vec<Revision> {
    let mut selected = Vec::new();
    for (path, kind) in wrappers(tree) {
        let Some(element) = tree.root().get(&path) else {
            continue;
        };
        let revision = describe(element, kind);
        if author.map_or(true, |author| revision.author == author) {
            selected.push((path, revision));
        }
    }

    for (path, revision) in selected.iter().rev() {
        apply(tree.root_mut(), path, revision.kind, resolution);
    }
    selected.into_iter().map(|(_, revision)| revision).collect()
}

fn apply(root: &mut XmlElement, path: &[usize], kind: RevisionKind, resolution: Resolution) {
    let Some((parent_path, index)) = split_last(path) else {
        return;
    };
    let Some(parent) = root.get_mut(parent_path) else {
        return;
    };
    if !matches!(parent.children.get(index), Some(XmlNode::Element(_))) {
        return;
    }

    let keep_content = matches!(
        (kind, resolution),
        (RevisionKind::Insertion, Resolution::Accept) | (RevisionKind::Deletion, Resolution::Reject)
    );
    let XmlNode::Element(mut wrapper) = parent.children.remove(index) else {
        return;
    };
    if keep_content {
        if kind == RevisionKind::Deletion {
            restore_deleted(&mut wrapper);
        }
        parent.children.splice(index..index, wrapper.children);
    } else {
        let mut markers = Vec::new();
        collect_comment_markers(&wrapper, &mut markers);
        parent.children.splice(index..index, markers);
    }
}

/// Comment anchors inside content about to be dropped. Range markers are
/// kept as is; reference runs are reduced to their properties and the
/// reference itself.
fn collect_comment_markers(element: &XmlElement, out: &mut Vec<XmlNode>) {
    for child in element.elements() {
        if child.is(W_COMMENT_RANGE_START) || child.is(W_COMMENT_RANGE_END) {
            out.push(child.clone().into());
        } else if child.is(W_R) && child.child(W_COMMENT_REFERENCE).is_some() {
            let mut run = shell(child);
            run.children.extend(
                child
                    .elements()
                    .filter(|part| part.is(W_RPR) || part.is(W_COMMENT_REFERENCE))
                    .cloned()
                    .map(XmlNode::Element),
            );
            out.push(run.into());
        } else if !is_properties(child) {
            collect_comment_markers(child, out);
        }
    }
}

/// Turn deleted-text markup back into live text
fn restore_deleted(element: &mut XmlElement) {
    for child in element.children.iter_mut().filter_map(XmlNode::as_element_mut) {
        if child.is(W_DEL_TEXT) {
            child.name = W_T.to_string();
        } else if child.is(W_DEL_INSTR_TEXT) {
            child.name = W_INSTR_TEXT.to_string();
        } else {
            if child.is(W_R) {
                if let Some(rsid) = child.remove_attr("w:rsidDel") {
                    child.set_attr("w:rsidR", rsid);
                }
            }
            if !is_properties(child) {
                restore_deleted(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_map::TextMap;

    const PARAGRAPH: &str = r#"<w:p><w:r><w:t xml:space="preserve">Keep </w:t></w:r><w:ins w:id="1" w:author="Ann" w:date="2024-03-01T10:00:00Z"><w:r><w:t>added </w:t></w:r></w:ins><w:del w:id="2" w:author="Bob" w:date="2024-03-02T10:00:00"><w:r w:rsidDel="00AB"><w:delText>removed </w:delText></w:r></w:del><w:r><w:rPr><w:ins w:id="3" w:author="Ann"/></w:rPr><w:t>end</w:t></w:r></w:p>"#;

    fn tree() -> DocumentTree {
        let xml = format!(r#"<w:document xmlns:w="urn:w"><w:body>{}</w:body></w:document>"#, PARAGRAPH);
        DocumentTree::parse("word/document.xml", xml.as_bytes()).unwrap()
    }

    fn visible(tree: &DocumentTree) -> String {
        let path = &tree.paragraph_paths()[0];
        TextMap::build(tree.paragraph(path).unwrap()).text().to_string()
    }

    #[test]
    fn test_list_in_document_order() {
        let revisions = list_revisions(&tree(), None);
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].id, 1);
        assert_eq!(revisions[0].kind, RevisionKind::Insertion);
        assert_eq!(revisions[0].text, "added ");
        assert_eq!(revisions[1].kind, RevisionKind::Deletion);
        assert_eq!(revisions[1].text, "removed ");
        assert!(revisions[1].date.is_some());

        let bob = list_revisions(&tree(), Some("Bob"));
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].id, 2);
    }

    #[test]
    fn test_accept_and_reject_single() {
        let mut tree = tree();
        let accepted = resolve_revision(&mut tree, 1, Resolution::Accept).unwrap();
        assert_eq!(accepted.kind, RevisionKind::Insertion);
        assert_eq!(visible(&tree), "Keep added end");

        resolve_revision(&mut tree, 2, Resolution::Reject).unwrap();
        assert_eq!(visible(&tree), "Keep added removed end");
        assert!(tree.root().find_paths(|e| e.is(W_DEL_TEXT)).is_empty());
        let restored = tree.root().find_paths(|e| e.attr("w:rsidR") == Some("00AB"));
        assert_eq!(restored.len(), 1);
        assert!(list_revisions(&tree, None).is_empty());
    }

    #[test]
    fn test_reject_insertion_and_accept_deletion() {
        let mut tree = tree();
        resolve_revision(&mut tree, 1, Resolution::Reject).unwrap();
        resolve_revision(&mut tree, 2, Resolution::Accept).unwrap();
        assert_eq!(visible(&tree), "Keep end");
    }

    #[test]
    fn test_dropped_content_keeps_comment_markers() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:body><w:p><w:commentRangeStart w:id="0"/><w:r><w:t>a</w:t></w:r><w:ins w:id="1" w:author="Ann"><w:r><w:t>b</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id="0"/></w:r></w:ins></w:p></w:body></w:document>"#;
        let mut tree = DocumentTree::parse("word/document.xml", xml.as_bytes()).unwrap();
        resolve_revision(&mut tree, 1, Resolution::Reject).unwrap();

        assert_eq!(visible(&tree), "a");
        let paragraph = tree.paragraph(&tree.paragraph_paths()[0]).unwrap();
        let names: Vec<_> = paragraph.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![W_COMMENT_RANGE_START, W_R, W_COMMENT_RANGE_END, W_R]);
        let reference = paragraph.get(&[3]).unwrap();
        assert!(reference.child(W_COMMENT_REFERENCE).is_some());
        assert!(reference.child(W_RPR).is_some());
    }

    #[test]
    fn test_unknown_id_and_property_markers() {
        let mut tree = tree();
        let err = resolve_revision(&mut tree, 3, Resolution::Accept).unwrap_err();
        assert!(matches!(err, EditorError::RevisionNotFound(3)));
        assert_eq!(tree.root().find_paths(|e| e.is(W_INS)).len(), 2);
    }

    #[test]
    fn test_bulk_by_author() {
        let mut tree = tree();
        let done = resolve_all(&mut tree, Some("Ann"), Resolution::Accept);
        assert_eq!(done.len(), 1);
        assert_eq!(list_revisions(&tree, None).len(), 1);

        let rest = resolve_all(&mut tree, None, Resolution::Reject);
        assert_eq!(rest.len(), 1);
        assert_eq!(visible(&tree), "Keep added removed end");
        assert!(resolve_all(&mut tree, None, Resolution::Reject).is_empty());
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("2024-03-01T10:00:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}

//! # Boundary-Aware Mutations
//!
//! Turns a resolved [`Match`] into tracked-change markup.
//!
//! ## Segment strategies
//!
//! | Segment context | Action |
//! |---|---|
//! | regular   | split the run, wrap the matched piece in a new `w:del` |
//! | insertion | split the enclosing `w:ins`, drop the matched piece (retraction) |
//! | deletion  | never produced by the matcher; reported as an invariant violation |
//!
//! Replacement text is placed in a new `w:ins` right after the last segment's
//! former location. Segments are processed right to left so paths computed
//! for earlier segments stay valid while later ones are rewritten.
//!
//! The mutator works on a paragraph the caller owns. Callers hand it a clone
//! and swap the result in on success, so a failed call leaves the document
//! exactly as it was.

use chrono::{DateTime, Utc};
use redline_common::ErrorKind;
use redline_parser::{NodePath, XmlElement, XmlNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id_generator::RevisionIds;
use crate::matcher::{Match, SplitPoint};
use crate::text_map::RevisionContext;
use crate::tree::*;

/// Policy for matches that touch existing revisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Decompose the edit across revision boundaries
    #[default]
    Atomic,
    /// Refuse any match that is not plain text
    Strict,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Match spans {context:?} revision {revision_id:?}; refused in strict mode")]
    BoundaryConflict {
        revision_id: Option<u32>,
        context: RevisionContext,
    },

    #[error("Structural invariant violated: {0}")]
    InvariantViolation(String),
}

impl MutationError {
    fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MutationError::BoundaryConflict { .. } => ErrorKind::BoundaryConflict,
            MutationError::InvariantViolation(_) => ErrorKind::StructuralInvariantViolation,
        }
    }
}

/// Revisions created by one edit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Ids of new `w:del` wrappers, in document order
    pub deletions: Vec<u32>,
    /// Id of the new `w:ins` wrapper
    pub insertion: Option<u32>,
    /// Number of pending-insertion pieces removed outright
    pub retracted: usize,
}

impl ChangeSet {
    /// Identifier reported to callers: the insertion, else the first deletion
    pub fn change_id(&self) -> Option<u32> {
        self.insertion.or_else(|| self.deletions.first().copied())
    }
}

/// Author and timestamp stamped on new wrappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionStamp {
    pub author: String,
    pub date: String,
}

impl RevisionStamp {
    pub fn now(author: &str) -> Self {
        Self {
            author: author.to_string(),
            date: format_date(Utc::now()),
        }
    }
}

/// `w:date` format: ISO-8601 UTC, second precision
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// A gap in some container's child list, relative to the paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InsertionPoint {
    pub container: NodePath,
    pub index: usize,
}

/// A run cut into the pieces around `[start, end)` of one of its texts
pub(crate) struct RunSplit {
    pub before: Option<XmlElement>,
    pub matched: XmlElement,
    pub after: Option<XmlElement>,
}

struct Cut {
    matched: XmlElement,
    point: InsertionPoint,
}

pub struct Mutator<'a> {
    stamp: &'a RevisionStamp,
    ids: &'a mut RevisionIds,
}

impl<'a> Mutator<'a> {
    pub fn new(stamp: &'a RevisionStamp, ids: &'a mut RevisionIds) -> Self {
        Self { stamp, ids }
    }

    /// Validate a match against the edit mode before touching anything
    pub fn check_mode(found: &Match, mode: EditMode) -> Result<(), MutationError> {
        if mode == EditMode::Strict {
            if let Some(segment) = found.spanned_revision() {
                return Err(MutationError::BoundaryConflict {
                    revision_id: segment.revision_id,
                    context: segment.context,
                });
            }
        }
        Ok(())
    }

    /// Delete the matched text and, if given, insert `replacement` in its place
    pub fn replace(
        &mut self,
        paragraph: &mut XmlElement,
        found: &Match,
        replacement: Option<&str>,
    ) -> Result<ChangeSet, MutationError> {
        let Some(first) = found.segments.first() else {
            return Err(MutationError::invariant("match has no segments"));
        };
        if let Some(segment) = found
            .segments
            .iter()
            .find(|segment| segment.context == RevisionContext::Deletion)
        {
            return Err(MutationError::invariant(format!(
                "deleted text {:?} reached the mutator",
                segment.text
            )));
        }

        let props = run_properties(paragraph, &first.node);
        let replacement = replacement.filter(|text| !text.is_empty());

        // Ids ascend in document order: deletions left to right, then the insertion
        let deletion_ids: Vec<Option<u32>> = found
            .segments
            .iter()
            .map(|segment| (segment.context == RevisionContext::Regular).then(|| self.ids.next_id()))
            .collect();
        let insertion_id = replacement.map(|_| self.ids.next_id());

        let mut changes = ChangeSet {
            deletions: deletion_ids.iter().flatten().copied().collect(),
            insertion: insertion_id,
            retracted: 0,
        };

        let last = found.segments.len() - 1;
        for (index, segment) in found.segments.iter().enumerate().rev() {
            let wrapper = segment.wrapper.as_deref();
            let point = match (segment.context, deletion_ids[index]) {
                (RevisionContext::Regular, Some(id)) => {
                    tracing::debug!(segment = index, id, text = %segment.text, "wrapping regular text in deletion");
                    let cut = self.cut(paragraph, &segment.node, segment.node_start, segment.node_end, None)?;
                    let deletion = self.deletion_wrapper(id, cut.matched);
                    place(paragraph, &cut.point, deletion)?;
                    InsertionPoint {
                        container: cut.point.container,
                        index: cut.point.index + 1,
                    }
                }
                (RevisionContext::Insertion, _) => {
                    tracing::debug!(
                        segment = index,
                        revision = ?segment.revision_id,
                        text = %segment.text,
                        "retracting pending insertion"
                    );
                    let cut = self.cut(paragraph, &segment.node, segment.node_start, segment.node_end, wrapper)?;
                    changes.retracted += 1;
                    cut.point
                }
                (context, _) => {
                    return Err(MutationError::invariant(format!(
                        "no strategy for {:?} segment {:?}",
                        context, segment.text
                    )))
                }
            };

            if index == last {
                if let (Some(id), Some(text)) = (insertion_id, replacement) {
                    tracing::debug!(id, container = ?point.container, index = point.index, "placing insertion");
                    let insertion = self.insertion_wrapper(id, props.clone(), text);
                    place(paragraph, &point, insertion)?;
                }
            }
        }

        Ok(changes)
    }

    /// Insert `text` as a new insertion at a zero-width point
    pub fn insert_at(
        &mut self,
        paragraph: &mut XmlElement,
        point: &SplitPoint,
        text: &str,
    ) -> Result<ChangeSet, MutationError> {
        if point.context == RevisionContext::Deletion {
            return Err(MutationError::invariant("insertion point inside deleted text"));
        }

        let props = run_properties(paragraph, &point.node);
        let id = self.ids.next_id();
        let cut = self.cut(
            paragraph,
            &point.node,
            point.offset,
            point.offset,
            point.wrapper.as_deref(),
        )?;
        tracing::debug!(id, container = ?cut.point.container, index = cut.point.index, "placing insertion");
        place(paragraph, &cut.point, self.insertion_wrapper(id, props, text))?;

        Ok(ChangeSet {
            deletions: Vec::new(),
            insertion: Some(id),
            retracted: 0,
        })
    }

    /// Remove `[start, end)` of the text node at `node` from the tree.
    ///
    /// With no `wrapper` the run is split in place. Inside an insertion the
    /// enclosing wrapper, and every container between it and the run, is
    /// split around the removed piece instead. The returned point sits
    /// between the two wrapper halves at the wrapper's level.
    fn cut(
        &mut self,
        paragraph: &mut XmlElement,
        node: &[usize],
        start: usize,
        end: usize,
        wrapper: Option<&[usize]>,
    ) -> Result<Cut, MutationError> {
        let Some(wrapper_path) = wrapper else {
            return cut_plain(paragraph, node, start, end);
        };

        let (run_path, text_index) = split_last(node).ok_or_else(|| MutationError::invariant("empty node path"))?;
        let inner = run_path
            .strip_prefix(wrapper_path)
            .filter(|inner| !inner.is_empty())
            .ok_or_else(|| MutationError::invariant(format!("run {:?} outside wrapper {:?}", run_path, wrapper_path)))?;
        let (wrapper_parent, wrapper_index) =
            split_last(wrapper_path).ok_or_else(|| MutationError::invariant("empty wrapper path"))?;

        let RunSplit { before, matched, after } = split_run(run_at(paragraph, run_path)?, text_index, start, end)?;
        let (head, mut tail) = split_around(element_at(paragraph, wrapper_path)?, inner, before, after)?;

        let keep_head = has_content(&head);
        let keep_tail = has_content(&tail);
        if keep_head && keep_tail {
            tail.set_attr(ATTR_ID, self.ids.next_id().to_string());
        }

        let mut pieces = Vec::with_capacity(2);
        if keep_head {
            pieces.push(head);
        }
        let index = wrapper_index + pieces.len();
        if keep_tail {
            pieces.push(tail);
        }
        element_at(paragraph, wrapper_parent)?.splice_elements(wrapper_index, pieces);

        Ok(Cut {
            matched,
            point: InsertionPoint {
                container: wrapper_parent.to_vec(),
                index,
            },
        })
    }

    fn deletion_wrapper(&self, id: u32, run: XmlElement) -> XmlElement {
        XmlElement::new(W_DEL)
            .with_attr(ATTR_ID, id.to_string())
            .with_attr(ATTR_AUTHOR, self.stamp.author.as_str())
            .with_attr(ATTR_DATE, self.stamp.date.as_str())
            .with_child(into_deleted_run(run))
    }

    fn insertion_wrapper(&self, id: u32, props: Option<XmlElement>, text: &str) -> XmlElement {
        let mut run = XmlElement::new(W_R);
        if let Some(props) = props {
            run.children.push(props.into());
        }
        run.children.push(text_element(W_T, text).into());

        XmlElement::new(W_INS)
            .with_attr(ATTR_ID, id.to_string())
            .with_attr(ATTR_AUTHOR, self.stamp.author.as_str())
            .with_attr(ATTR_DATE, self.stamp.date.as_str())
            .with_child(run)
    }
}

/// Split the run holding `node` at a character offset, outside any wrapper
/// bookkeeping. Returns the gap between the two halves.
pub(crate) fn split_run_at(
    paragraph: &mut XmlElement,
    node: &[usize],
    offset: usize,
) -> Result<InsertionPoint, MutationError> {
    cut_plain(paragraph, node, offset, offset).map(|cut| cut.point)
}

fn cut_plain(paragraph: &mut XmlElement, node: &[usize], start: usize, end: usize) -> Result<Cut, MutationError> {
    let (run_path, text_index) = split_last(node).ok_or_else(|| MutationError::invariant("empty node path"))?;
    let (run_parent, run_index) =
        split_last(run_path).ok_or_else(|| MutationError::invariant("text node outside a run"))?;
    let RunSplit { before, matched, after } = split_run(run_at(paragraph, run_path)?, text_index, start, end)?;

    let mut pieces = Vec::with_capacity(2);
    pieces.extend(before);
    let index = run_index + pieces.len();
    pieces.extend(after);
    element_at(paragraph, run_parent)?.splice_elements(run_index, pieces);

    Ok(Cut {
        matched,
        point: InsertionPoint {
            container: run_parent.to_vec(),
            index,
        },
    })
}

/// Split `container` into head and tail copies around the descendant at
/// `path`, which is replaced by `before` in the head and `after` in the tail.
/// Intermediate containers left empty are dropped from their half.
fn split_around(
    container: &XmlElement,
    path: &[usize],
    before: Option<XmlElement>,
    after: Option<XmlElement>,
) -> Result<(XmlElement, XmlElement), MutationError> {
    let (&index, rest) = path
        .split_first()
        .ok_or_else(|| MutationError::invariant("empty path below wrapper"))?;
    if index >= container.children.len() {
        return Err(MutationError::invariant(format!("no child {} in {}", index, container.name)));
    }

    let (before, after) = if rest.is_empty() {
        (before, after)
    } else {
        let child = container.children[index]
            .as_element()
            .ok_or_else(|| MutationError::invariant(format!("child {} of {} is not an element", index, container.name)))?;
        let (head, tail) = split_around(child, rest, before, after)?;
        (has_content(&head).then_some(head), has_content(&tail).then_some(tail))
    };

    let mut head = shell(container);
    head.children.extend(container.children[..index].iter().cloned());
    head.children.extend(before.map(XmlNode::Element));

    let mut tail = shell(container);
    tail.children.extend(after.map(XmlNode::Element));
    tail.children.extend(container.children[index + 1..].iter().cloned());

    Ok((head, tail))
}

/// Split `run` around characters `[start, end)` of its child text at
/// `text_index`. Formatting is copied onto every piece; pieces left with
/// nothing but formatting are dropped.
pub(crate) fn split_run(
    run: &XmlElement,
    text_index: usize,
    start: usize,
    end: usize,
) -> Result<RunSplit, MutationError> {
    let text = run
        .children
        .get(text_index)
        .and_then(XmlNode::as_element)
        .filter(|element| element.is(W_T))
        .ok_or_else(|| MutationError::invariant(format!("run child {} is not a text element", text_index)))?;

    let chars: Vec<char> = text.text().chars().collect();
    if start > end || end > chars.len() {
        return Err(MutationError::invariant(format!(
            "range {}..{} outside text of length {}",
            start,
            end,
            chars.len()
        )));
    }

    let piece = |range: &[char]| -> XmlNode {
        let mut element = shell(text);
        element.set_attr(XML_SPACE, "preserve");
        element.children.push(XmlNode::Text(range.iter().collect()));
        element.into()
    };
    let props = run.child(W_RPR).cloned().map(XmlNode::Element);

    let mut before = shell(run);
    before.children.extend(run.children[..text_index].iter().cloned());
    if start > 0 {
        before.children.push(piece(&chars[..start]));
    }

    let mut matched = shell(run);
    matched.children.extend(props.clone());
    if end > start {
        matched.children.push(piece(&chars[start..end]));
    }

    let mut after = shell(run);
    after.children.extend(props);
    if end < chars.len() {
        after.children.push(piece(&chars[end..]));
    }
    after.children.extend(run.children[text_index + 1..].iter().cloned());

    Ok(RunSplit {
        before: run_has_content(&before).then_some(before),
        matched,
        after: run_has_content(&after).then_some(after),
    })
}

/// Rename text children of a run to their deleted forms
fn into_deleted_run(mut run: XmlElement) -> XmlElement {
    for child in run.children.iter_mut().filter_map(XmlNode::as_element_mut) {
        if child.is(W_T) {
            child.name = W_DEL_TEXT.to_string();
            child.set_attr(XML_SPACE, "preserve");
        } else if child.is(W_INSTR_TEXT) {
            child.name = W_DEL_INSTR_TEXT.to_string();
        }
    }
    run
}

/// Formatting of the run holding `node`, minus formatting-change markers
fn run_properties(paragraph: &XmlElement, node: &[usize]) -> Option<XmlElement> {
    let (run_path, _) = split_last(node)?;
    let mut props = paragraph.get(run_path)?.child(W_RPR)?.clone();
    props.children.retain(|child| match child {
        XmlNode::Element(element) => {
            !(is_insertion_wrapper(element) || is_deletion_wrapper(element) || element.is("w:rPrChange"))
        }
        _ => true,
    });
    Some(props)
}

fn run_at<'p>(paragraph: &'p XmlElement, path: &[usize]) -> Result<&'p XmlElement, MutationError> {
    paragraph
        .get(path)
        .filter(|element| element.is(W_R))
        .ok_or_else(|| MutationError::invariant(format!("no run at {:?}", path)))
}

fn element_at<'p>(paragraph: &'p mut XmlElement, path: &[usize]) -> Result<&'p mut XmlElement, MutationError> {
    paragraph
        .get_mut(path)
        .ok_or_else(|| MutationError::invariant(format!("no element at {:?}", path)))
}

pub(crate) fn place(paragraph: &mut XmlElement, point: &InsertionPoint, element: XmlElement) -> Result<(), MutationError> {
    let container = element_at(paragraph, &point.container)?;
    if point.index > container.children.len() {
        return Err(MutationError::invariant(format!(
            "insertion index {} past end of {:?}",
            point.index, point.container
        )));
    }
    container.children.insert(point.index, element.into());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::text_map::TextMap;
    use crate::tree::DocumentTree;
    use redline_parser::Serializer;

    fn tree(paragraph: &str) -> DocumentTree {
        let xml = format!(r#"<w:document xmlns:w="urn:w"><w:body>{}</w:body></w:document>"#, paragraph);
        DocumentTree::parse("word/document.xml", xml.as_bytes()).unwrap()
    }

    fn stamp() -> RevisionStamp {
        RevisionStamp {
            author: "Tester".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    /// Apply a replace to the first paragraph and return it
    fn replace(paragraph: &str, old: &str, new: Option<&str>) -> (XmlElement, ChangeSet) {
        let tree = tree(paragraph);
        let found = Matcher::new(&tree).find(old, 1).unwrap();
        let mut p = tree.paragraph(&found.paragraph).unwrap().clone();
        let stamp = stamp();
        let mut ids = RevisionIds::starting_after(tree.max_id(|_| true));
        let changes = Mutator::new(&stamp, &mut ids)
            .replace(&mut p, &found, new)
            .unwrap();
        (p, changes)
    }

    fn xml(element: &XmlElement) -> String {
        Serializer::new().serialize_fragment(element)
    }

    #[test]
    fn test_split_run_middle() {
        let run = redline_parser::parse(r#"<w:r w:rsidR="1"><w:rPr><w:b/></w:rPr><w:t>abcdef</w:t></w:r>"#)
            .unwrap()
            .root;
        let split = split_run(&run, 1, 2, 4).unwrap();
        assert_eq!(
            xml(split.before.as_ref().unwrap()),
            r#"<w:r w:rsidR="1"><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">ab</w:t></w:r>"#
        );
        assert_eq!(
            xml(&split.matched),
            r#"<w:r w:rsidR="1"><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">cd</w:t></w:r>"#
        );
        assert_eq!(
            xml(split.after.as_ref().unwrap()),
            r#"<w:r w:rsidR="1"><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">ef</w:t></w:r>"#
        );
    }

    #[test]
    fn test_split_whole_run_has_no_remainders() {
        let run = redline_parser::parse(r#"<w:r><w:t>abc</w:t></w:r>"#).unwrap().root;
        let split = split_run(&run, 0, 0, 3).unwrap();
        assert!(split.before.is_none());
        assert!(split.after.is_none());
        assert_eq!(TextMap::build(&XmlElement::new(W_P).with_child(split.matched)).text(), "abc");
    }

    #[test]
    fn test_replace_regular_text() {
        let (p, changes) = replace(r#"<w:p><w:r><w:t>The cat sat</w:t></w:r></w:p>"#, "cat", Some("dog"));
        assert_eq!(changes.deletions, vec![1]);
        assert_eq!(changes.insertion, Some(2));
        assert_eq!(changes.change_id(), Some(2));
        assert_eq!(TextMap::build(&p).text(), "The dog sat");

        let names: Vec<_> = p.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![W_R, W_DEL, W_INS, W_R]);
        let deleted = p.get(&[1, 0, 0]).unwrap();
        assert_eq!(deleted.name, W_DEL_TEXT);
        assert_eq!(deleted.text(), "cat");
    }

    #[test]
    fn test_whole_run_match_rewraps_without_remainders() {
        let (p, _) = replace(
            r#"<w:p><w:r><w:t>keep </w:t></w:r><w:r><w:t>gone</w:t></w:r></w:p>"#,
            "gone",
            None,
        );
        let names: Vec<_> = p.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![W_R, W_DEL]);
        assert_eq!(TextMap::build(&p).text(), "keep ");
    }

    #[test]
    fn test_delete_inside_insertion_splits_wrapper() {
        let (p, changes) = replace(
            r#"<w:p><w:ins w:id="1" w:author="A"><w:r><w:t>ABCD</w:t></w:r></w:ins></w:p>"#,
            "BC",
            None,
        );
        assert!(changes.deletions.is_empty());
        assert_eq!(changes.retracted, 1);
        assert_eq!(TextMap::build(&p).text(), "AD");

        let wrappers: Vec<_> = p.elements().collect();
        assert_eq!(wrappers.len(), 2);
        assert_eq!(wrappers[0].attr(ATTR_ID), Some("1"));
        assert_eq!(wrappers[1].attr(ATTR_ID), Some("2"));
        assert!(p.find_paths(|e| e.is(W_DEL)).is_empty());
    }

    #[test]
    fn test_replace_whole_insertion_removes_wrapper() {
        let (p, changes) = replace(
            r#"<w:p><w:r><w:t>x </w:t></w:r><w:ins w:id="4" w:author="A"><w:r><w:t>new</w:t></w:r></w:ins></w:p>"#,
            "new",
            Some("newer"),
        );
        assert_eq!(changes.retracted, 1);
        assert_eq!(changes.insertion, Some(5));
        assert_eq!(TextMap::build(&p).text(), "x newer");
        let ids: Vec<_> = p.elements().filter_map(|e| e.attr(ATTR_ID)).collect();
        assert_eq!(ids, vec!["5"]);
    }

    #[test]
    fn test_strict_mode_refuses_spanning_match() {
        let tree = tree(
            r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:ins w:id="9"><w:r><w:t>world</w:t></w:r></w:ins></w:p>"#,
        );
        let found = Matcher::new(&tree).find("Hello world", 1).unwrap();
        let err = Mutator::check_mode(&found, EditMode::Strict).unwrap_err();
        assert_eq!(
            err,
            MutationError::BoundaryConflict {
                revision_id: Some(9),
                context: RevisionContext::Insertion,
            }
        );
        assert!(Mutator::check_mode(&found, EditMode::Atomic).is_ok());
    }

    #[test]
    fn test_multiple_texts_in_one_run() {
        let (p, changes) = replace(
            r#"<w:p><w:r><w:t>ab</w:t><w:tab/><w:t>cd</w:t></w:r></w:p>"#,
            "bc",
            Some("X"),
        );
        assert_eq!(changes.deletions.len(), 2);
        assert_eq!(TextMap::build(&p).text(), "aXd");
        assert_eq!(p.find_paths(|e| e.is("w:tab")).len(), 1);
    }

    #[test]
    fn test_insert_inside_insertion_splits_wrapper() {
        let tree = tree(r#"<w:p><w:ins w:id="3" w:author="A"><w:r><w:t>ABCD</w:t></w:r></w:ins></w:p>"#);
        let found = Matcher::new(&tree).find("AB", 1).unwrap();
        let point = found.point_after().unwrap();
        let mut p = tree.paragraph(&found.paragraph).unwrap().clone();
        let stamp = stamp();
        let mut ids = RevisionIds::starting_after(3);
        let changes = Mutator::new(&stamp, &mut ids).insert_at(&mut p, &point, "-").unwrap();

        assert_eq!(changes.insertion, Some(4));
        assert_eq!(TextMap::build(&p).text(), "AB-CD");
        let ids: Vec<_> = p.elements().filter_map(|e| e.attr(ATTR_ID)).collect();
        assert_eq!(ids, vec!["3", "4", "5"]);
        for wrapper in p.elements() {
            assert!(wrapper.find_paths(|e| e.is(W_INS)).is_empty());
        }
    }

    #[test]
    fn test_replace_inside_hyperlink_in_insertion() {
        let (p, changes) = replace(
            r#"<w:p><w:ins w:id="1" w:author="A"><w:hyperlink r:id="rId4"><w:r><w:t>abcdef</w:t></w:r></w:hyperlink></w:ins></w:p>"#,
            "cd",
            Some("X"),
        );
        assert_eq!(changes.retracted, 1);
        assert_eq!(changes.insertion, Some(2));
        assert_eq!(TextMap::build(&p).text(), "abXef");

        let wrappers: Vec<_> = p.elements().collect();
        let ids: Vec<_> = wrappers.iter().filter_map(|e| e.attr(ATTR_ID)).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        for half in [wrappers[0], wrappers[2]] {
            let link = half.child("w:hyperlink").unwrap();
            assert_eq!(link.attr("r:id"), Some("rId4"));
        }
        assert!(wrappers[1].child("w:hyperlink").is_none());
    }

    #[test]
    fn test_insert_inside_hyperlink_in_insertion() {
        let tree = tree(
            r#"<w:p><w:ins w:id="3" w:author="A"><w:hyperlink><w:r><w:t>ab</w:t></w:r><w:r><w:t>cd</w:t></w:r></w:hyperlink></w:ins></w:p>"#,
        );
        let found = Matcher::new(&tree).find("ab", 1).unwrap();
        let point = found.point_after().unwrap();
        let mut p = tree.paragraph(&found.paragraph).unwrap().clone();
        let stamp = stamp();
        let mut ids = RevisionIds::starting_after(3);
        Mutator::new(&stamp, &mut ids).insert_at(&mut p, &point, "X").unwrap();

        assert_eq!(TextMap::build(&p).text(), "abXcd");
        let names: Vec<_> = p.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![W_INS, W_INS, W_INS]);
        assert_eq!(p.find_paths(|e| e.is("w:hyperlink")).len(), 2);
    }

    #[test]
    fn test_retract_whole_hyperlink_keeps_neighbours() {
        let (p, _) = replace(
            r#"<w:p><w:ins w:id="1" w:author="A"><w:r><w:t>a</w:t></w:r><w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink><w:r><w:t>b</w:t></w:r></w:ins></w:p>"#,
            "link",
            None,
        );
        assert_eq!(TextMap::build(&p).text(), "ab");
        assert!(p.find_paths(|e| e.is("w:hyperlink")).is_empty());
        assert_eq!(p.elements().count(), 2);
    }

    #[test]
    fn test_deleted_segment_is_invariant_violation() {
        let tree = tree(r#"<w:p><w:r><w:t>abc</w:t></w:r></w:p>"#);
        let mut found = Matcher::new(&tree).find("b", 1).unwrap();
        found.segments[0].context = RevisionContext::Deletion;
        let mut p = tree.paragraph(&found.paragraph).unwrap().clone();
        let stamp = stamp();
        let mut ids = RevisionIds::starting_after(0);
        let err = Mutator::new(&stamp, &mut ids)
            .replace(&mut p, &found, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
    }

    #[test]
    fn test_inserted_run_keeps_first_formatting() {
        let (p, _) = replace(
            r#"<w:p><w:r><w:rPr><w:i/><w:ins w:id="1"/></w:rPr><w:t>old</w:t></w:r></w:p>"#,
            "old",
            Some("new"),
        );
        let ins = p.child(W_INS).unwrap();
        let props = ins.get(&[0, 0]).unwrap();
        assert_eq!(props.name, W_RPR);
        assert!(props.child("w:i").is_some());
        assert!(props.child(W_INS).is_none());
    }
}

//! # Cross-Boundary Matcher
//!
//! Finds exact occurrences of a search string in the visible text of each
//! paragraph and resolves them into per-node segments. A match may cross
//! run and revision boundaries but never paragraph boundaries.
//!
//! Occurrences are counted 1-based across the whole document, and the scan
//! advances one character at a time so overlapping occurrences are distinct
//! ("aa" occurs twice in "aaa").

use redline_parser::NodePath;
use serde::Serialize;

use crate::errors::{EditorError, EditorResult};
use crate::text_map::{RevisionContext, TextMap};
use crate::tree::DocumentTree;

/// A maximal run of matched characters sharing one node and classification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Path of the text element, relative to the paragraph
    #[serde(skip)]
    pub node: NodePath,
    /// Enclosing revision wrapper, relative to the paragraph
    #[serde(skip)]
    pub wrapper: Option<NodePath>,
    pub context: RevisionContext,
    pub revision_id: Option<u32>,
    pub text: String,
    /// Character range inside the paragraph's visible text
    pub start: usize,
    pub end: usize,
    /// Character range inside the node's own text
    #[serde(skip)]
    pub node_start: usize,
    #[serde(skip)]
    pub node_end: usize,
}

/// A located occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub paragraph_index: usize,
    /// Path of the `w:p` element from the document root
    #[serde(skip)]
    pub paragraph: NodePath,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub segments: Vec<Segment>,
}

/// A zero-width position between two characters of a text node
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPoint {
    pub node: NodePath,
    pub offset: usize,
    pub context: RevisionContext,
    pub wrapper: Option<NodePath>,
    pub revision_id: Option<u32>,
}

impl Match {
    /// First segment that lies inside an existing revision
    pub fn spanned_revision(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.context != RevisionContext::Regular)
    }

    /// Whether every segment is plain text
    pub fn is_simple(&self) -> bool {
        self.spanned_revision().is_none()
    }

    /// Position immediately before the first matched character
    pub fn point_before(&self) -> Option<SplitPoint> {
        let first = self.segments.first()?;
        Some(SplitPoint {
            node: first.node.clone(),
            offset: first.node_start,
            context: first.context,
            wrapper: first.wrapper.clone(),
            revision_id: first.revision_id,
        })
    }

    /// Position immediately after the last matched character
    pub fn point_after(&self) -> Option<SplitPoint> {
        let last = self.segments.last()?;
        Some(SplitPoint {
            node: last.node.clone(),
            offset: last.node_end,
            context: last.context,
            wrapper: last.wrapper.clone(),
            revision_id: last.revision_id,
        })
    }
}

/// Group the positions of `[start, end)` into segments
pub fn resolve_segments(map: &TextMap, start: usize, end: usize) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let positions = &map.positions()[start..end];
    let chars = &map.chars()[start..end];

    for (i, (position, ch)) in positions.iter().zip(chars).enumerate() {
        let index = start + i;
        if let Some(last) = segments.last_mut() {
            let same_node = map.node(position.node).map(|node| &node.path) == Some(&last.node);
            if same_node && position.context == last.context && position.offset == last.node_end {
                last.text.push(*ch);
                last.end = index + 1;
                last.node_end += 1;
                continue;
            }
        }

        let Some(node) = map.node(position.node) else {
            continue;
        };
        segments.push(Segment {
            node: node.path.clone(),
            wrapper: node.wrapper.clone(),
            context: position.context,
            revision_id: node.revision_id,
            text: ch.to_string(),
            start: index,
            end: index + 1,
            node_start: position.offset,
            node_end: position.offset + 1,
        });
    }
    segments
}

/// Start offsets of every (possibly overlapping) occurrence
pub fn find_offsets(haystack: &[char], needle: &[char]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| offset)
        .collect()
}

fn validate_needle(needle: &str) -> EditorResult<Vec<char>> {
    if needle.is_empty() {
        return Err(EditorError::invalid_input("search text must not be empty"));
    }
    Ok(needle.chars().collect())
}

fn validate_occurrence(occurrence: usize) -> EditorResult<()> {
    if occurrence == 0 {
        return Err(EditorError::invalid_input("occurrence is 1-based"));
    }
    Ok(())
}

/// Matcher over one document tree
pub struct Matcher<'a> {
    tree: &'a DocumentTree,
}

impl<'a> Matcher<'a> {
    pub fn new(tree: &'a DocumentTree) -> Self {
        Self { tree }
    }

    /// Visit each occurrence in document order until `visit` returns false
    fn scan<F>(&self, needle: &[char], mut visit: F)
    where
        F: FnMut(usize, &NodePath, &TextMap, usize) -> bool,
    {
        for (index, path) in self.tree.paragraph_paths().iter().enumerate() {
            let Some(paragraph) = self.tree.paragraph(path) else {
                continue;
            };
            let map = TextMap::build(paragraph);
            for offset in find_offsets(map.chars(), needle) {
                if !visit(index, path, &map, offset) {
                    return;
                }
            }
        }
    }

    /// Locate the `occurrence`-th (1-based) match of `needle`
    pub fn find(&self, needle: &str, occurrence: usize) -> EditorResult<Match> {
        let chars = validate_needle(needle)?;
        validate_occurrence(occurrence)?;

        let mut seen = 0;
        let mut found = None;
        self.scan(&chars, |index, path, map, offset| {
            seen += 1;
            if seen == occurrence {
                found = Some(build_match(index, path, map, offset, chars.len()));
                return false;
            }
            true
        });

        found.ok_or_else(|| EditorError::TextNotFound {
            text: needle.to_string(),
            occurrence,
            found: seen,
        })
    }

    /// Every match of `needle` in document order
    pub fn find_all(&self, needle: &str) -> EditorResult<Vec<Match>> {
        let chars = validate_needle(needle)?;
        let mut matches = Vec::new();
        self.scan(&chars, |index, path, map, offset| {
            matches.push(build_match(index, path, map, offset, chars.len()));
            true
        });
        Ok(matches)
    }

    /// Number of occurrences of `needle`
    pub fn count(&self, needle: &str) -> EditorResult<usize> {
        let chars = validate_needle(needle)?;
        let mut count = 0;
        self.scan(&chars, |_, _, _, _| {
            count += 1;
            true
        });
        Ok(count)
    }
}

fn build_match(paragraph_index: usize, path: &NodePath, map: &TextMap, start: usize, len: usize) -> Match {
    let end = start + len;
    Match {
        paragraph_index,
        paragraph: path.clone(),
        start,
        end,
        text: map.chars()[start..end].iter().collect(),
        segments: resolve_segments(map, start, end),
    }
}

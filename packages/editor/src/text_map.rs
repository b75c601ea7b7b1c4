//! # Text Map
//!
//! Flattened visible text of one paragraph with a parallel index from every
//! character back to the `w:t` node it came from.
//!
//! ```text
//! <w:r><w:t>Hello </w:t></w:r><w:ins><w:r><w:t>world</w:t></w:r></w:ins>
//!
//! text:      H e l l o ␠ w o r l d
//! node:      0 0 0 0 0 0 1 1 1 1 1
//! offset:    0 1 2 3 4 5 0 1 2 3 4
//! context:   R R R R R R I I I I I
//! ```
//!
//! Deleted content (`w:delText`, anything under `w:del`/`w:moveFrom`) is
//! walked and kept in [`TextMap::nodes`] but never reaches the text or the
//! positions. Maps hold paths into the paragraph they were built from and
//! must be rebuilt after any structural edit.

use redline_common::{walk_children, Visitor, Walk};
use redline_parser::{NodePath, XmlElement};
use serde::{Deserialize, Serialize};

use crate::tree::{
    element_id, is_deletion_wrapper, is_insertion_wrapper, is_properties, MC_FALLBACK, W_DEL_TEXT, W_P, W_T,
    W_TXBX_CONTENT,
};

/// Revision classification of a text node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionContext {
    Regular,
    Insertion,
    Deletion,
}

/// A text-bearing node of the paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    /// Path of the `w:t`/`w:delText` element, relative to the paragraph
    pub path: NodePath,
    pub text: String,
    pub context: RevisionContext,
    /// Innermost enclosing wrapper of the node's context, relative to the paragraph
    pub wrapper: Option<NodePath>,
    pub revision_id: Option<u32>,
}

/// Where one visible character came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    /// Index into [`TextMap::nodes`]
    pub node: usize,
    /// Character offset inside that node's text
    pub offset: usize,
    pub context: RevisionContext,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMap {
    text: String,
    chars: Vec<char>,
    positions: Vec<TextPosition>,
    nodes: Vec<TextNode>,
}

struct MapBuilder {
    nodes: Vec<TextNode>,
    wrappers: Vec<(RevisionContext, NodePath, Option<u32>)>,
}

impl MapBuilder {
    fn context(&self) -> RevisionContext {
        let has = |kind| self.wrappers.iter().any(|(context, _, _)| *context == kind);
        if has(RevisionContext::Deletion) {
            RevisionContext::Deletion
        } else if has(RevisionContext::Insertion) {
            RevisionContext::Insertion
        } else {
            RevisionContext::Regular
        }
    }
}

impl Visitor for MapBuilder {
    fn enter_element(&mut self, element: &XmlElement, path: &[usize]) -> Walk {
        if is_properties(element) || element.is(W_P) || element.is(W_TXBX_CONTENT) || element.is(MC_FALLBACK) {
            return Walk::Skip;
        }

        if is_insertion_wrapper(element) {
            self.wrappers
                .push((RevisionContext::Insertion, path.to_vec(), element_id(element)));
        } else if is_deletion_wrapper(element) {
            self.wrappers
                .push((RevisionContext::Deletion, path.to_vec(), element_id(element)));
        } else if element.is(W_T) || element.is(W_DEL_TEXT) {
            let context = if element.is(W_DEL_TEXT) {
                RevisionContext::Deletion
            } else {
                self.context()
            };
            let wrapper = self
                .wrappers
                .iter()
                .rev()
                .find(|(kind, _, _)| *kind == context);

            self.nodes.push(TextNode {
                path: path.to_vec(),
                text: element.text(),
                context,
                wrapper: wrapper.map(|(_, path, _)| path.clone()),
                revision_id: wrapper.and_then(|(_, _, id)| *id),
            });
            return Walk::Skip;
        }

        Walk::Descend
    }

    fn leave_element(&mut self, element: &XmlElement, _path: &[usize]) {
        if is_insertion_wrapper(element) || is_deletion_wrapper(element) {
            self.wrappers.pop();
        }
    }
}

impl TextMap {
    /// Build the map for a single `w:p` element
    pub fn build(paragraph: &XmlElement) -> Self {
        let mut builder = MapBuilder {
            nodes: Vec::new(),
            wrappers: Vec::new(),
        };
        walk_children(&mut builder, paragraph);

        let mut map = TextMap {
            nodes: builder.nodes,
            ..Default::default()
        };
        for (index, node) in map.nodes.iter().enumerate() {
            if node.context == RevisionContext::Deletion {
                continue;
            }
            for (offset, ch) in node.text.chars().enumerate() {
                map.text.push(ch);
                map.chars.push(ch);
                map.positions.push(TextPosition {
                    node: index,
                    offset,
                    context: node.context,
                });
            }
        }
        map
    }

    /// Visible text of the paragraph
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn positions(&self) -> &[TextPosition] {
        &self.positions
    }

    /// Every text node walked, deleted ones included
    pub fn nodes(&self) -> &[TextNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&TextNode> {
        self.nodes.get(index)
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

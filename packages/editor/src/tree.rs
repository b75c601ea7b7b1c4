//! # Document Tree
//!
//! The parsed body part (`word/document.xml`) plus the WordprocessingML
//! vocabulary the rest of the editor speaks.
//!
//! Paragraphs are addressed by `NodePath` from the root element. Paths are
//! recomputed on every call since structural edits shift sibling indices.

use redline_common::{walk_children, Visitor, Walk};
use redline_parser::{parse_bytes, serialize, NodePath, XmlDocument, XmlElement};

use crate::errors::EditorResult;

pub const W_BODY: &str = "w:body";
pub const W_P: &str = "w:p";
pub const W_PPR: &str = "w:pPr";
pub const W_R: &str = "w:r";
pub const W_RPR: &str = "w:rPr";
pub const W_T: &str = "w:t";
pub const W_DEL_TEXT: &str = "w:delText";
pub const W_INSTR_TEXT: &str = "w:instrText";
pub const W_DEL_INSTR_TEXT: &str = "w:delInstrText";
pub const W_INS: &str = "w:ins";
pub const W_DEL: &str = "w:del";
pub const W_MOVE_TO: &str = "w:moveTo";
pub const W_MOVE_FROM: &str = "w:moveFrom";
pub const W_TXBX_CONTENT: &str = "w:txbxContent";
pub const MC_FALLBACK: &str = "mc:Fallback";
pub const W_COMMENT_RANGE_START: &str = "w:commentRangeStart";
pub const W_COMMENT_RANGE_END: &str = "w:commentRangeEnd";
pub const W_COMMENT_REFERENCE: &str = "w:commentReference";

pub const ATTR_ID: &str = "w:id";
pub const ATTR_AUTHOR: &str = "w:author";
pub const ATTR_DATE: &str = "w:date";
pub const XML_SPACE: &str = "xml:space";

/// Wrapper elements whose content is pending insertion
pub fn is_insertion_wrapper(element: &XmlElement) -> bool {
    element.is(W_INS) || element.is(W_MOVE_TO)
}

/// Wrapper elements whose content is pending deletion
pub fn is_deletion_wrapper(element: &XmlElement) -> bool {
    element.is(W_DEL) || element.is(W_MOVE_FROM)
}

/// Property containers. Revision-looking children inside them record
/// formatting changes, not content revisions.
pub fn is_properties(element: &XmlElement) -> bool {
    element.is(W_RPR) || element.is(W_PPR) || element.name == "w:sectPr" || element.name == "w:tblPr"
}

/// Comment range markers and reference marks in the body
pub fn is_comment_marker(element: &XmlElement) -> bool {
    element.is(W_COMMENT_RANGE_START) || element.is(W_COMMENT_RANGE_END) || element.is(W_COMMENT_REFERENCE)
}

/// Numeric `w:id` of a wrapper or marker
pub fn element_id(element: &XmlElement) -> Option<u32> {
    element.attr(ATTR_ID)?.trim().parse().ok()
}

/// Whether a run carries anything besides its properties
pub fn run_has_content(run: &XmlElement) -> bool {
    run.elements().any(|child| !child.is(W_RPR))
}

/// Whether a container still holds any non-empty child element
pub fn has_content(element: &XmlElement) -> bool {
    element.elements().any(|child| {
        if child.is(W_R) {
            run_has_content(child)
        } else {
            true
        }
    })
}

/// A `w:t` (or `w:delText`) element holding `text`, whitespace preserved
pub fn text_element(name: &str, text: &str) -> XmlElement {
    XmlElement::new(name)
        .with_attr(XML_SPACE, "preserve")
        .with_text(text)
}

/// Copy of an element's name and attributes without children
pub fn shell(element: &XmlElement) -> XmlElement {
    XmlElement {
        name: element.name.clone(),
        attributes: element.attributes.clone(),
        children: Vec::new(),
    }
}

/// Split a path into its parent path and last index
pub fn split_last(path: &[usize]) -> Option<(&[usize], usize)> {
    let (last, parent) = path.split_last()?;
    Some((parent, *last))
}

/// Parsed body part of a document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    xml: XmlDocument,
}

struct ParagraphCollector {
    paths: Vec<NodePath>,
}

impl Visitor for ParagraphCollector {
    fn enter_element(&mut self, element: &XmlElement, path: &[usize]) -> Walk {
        if element.is(W_P) {
            self.paths.push(path.to_vec());
        }
        if is_properties(element) || element.is(MC_FALLBACK) {
            Walk::Skip
        } else {
            Walk::Descend
        }
    }
}

impl DocumentTree {
    pub fn new(xml: XmlDocument) -> Self {
        Self { xml }
    }

    pub fn parse(part: &str, bytes: &[u8]) -> EditorResult<Self> {
        Ok(Self::new(parse_bytes(part, bytes)?))
    }

    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    pub fn root(&self) -> &XmlElement {
        &self.xml.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.xml.root
    }

    /// Paths of every paragraph in document order, nested ones included
    pub fn paragraph_paths(&self) -> Vec<NodePath> {
        let mut collector = ParagraphCollector { paths: Vec::new() };
        walk_children(&mut collector, self.root());
        collector.paths
    }

    pub fn paragraph(&self, path: &[usize]) -> Option<&XmlElement> {
        self.root().get(path).filter(|element| element.is(W_P))
    }

    pub fn paragraph_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        self.root_mut().get_mut(path).filter(|element| element.is(W_P))
    }

    /// Largest numeric `w:id` on elements accepted by `filter`
    pub fn max_id<F>(&self, filter: F) -> u32
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut max = 0;
        let mut stack = vec![self.root()];
        while let Some(element) = stack.pop() {
            if filter(element) {
                if let Some(id) = element_id(element) {
                    max = max.max(id);
                }
            }
            stack.extend(element.elements());
        }
        max
    }

    pub fn to_xml_string(&self) -> String {
        serialize(&self.xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<w:document xmlns:w="urn:w"><w:body>
        <w:p><w:r><w:t>one</w:t></w:r></w:p>
        <w:p><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>box</w:t></w:r></w:p></w:txbxContent></w:pict></w:r></w:p>
        <w:p><w:ins w:id="7"><w:r><w:t>two</w:t></w:r></w:ins></w:p>
    </w:body></w:document>"#;

    #[test]
    fn test_paragraph_paths_include_nested() {
        let tree = DocumentTree::parse("word/document.xml", BODY.as_bytes()).unwrap();
        let paths = tree.paragraph_paths();
        assert_eq!(paths.len(), 4);
        let texts: Vec<_> = paths
            .iter()
            .map(|p| tree.paragraph(p).unwrap().find_paths(|e| e.is(W_T)).len())
            .collect();
        assert_eq!(texts, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_max_id() {
        let tree = DocumentTree::parse("word/document.xml", BODY.as_bytes()).unwrap();
        assert_eq!(tree.max_id(is_insertion_wrapper), 7);
        assert_eq!(tree.max_id(is_deletion_wrapper), 0);
    }

    #[test]
    fn test_has_content_ignores_property_only_runs() {
        let ins = XmlElement::new(W_INS).with_child(XmlElement::new(W_R).with_child(XmlElement::new(W_RPR)));
        assert!(!has_content(&ins));
        let ins = ins.with_child(XmlElement::new(W_R).with_child(text_element(W_T, "x")));
        assert!(has_content(&ins));
    }
}

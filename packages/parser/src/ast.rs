//! Owned XML tree for package parts.
//!
//! Nodes are addressed by index paths (`NodePath`) from some ancestor rather
//! than by back-references. Structural edits replace children wholesale, so a
//! path is only meaningful against the tree it was computed from.

use serde::{Deserialize, Serialize};

/// Child-index path from an ancestor element down to a descendant node
pub type NodePath = Vec<usize>;

/// A complete XML part: prolog, root element and trailing misc nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlDocument {
    /// Declaration, comments and whitespace before the root element
    pub prolog: Vec<XmlNode>,
    pub root: XmlElement,
    /// Misc nodes after the root element
    pub epilog: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    /// Raw content between `<?` and `?>`, including the XML declaration
    ProcessingInstruction(String),
    /// Raw content between `<!DOCTYPE` and `>`
    Doctype(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Unescaped value
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: vec![XmlNode::ProcessingInstruction(
                r#"xml version="1.0" encoding="UTF-8" standalone="yes""#.to_string(),
            )],
            root,
            epilog: Vec::new(),
        }
    }
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Whether this node is an element with the given qualified name
    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, XmlNode::Element(element) if element.name == name)
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style text append
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Set an attribute, keeping its position if it already exists
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    /// Child elements, skipping text and other node kinds
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .find(|element| element.name == name)
    }

    /// Concatenated direct text and CDATA content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Resolve a descendant element by index path
    pub fn get(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Replace the child at `index` with a sequence of elements
    pub fn splice_elements(&mut self, index: usize, replacement: Vec<XmlElement>) {
        self.children
            .splice(index..=index, replacement.into_iter().map(XmlNode::Element));
    }

    /// Collect paths of every descendant element matching the predicate, in
    /// document order. Matching elements are not descended into.
    pub fn find_paths<F>(&self, predicate: F) -> Vec<NodePath>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_paths(self, &predicate, &mut path, &mut out);
        out
    }
}

fn collect_paths<F>(element: &XmlElement, predicate: &F, path: &mut NodePath, out: &mut Vec<NodePath>)
where
    F: Fn(&XmlElement) -> bool,
{
    for (index, child) in element.children.iter().enumerate() {
        if let XmlNode::Element(child) = child {
            path.push(index);
            if predicate(child) {
                out.push(path.clone());
            } else {
                collect_paths(child, predicate, path, out);
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlElement {
        XmlElement::new("w:p")
            .with_child(XmlElement::new("w:r").with_child(XmlElement::new("w:t").with_text("Hello")))
            .with_child(
                XmlElement::new("w:ins").with_attr("w:id", "1").with_child(
                    XmlElement::new("w:r").with_child(XmlElement::new("w:t").with_text("world")),
                ),
            )
    }

    #[test]
    fn test_path_lookup() {
        let p = sample();
        assert_eq!(p.get(&[0, 0]).unwrap().text(), "Hello");
        assert_eq!(p.get(&[1, 0, 0]).unwrap().text(), "world");
        assert!(p.get(&[2]).is_none());
    }

    #[test]
    fn test_find_paths_stops_at_match() {
        let p = sample();
        let runs = p.find_paths(|e| e.is("w:r"));
        assert_eq!(runs, vec![vec![0], vec![1, 0]]);
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut e = XmlElement::new("w:ins").with_attr("w:id", "1").with_attr("w:author", "A");
        e.set_attr("w:id", "7");
        assert_eq!(e.attributes[0].name, "w:id");
        assert_eq!(e.attr("w:id"), Some("7"));
    }

    #[test]
    fn test_splice_elements() {
        let mut p = sample();
        p.splice_elements(0, vec![XmlElement::new("a"), XmlElement::new("b")]);
        let names: Vec<_> = p.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "w:ins"]);
    }
}

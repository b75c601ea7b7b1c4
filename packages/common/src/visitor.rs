use redline_parser::ast::*;

/// Whether a walk should descend into an element's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

/// Visitor pattern for traversing XML subtrees immutably.
///
/// Paths passed to the hooks are child-index paths relative to the element
/// the walk started from, so they can be fed straight back into
/// `XmlElement::get`/`get_mut` on that same element.
pub trait Visitor: Sized {
    fn enter_element(&mut self, _element: &XmlElement, _path: &[usize]) -> Walk {
        Walk::Descend
    }

    fn leave_element(&mut self, _element: &XmlElement, _path: &[usize]) {
        // Nothing to unwind by default
    }

    fn visit_text(&mut self, _text: &str, _path: &[usize]) {
        // Leaf node, no children to walk
    }
}

/// Walk every descendant of `root` (but not `root` itself) in document order
pub fn walk_children<V: Visitor>(visitor: &mut V, root: &XmlElement) {
    let mut path = Vec::new();
    walk_inner(visitor, root, &mut path);
}

fn walk_inner<V: Visitor>(visitor: &mut V, element: &XmlElement, path: &mut NodePath) {
    for (index, child) in element.children.iter().enumerate() {
        path.push(index);
        match child {
            XmlNode::Element(child) => {
                if visitor.enter_element(child, path) == Walk::Descend {
                    walk_inner(visitor, child, path);
                }
                visitor.leave_element(child, path);
            }
            XmlNode::Text(text) | XmlNode::CData(text) => visitor.visit_text(text, path),
            _ => {}
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_parser::parse;

    struct NameCollector {
        names: Vec<(String, NodePath)>,
        skip: &'static str,
    }

    impl Visitor for NameCollector {
        fn enter_element(&mut self, element: &XmlElement, path: &[usize]) -> Walk {
            self.names.push((element.name.clone(), path.to_vec()));
            if element.is(self.skip) {
                Walk::Skip
            } else {
                Walk::Descend
            }
        }
    }

    #[test]
    fn test_walk_in_document_order_with_paths() {
        let doc = parse("<p><r><t>a</t></r><ins><r><t>b</t></r></ins></p>").unwrap();
        let root = &doc.root;
        let mut visitor = NameCollector { names: Vec::new(), skip: "" };
        walk_children(&mut visitor, root);

        let names: Vec<_> = visitor.names.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["r", "t", "ins", "r", "t"]);
        assert_eq!(visitor.names[4].1, vec![1, 0, 0]);
        assert_eq!(root.get(&visitor.names[4].1).unwrap().text(), "b");
    }

    #[test]
    fn test_skip_prunes_subtree() {
        let doc = parse("<p><r><t>a</t></r><ins><r><t>b</t></r></ins></p>").unwrap();
        let mut visitor = NameCollector { names: Vec::new(), skip: "ins" };
        walk_children(&mut visitor, &doc.root);
        let names: Vec<_> = visitor.names.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["r", "t", "ins"]);
    }
}

use crate::ast::*;

/// Serializer converts an XML tree back to source text.
///
/// Output is lossless at the information-set level: node order, attribute
/// order, namespace declarations, comments and whitespace text survive.
/// Entity spelling is normalized and empty elements are written as `<x/>`.
pub struct Serializer {
    output: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    /// Serialize a Document to source text
    pub fn serialize(mut self, doc: &XmlDocument) -> String {
        for node in &doc.prolog {
            self.serialize_node(node);
        }
        self.serialize_element(&doc.root);
        for node in &doc.epilog {
            self.serialize_node(node);
        }
        self.output
    }

    /// Serialize a single element subtree
    pub fn serialize_fragment(mut self, element: &XmlElement) -> String {
        self.serialize_element(element);
        self.output
    }

    fn serialize_node(&mut self, node: &XmlNode) {
        match node {
            XmlNode::Element(element) => self.serialize_element(element),
            XmlNode::Text(text) => escape_text(text, &mut self.output),
            XmlNode::CData(data) => {
                self.output.push_str("<![CDATA[");
                self.output.push_str(data);
                self.output.push_str("]]>");
            }
            XmlNode::Comment(comment) => {
                self.output.push_str("<!--");
                self.output.push_str(comment);
                self.output.push_str("-->");
            }
            XmlNode::ProcessingInstruction(pi) => {
                self.output.push_str("<?");
                self.output.push_str(pi);
                self.output.push_str("?>");
            }
            XmlNode::Doctype(doctype) => {
                self.output.push_str("<!DOCTYPE");
                self.output.push_str(doctype);
                self.output.push('>');
            }
        }
    }

    fn serialize_element(&mut self, element: &XmlElement) {
        self.output.push('<');
        self.output.push_str(&element.name);
        for attr in &element.attributes {
            self.output.push(' ');
            self.output.push_str(&attr.name);
            self.output.push_str("=\"");
            escape_attr(&attr.value, &mut self.output);
            self.output.push('"');
        }

        if element.children.is_empty() {
            self.output.push_str("/>");
            return;
        }

        self.output.push('>');
        for child in &element.children {
            self.serialize_node(child);
        }
        self.output.push_str("</");
        self.output.push_str(&element.name);
        self.output.push('>');
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
}

/// Convenience function to serialize a document
pub fn serialize(doc: &XmlDocument) -> String {
    Serializer::new().serialize(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_serialize_simple_element() {
        let element = XmlElement::new("w:t")
            .with_attr("xml:space", "preserve")
            .with_text("a < b & c");
        let out = Serializer::new().serialize_fragment(&element);
        assert_eq!(out, r#"<w:t xml:space="preserve">a &lt; b &amp; c</w:t>"#);
    }

    #[test]
    fn test_serialize_empty_element() {
        let out = Serializer::new().serialize_fragment(&XmlElement::new("w:br"));
        assert_eq!(out, "<w:br/>");
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
            <w:document xmlns:w=\"urn:w\" xmlns:mc=\"urn:mc\" mc:Ignorable=\"w14\">\
            <!-- kept --><w:body><w:p w:rsidR=\"1\"><w:r><w:t xml:space=\"preserve\"> Hi &amp; bye </w:t></w:r></w:p></w:body></w:document>";

        let doc = parse(source).unwrap();
        let out = serialize(&doc);
        assert_eq!(out, source);

        let reparsed = parse(&out).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_attribute_quotes_escaped() {
        let element = XmlElement::new("a").with_attr("title", "say \"hi\"");
        let out = Serializer::new().serialize_fragment(&element);
        assert_eq!(out, r#"<a title="say &quot;hi&quot;"/>"#);
        let reparsed = parse(&out).unwrap();
        assert_eq!(reparsed.root.attr("title"), Some("say \"hi\""));
    }
}

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};

/// Parser for XML package parts
pub struct Parser<'src> {
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
    source_len: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
        })
    }

    /// Parse a complete document
    pub fn parse_document(&mut self) -> ParseResult<XmlDocument> {
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;

        while let Some((token, span)) = self.advance() {
            match token {
                Token::StartTag(raw) => {
                    if root.is_some() {
                        return Err(ParseError::invalid_syntax(
                            span.start,
                            "Multiple root elements",
                        ));
                    }
                    let (element, self_closing) = parse_start_tag(raw, span.start)?;
                    let element = if self_closing {
                        element
                    } else {
                        self.parse_children(element, span.start)?
                    };
                    root = Some(element);
                }
                Token::EndTag(raw) => {
                    return Err(ParseError::unexpected_token(span.start, "start tag", raw));
                }
                other => {
                    let node = leaf_node(other, span.start)?;
                    if root.is_some() {
                        epilog.push(node);
                    } else {
                        prolog.push(node);
                    }
                }
            }
        }

        let root = root.ok_or(ParseError::MissingRoot)?;
        Ok(XmlDocument { prolog, root, epilog })
    }

    /// Parse children of an open element until its matching end tag
    fn parse_children(&mut self, mut element: XmlElement, open_pos: usize) -> ParseResult<XmlElement> {
        loop {
            let Some((token, span)) = self.advance() else {
                return Err(ParseError::unexpected_eof(self.source_len.max(open_pos), element.name));
            };

            match token {
                Token::EndTag(raw) => {
                    let name = raw[2..raw.len() - 1].trim();
                    if name != element.name {
                        return Err(ParseError::unexpected_token(
                            span.start,
                            format!("</{}>", element.name),
                            raw,
                        ));
                    }
                    return Ok(element);
                }
                Token::StartTag(raw) => {
                    let (child, self_closing) = parse_start_tag(raw, span.start)?;
                    let child = if self_closing {
                        child
                    } else {
                        self.parse_children(child, span.start)?
                    };
                    element.children.push(XmlNode::Element(child));
                }
                other => element.children.push(leaf_node(other, span.start)?),
            }
        }
    }

    fn advance(&mut self) -> Option<(Token<'src>, std::ops::Range<usize>)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}

fn leaf_node(token: Token<'_>, pos: usize) -> ParseResult<XmlNode> {
    match token {
        Token::Text(raw) => Ok(XmlNode::Text(unescape(raw, pos)?)),
        Token::CData(raw) => Ok(XmlNode::CData(raw.to_string())),
        Token::Comment(raw) => Ok(XmlNode::Comment(raw.to_string())),
        Token::ProcessingInstruction(raw) => Ok(XmlNode::ProcessingInstruction(raw.to_string())),
        Token::Doctype(raw) => Ok(XmlNode::Doctype(raw.to_string())),
        other => Err(ParseError::unexpected_token(pos, "character data", other.to_string())),
    }
}

/// Split a raw start tag into an element and whether it was self-closing
fn parse_start_tag(raw: &str, pos: usize) -> ParseResult<(XmlElement, bool)> {
    let self_closing = raw.ends_with("/>");
    let inner = if self_closing {
        &raw[1..raw.len() - 2]
    } else {
        &raw[1..raw.len() - 1]
    };

    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let mut element = XmlElement::new(&inner[..name_end]);

    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| ParseError::invalid_syntax(pos, format!("Attribute without value in {}", raw)))?;
        let name = rest[..eq].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ParseError::invalid_syntax(pos, format!("Malformed attribute in {}", raw)));
        }

        let after_eq = rest[eq + 1..].trim_start();
        let quote = after_eq
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| ParseError::invalid_syntax(pos, format!("Unquoted attribute {}", name)))?;
        let close = after_eq[1..]
            .find(quote)
            .ok_or_else(|| ParseError::invalid_syntax(pos, format!("Unterminated attribute {}", name)))?;

        let value = unescape(&after_eq[1..close + 1], pos)?;
        element.attributes.push(Attribute {
            name: name.to_string(),
            value,
        });
        rest = after_eq[close + 2..].trim_start();
    }

    Ok((element, self_closing))
}

/// Decode predefined and numeric character references
pub fn unescape(raw: &str, pos: usize) -> ParseResult<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| ParseError::invalid_syntax(pos, "Unterminated entity reference"))?;
        let entity = &after[..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                let ch = code.and_then(char::from_u32).ok_or_else(|| {
                    ParseError::invalid_syntax(pos, format!("Unknown entity &{};", entity))
                })?;
                out.push(ch);
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Parse an XML source string
pub fn parse(source: &str) -> ParseResult<XmlDocument> {
    let mut parser = Parser::new(source)?;
    parser.parse_document()
}

/// Parse raw part bytes, reporting the part name on invalid UTF-8
pub fn parse_bytes(part: &str, bytes: &[u8]) -> ParseResult<XmlDocument> {
    let source = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 {
        part: part.to_string(),
    })?;
    // Tolerate a UTF-8 byte order mark
    parse(source.strip_prefix('\u{feff}').unwrap_or(source))
}

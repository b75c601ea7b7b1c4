use logos::{Lexer, Logos};
use std::fmt;

use crate::error::{ParseError, ParseResult};

/// Markup tokens of an XML part.
///
/// Start tags are lexed whole (name plus attributes) and split by the parser,
/// which keeps the lexer a single mode: everything not starting with `<` is
/// character data.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// `<?target ...?>`, payload excludes the delimiters
    #[token("<?", processing_instruction)]
    ProcessingInstruction(&'src str),

    /// `<!-- ... -->`, payload excludes the delimiters
    #[token("<!--", comment)]
    Comment(&'src str),

    /// `<![CDATA[ ... ]]>`, payload excludes the delimiters
    #[token("<![CDATA[", cdata)]
    CData(&'src str),

    /// `<!DOCTYPE ...>`, payload excludes the delimiters
    #[token("<!DOCTYPE", doctype)]
    Doctype(&'src str),

    /// `<name attr="value" ...>` or `<name .../>`
    #[regex(r#"<[A-Za-z_:]([^<>"']|"[^"]*"|'[^']*')*>"#, |lex| lex.slice())]
    StartTag(&'src str),

    /// `</name>`
    #[regex(r"</[^<>]+>", |lex| lex.slice())]
    EndTag(&'src str),

    /// Raw character data (entities not yet decoded)
    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

fn until<'src>(lex: &mut Lexer<'src, Token<'src>>, close: &str) -> Option<&'src str> {
    let remainder = lex.remainder();
    let end = remainder.find(close)?;
    lex.bump(end + close.len());
    Some(&remainder[..end])
}

fn processing_instruction<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    until(lex, "?>")
}

fn comment<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    until(lex, "-->")
}

fn cdata<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    until(lex, "]]>")
}

fn doctype<'src>(lex: &mut Lexer<'src, Token<'src>>) -> Option<&'src str> {
    until(lex, ">")
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::ProcessingInstruction(s) => write!(f, "processing instruction '{}'", s),
            Token::Comment(_) => write!(f, "comment"),
            Token::CData(_) => write!(f, "CDATA section"),
            Token::Doctype(_) => write!(f, "DOCTYPE"),
            Token::StartTag(s) => write!(f, "start tag {}", s),
            Token::EndTag(s) => write!(f, "end tag {}", s),
            Token::Text(_) => write!(f, "text"),
        }
    }
}

/// Tokenize an XML source string
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, std::ops::Range<usize>)>> {
    let lexer = Token::lexer(source);
    lexer
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(()) => Err(ParseError::lexer_error(span.start)),
        })
        .collect()
}

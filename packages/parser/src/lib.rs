//! # Redline Parser
//!
//! Lossless XML layer for the parts of a word-processing package.
//!
//! ```text
//! part bytes ─▶ tokenizer (logos) ─▶ parser ─▶ XmlDocument ─▶ serializer ─▶ part bytes
//! ```

pub mod tokenizer;
pub mod parser;
pub mod ast;
pub mod error;
pub mod serializer;

pub use ast::{Attribute, NodePath, XmlDocument, XmlElement, XmlNode};
pub use tokenizer::{Token, tokenize};
pub use parser::{Parser, parse, parse_bytes};
pub use serializer::{Serializer, serialize};
pub use error::{ParseError, ParseResult};

//! Error types for the editor

use redline_common::ErrorKind;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Parse error: {0}")]
    Parse(#[from] redline_parser::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Package is missing required part {0}")]
    MissingPart(String),

    #[error("Text not found: {text:?} (occurrence {occurrence}, {found} found)")]
    TextNotFound {
        text: String,
        occurrence: usize,
        found: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(u32),

    #[error("Comment not found: {0}")]
    CommentNotFound(u32),

    #[error("Paragraph index {0} out of range")]
    ParagraphOutOfRange(usize),

    #[error("Document is not file-backed")]
    NotFileBacked,
}

impl EditorError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EditorError::Parse(_)
            | EditorError::Io(_)
            | EditorError::Zip(_)
            | EditorError::MissingPart(_) => ErrorKind::IoFailure,
            EditorError::Mutation(err) => err.kind(),
            EditorError::TextNotFound { .. }
            | EditorError::RevisionNotFound(_)
            | EditorError::CommentNotFound(_)
            | EditorError::ParagraphOutOfRange(_) => ErrorKind::NotFound,
            EditorError::InvalidInput(_) | EditorError::NotFileBacked => ErrorKind::InvalidInput,
        }
    }
}

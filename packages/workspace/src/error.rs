use std::path::PathBuf;

use redline_common::{CommonError, ErrorKind};
use redline_editor::EditorError;
use thiserror::Error;

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document is not open: {}", .0.display())]
    NotOpen(PathBuf),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("{} changed on disk since it was loaded; reload it or force a save", .path.display())]
    StaleState { path: PathBuf },

    #[error("Invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl WorkspaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::Editor(err) => err.kind(),
            WorkspaceError::Common(err) => err.kind(),
            WorkspaceError::Io(_) => ErrorKind::IoFailure,
            WorkspaceError::NotOpen(_) | WorkspaceError::FileNotFound(_) => ErrorKind::NotFound,
            WorkspaceError::StaleState { .. } => ErrorKind::StaleState,
            WorkspaceError::Config { .. } => ErrorKind::InvalidInput,
        }
    }
}

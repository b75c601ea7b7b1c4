//! # Redline Workspace
//!
//! Session layer over the editor: a bounded cache of open documents keyed by
//! canonical path, external-modification checks, session author resolution
//! and the configuration file.

pub mod author;
pub mod cache;
pub mod config;
pub mod error;
pub mod workspace;

pub use author::{AuthorResolver, EnvLookup, ResolvedAuthor};
pub use cache::{CachedDocument, DiscardOutcome, DocumentCache, ShutdownReport};
pub use config::{WorkspaceConfig, DEFAULT_CONFIG_NAME};
pub use error::{WorkspaceError, WorkspaceResult};
pub use workspace::{OpenOutcome, Workspace};

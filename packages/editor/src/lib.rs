//! # Redline Editor
//!
//! Revision-aware editing engine for Word documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: package part bytes → XML tree       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document lifecycle + tracked edits  │
//! │  - Open/save zip packages                   │
//! │  - Text map per paragraph                   │
//! │  - Match across run and revision boundaries │
//! │  - Split, wrap and retract nodes            │
//! │  - Accept/reject revisions, comments        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ workspace: cache, staleness, session author │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Tree is source of truth**: text maps are derived and rebuilt per call
//! 2. **Visible text**: pending insertions count, pending deletions do not
//! 3. **Flat revisions**: a deletion never nests inside an insertion
//! 4. **All or nothing**: a failed edit leaves the document untouched
//!
//! ## Usage
//!
//! ```rust,ignore
//! use redline_editor::{Document, EditMode};
//!
//! let mut doc = Document::open("contract.docx", "Reviewer")?;
//!
//! // Tracked replacement, even across existing revisions
//! doc.replace("thirty days", "sixty days", 1, EditMode::Atomic)?;
//!
//! // Fold everything back into plain text
//! doc.accept_all(None);
//!
//! doc.save()?;
//! ```

mod comments;
mod document;
mod errors;
mod id_generator;
mod matcher;
mod mutations;
mod package;
mod revisions;
mod text_map;
mod tree;

pub use comments::{Comment, CommentReply, CommentStore, COMMENTS_EXTENDED_PART, COMMENTS_PART};
pub use document::{Document, DocumentStorage};
pub use errors::{EditorError, EditorResult};
pub use id_generator::{get_document_seed, IDGenerator, RevisionIds};
pub use matcher::{find_offsets, resolve_segments, Match, Matcher, Segment, SplitPoint};
pub use mutations::{format_date, ChangeSet, EditMode, MutationError, Mutator, RevisionStamp};
pub use package::{Package, PackageEntry, DOCUMENT_PART};
pub use revisions::{parse_date, Revision, RevisionKind, Resolution};
pub use text_map::{RevisionContext, TextMap, TextNode, TextPosition};
pub use tree::DocumentTree;

// Re-export common types for convenience
pub use redline_common::ErrorKind;
pub use redline_parser::{NodePath, XmlDocument, XmlElement};

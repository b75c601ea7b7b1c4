//! # Document Handle
//!
//! Core document abstraction for tracked-change editing.
//!
//! A Document represents a single `.docx` package and its editing state.
//! Documents can be:
//! - **Memory-backed**: built from body XML, for tests and scratch edits
//! - **File-backed**: opened from disk and saved back in place
//!
//! ## Lifecycle
//!
//! ```text
//! Open → Parse → Match → Mutate → Save
//!   ↓      ↓       ↓        ↓       ↓
//! Zip    Tree   TextMap  Wrappers  Zip
//! ```
//!
//! Every editing call works on a clone of the target paragraph and swaps it
//! in only when the whole edit succeeded, so a failed call leaves the tree
//! and the revision id counter exactly as they were.

use std::path::{Path, PathBuf};

use redline_parser::{NodePath, XmlElement};

use crate::comments::{self, Comment, CommentStore};
use crate::errors::{EditorError, EditorResult};
use crate::id_generator::RevisionIds;
use crate::matcher::{Match, Matcher};
use crate::mutations::{ChangeSet, EditMode, MutationError, Mutator, RevisionStamp};
use crate::package::{Package, DOCUMENT_PART};
use crate::revisions::{self, Resolution, Revision};
use crate::text_map::TextMap;
use crate::tree::{is_comment_marker, DocumentTree};

/// Editable Word document
#[derive(Debug, Clone)]
pub struct Document {
    /// Path of the package on disk (a label for memory-backed documents)
    pub path: PathBuf,

    /// Current version number (increments on each successful edit)
    pub version: u64,

    author: String,
    package: Package,
    tree: DocumentTree,
    comments: Option<CommentStore>,
    revision_ids: RevisionIds,
    dirty: bool,

    /// Backing storage strategy
    storage: DocumentStorage,
}

/// Storage backend for document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStorage {
    /// In-memory only; `save` is refused until `save_as` gives it a home
    Memory,

    /// Opened from, and saved back to, `Document::path`
    File,
}

impl Document {
    /// Load a package from disk (file-backed)
    pub fn open(path: impl Into<PathBuf>, author: &str) -> EditorResult<Self> {
        let path = path.into();
        tracing::info!(path = %path.display(), author, "opening document");
        let package = Package::read(&path)?;
        Self::from_package(path, package, author, DocumentStorage::File)
    }

    /// Wrap body XML in a minimal package (memory-backed)
    pub fn from_xml(path: impl Into<PathBuf>, document_xml: &str, author: &str) -> EditorResult<Self> {
        let package = Package::minimal(document_xml);
        Self::from_package(path.into(), package, author, DocumentStorage::Memory)
    }

    fn from_package(path: PathBuf, package: Package, author: &str, storage: DocumentStorage) -> EditorResult<Self> {
        let bytes = package
            .get(DOCUMENT_PART)
            .ok_or_else(|| EditorError::MissingPart(DOCUMENT_PART.to_string()))?;
        let tree = DocumentTree::parse(DOCUMENT_PART, bytes)?;
        let seed = path.to_string_lossy().into_owned();
        let comments = CommentStore::load(&package, &seed)?;

        // Comment markers live in their own id space
        let revision_ids = RevisionIds::starting_after(tree.max_id(|element| !is_comment_marker(element)));

        Ok(Self {
            path,
            version: 0,
            author: author.to_string(),
            package,
            tree,
            comments,
            revision_ids,
            dirty: false,
            storage,
        })
    }

    pub fn storage(&self) -> DocumentStorage {
        self.storage
    }

    /// Check if document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag changes made outside the editing calls
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Author stamped on subsequent revisions and comments
    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Package with the current body and comments written into it
    pub fn to_package(&self) -> EditorResult<Package> {
        let mut package = self.package.clone();
        package.set(DOCUMENT_PART, self.tree.to_xml_string().into_bytes());
        if let Some(comments) = &self.comments {
            comments.write_into(&mut package)?;
        }
        Ok(package)
    }

    pub fn to_bytes(&self) -> EditorResult<Vec<u8>> {
        self.to_package()?.to_bytes()
    }

    /// Save document to disk (if file-backed)
    pub fn save(&mut self) -> EditorResult<()> {
        if self.storage != DocumentStorage::File {
            return Err(EditorError::NotFileBacked);
        }
        let path = self.path.clone();
        self.write(&path)
    }

    /// Save to `path` and make it the document's home
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> EditorResult<()> {
        let path = path.into();
        self.write(&path)?;
        self.path = path;
        self.storage = DocumentStorage::File;
        Ok(())
    }

    fn write(&mut self, path: &Path) -> EditorResult<()> {
        let package = self.to_package()?;
        package.write(path)?;
        self.package = package;
        self.dirty = false;
        tracing::info!(path = %path.display(), version = self.version, "saved document");
        Ok(())
    }

    pub fn paragraph_count(&self) -> usize {
        self.tree.paragraph_paths().len()
    }

    /// Visible text of one paragraph
    pub fn paragraph_text(&self, index: usize) -> EditorResult<String> {
        let paths = self.tree.paragraph_paths();
        paths
            .get(index)
            .and_then(|path| self.tree.paragraph(path))
            .map(|paragraph| TextMap::build(paragraph).text().to_string())
            .ok_or(EditorError::ParagraphOutOfRange(index))
    }

    /// Visible text of the whole body, one line per paragraph
    pub fn get_visible_text(&self) -> String {
        self.tree
            .paragraph_paths()
            .iter()
            .filter_map(|path| self.tree.paragraph(path))
            .map(|paragraph| TextMap::build(paragraph).text().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn find(&self, text: &str, occurrence: usize) -> EditorResult<Match> {
        Matcher::new(&self.tree).find(text, occurrence)
    }

    pub fn find_all(&self, text: &str) -> EditorResult<Vec<Match>> {
        Matcher::new(&self.tree).find_all(text)
    }

    pub fn count(&self, text: &str) -> EditorResult<usize> {
        Matcher::new(&self.tree).count(text)
    }

    /// Replace the `occurrence`-th match of `old` with `new` as tracked changes
    pub fn replace(&mut self, old: &str, new: &str, occurrence: usize, mode: EditMode) -> EditorResult<ChangeSet> {
        let found = self.find(old, occurrence)?;
        Mutator::check_mode(&found, mode)?;
        tracing::debug!(old, new, occurrence, ?mode, segments = found.segments.len(), "replacing");
        self.edit_paragraph(&found.paragraph, |mutator, paragraph| {
            mutator.replace(paragraph, &found, Some(new))
        })
    }

    /// Mark the `occurrence`-th match of `text` as deleted
    pub fn delete(&mut self, text: &str, occurrence: usize, mode: EditMode) -> EditorResult<ChangeSet> {
        let found = self.find(text, occurrence)?;
        Mutator::check_mode(&found, mode)?;
        tracing::debug!(text, occurrence, ?mode, segments = found.segments.len(), "deleting");
        self.edit_paragraph(&found.paragraph, |mutator, paragraph| mutator.replace(paragraph, &found, None))
    }

    /// Insert `text` right after the `occurrence`-th match of `anchor`
    pub fn insert_after(&mut self, anchor: &str, text: &str, occurrence: usize) -> EditorResult<ChangeSet> {
        self.insert(anchor, text, occurrence, Match::point_after)
    }

    /// Insert `text` right before the `occurrence`-th match of `anchor`
    pub fn insert_before(&mut self, anchor: &str, text: &str, occurrence: usize) -> EditorResult<ChangeSet> {
        self.insert(anchor, text, occurrence, Match::point_before)
    }

    fn insert<F>(&mut self, anchor: &str, text: &str, occurrence: usize, point: F) -> EditorResult<ChangeSet>
    where
        F: Fn(&Match) -> Option<crate::matcher::SplitPoint>,
    {
        if text.is_empty() {
            return Err(EditorError::invalid_input("inserted text must not be empty"));
        }
        let found = self.find(anchor, occurrence)?;
        let point = point(&found).ok_or_else(|| EditorError::invalid_input("anchor resolved to no text"))?;
        tracing::debug!(anchor, text, occurrence, offset = point.offset, "inserting");
        self.edit_paragraph(&found.paragraph, |mutator, paragraph| mutator.insert_at(paragraph, &point, text))
    }

    /// Run one edit against a scratch copy of a paragraph and commit it on success
    fn edit_paragraph<F>(&mut self, path: &NodePath, edit: F) -> EditorResult<ChangeSet>
    where
        F: FnOnce(&mut Mutator<'_>, &mut XmlElement) -> Result<ChangeSet, MutationError>,
    {
        let mut paragraph = self
            .tree
            .paragraph(path)
            .cloned()
            .ok_or_else(|| MutationError::InvariantViolation(format!("no paragraph at {:?}", path)))?;
        let stamp = RevisionStamp::now(&self.author);
        let mut ids = self.revision_ids;

        let changes = edit(&mut Mutator::new(&stamp, &mut ids), &mut paragraph)?;

        let target = self
            .tree
            .paragraph_mut(path)
            .ok_or_else(|| MutationError::InvariantViolation(format!("no paragraph at {:?}", path)))?;
        *target = paragraph;
        self.revision_ids = ids;
        self.touch();
        Ok(changes)
    }

    fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }

    pub fn list_revisions(&self, author: Option<&str>) -> Vec<Revision> {
        revisions::list_revisions(&self.tree, author)
    }

    pub fn accept_revision(&mut self, id: u32) -> EditorResult<Revision> {
        let revision = revisions::resolve_revision(&mut self.tree, id, Resolution::Accept)?;
        self.touch();
        Ok(revision)
    }

    pub fn reject_revision(&mut self, id: u32) -> EditorResult<Revision> {
        let revision = revisions::resolve_revision(&mut self.tree, id, Resolution::Reject)?;
        self.touch();
        Ok(revision)
    }

    /// Accept every revision, or only `author`'s
    pub fn accept_all(&mut self, author: Option<&str>) -> Vec<Revision> {
        self.resolve_all(author, Resolution::Accept)
    }

    /// Reject every revision, or only `author`'s
    pub fn reject_all(&mut self, author: Option<&str>) -> Vec<Revision> {
        self.resolve_all(author, Resolution::Reject)
    }

    fn resolve_all(&mut self, author: Option<&str>, resolution: Resolution) -> Vec<Revision> {
        let resolved = revisions::resolve_all(&mut self.tree, author, resolution);
        if !resolved.is_empty() {
            tracing::debug!(count = resolved.len(), ?resolution, "resolved revisions");
            self.touch();
        }
        resolved
    }

    /// Comment on the `occurrence`-th match of `anchor`
    pub fn add_comment(&mut self, anchor: &str, text: &str, occurrence: usize) -> EditorResult<u32> {
        let found = self.find(anchor, occurrence)?;
        let stamp = RevisionStamp::now(&self.author);
        let seed = self.path.to_string_lossy().into_owned();

        let mut tree = self.tree.clone();
        let mut store = self.comments.clone().unwrap_or_else(|| CommentStore::new(&seed));
        let id = comments::add_comment(&mut tree, &mut store, &found, text, &stamp)?;

        self.tree = tree;
        self.comments = Some(store);
        self.touch();
        Ok(id)
    }

    pub fn list_comments(&self, author: Option<&str>) -> Vec<Comment> {
        self.comments
            .as_ref()
            .map(|store| comments::list_comments(&self.tree, store, author))
            .unwrap_or_default()
    }

    pub fn reply_to_comment(&mut self, parent: u32, text: &str) -> EditorResult<u32> {
        let stamp = RevisionStamp::now(&self.author);
        let mut tree = self.tree.clone();
        let mut store = self.comments.clone().ok_or(EditorError::CommentNotFound(parent))?;
        let id = comments::reply_to_comment(&mut tree, &mut store, parent, text, &stamp)?;

        self.tree = tree;
        self.comments = Some(store);
        self.touch();
        Ok(id)
    }

    pub fn resolve_comment(&mut self, id: u32) -> EditorResult<()> {
        let store = self.comments.as_mut().ok_or(EditorError::CommentNotFound(id))?;
        comments::resolve_comment(store, id)?;
        self.touch();
        Ok(())
    }

    /// Delete a comment and its replies; returns every removed id
    pub fn delete_comment(&mut self, id: u32) -> EditorResult<Vec<u32>> {
        let mut tree = self.tree.clone();
        let mut store = self.comments.clone().ok_or(EditorError::CommentNotFound(id))?;
        let removed = comments::delete_comment(&mut tree, &mut store, id)?;

        self.tree = tree;
        self.comments = Some(store);
        self.touch();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_map::RevisionContext;

    fn body(paragraphs: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            paragraphs
        )
    }

    fn document(paragraphs: &str) -> Document {
        Document::from_xml("test.docx", &body(paragraphs), "Tester").unwrap()
    }

    #[test]
    fn test_create_memory_document() {
        let doc = document(r#"<w:p><w:r><w:t>one</w:t></w:r></w:p><w:p><w:r><w:t>two</w:t></w:r></w:p>"#);
        assert_eq!(doc.version, 0);
        assert!(!doc.is_dirty());
        assert_eq!(doc.storage(), DocumentStorage::Memory);
        assert_eq!(doc.paragraph_count(), 2);
        assert_eq!(doc.paragraph_text(1).unwrap(), "two");
        assert!(matches!(doc.paragraph_text(2), Err(EditorError::ParagraphOutOfRange(2))));
        assert_eq!(doc.get_visible_text(), "one\ntwo");
    }

    #[test]
    fn test_document_version_increments() {
        let mut doc = document(r#"<w:p><w:r><w:t>Hello world</w:t></w:r></w:p>"#);
        let changes = doc.replace("world", "there", 1, EditMode::Atomic).unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.is_dirty());
        assert_eq!(changes.deletions, vec![1]);
        assert_eq!(changes.insertion, Some(2));
        assert_eq!(changes.change_id(), Some(2));
        assert_eq!(doc.get_visible_text(), "Hello there");
    }

    #[test]
    fn test_new_ids_follow_existing_revisions() {
        let mut doc = document(
            r#"<w:p><w:ins w:id="41" w:author="A"><w:r><w:t>new </w:t></w:r></w:ins><w:r><w:t>text</w:t></w:r><w:commentRangeStart w:id="90"/></w:p>"#,
        );
        let changes = doc.delete("text", 1, EditMode::Atomic).unwrap();
        assert_eq!(changes.deletions, vec![42]);
    }

    #[test]
    fn test_failed_edit_leaves_document_untouched() {
        let mut doc = document(
            r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:ins w:id="1" w:author="A"><w:r><w:t>world</w:t></w:r></w:ins></w:p>"#,
        );
        let before = doc.tree().clone();

        let err = doc.replace("Hello world", "Hi", 1, EditMode::Strict).unwrap_err();
        assert_eq!(err.kind(), redline_common::ErrorKind::BoundaryConflict);
        let err = doc.replace("absent", "x", 1, EditMode::Atomic).unwrap_err();
        assert!(matches!(err, EditorError::TextNotFound { found: 0, .. }));
        let err = doc.insert_after("Hello", "", 1).unwrap_err();
        assert!(matches!(err, EditorError::InvalidInput(_)));

        assert_eq!(doc.tree(), &before);
        assert_eq!(doc.version, 0);
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut doc = document(r#"<w:p><w:r><w:t>middle</w:t></w:r></w:p>"#);
        doc.insert_before("middle", "start ", 1).unwrap();
        doc.insert_after("middle", " end", 1).unwrap();
        assert_eq!(doc.get_visible_text(), "start middle end");

        let found = doc.find("start middle end", 1).unwrap();
        let contexts: Vec<_> = found.segments.iter().map(|s| s.context).collect();
        assert_eq!(
            contexts,
            vec![RevisionContext::Insertion, RevisionContext::Regular, RevisionContext::Insertion]
        );
    }

    #[test]
    fn test_save_requires_file_backing() {
        let mut doc = document(r#"<w:p><w:r><w:t>x</w:t></w:r></w:p>"#);
        assert!(matches!(doc.save(), Err(EditorError::NotFileBacked)));
    }

    #[test]
    fn test_accept_all_without_revisions_is_clean() {
        let mut doc = document(r#"<w:p><w:r><w:t>plain</w:t></w:r></w:p>"#);
        assert!(doc.accept_all(None).is_empty());
        assert!(doc.reject_all(Some("Nobody")).is_empty());
        assert!(!doc.is_dirty());
        assert_eq!(doc.version, 0);
    }

    #[test]
    fn test_comment_round_through_handle() {
        let mut doc = document(r#"<w:p><w:r><w:t>needs review</w:t></w:r></w:p>"#);
        assert!(doc.list_comments(None).is_empty());
        assert!(matches!(doc.resolve_comment(0), Err(EditorError::CommentNotFound(0))));

        let id = doc.add_comment("review", "Why?", 1).unwrap();
        let reply = doc.reply_to_comment(id, "Because.").unwrap();
        doc.resolve_comment(id).unwrap();

        let listed = doc.list_comments(None);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].anchor_text.as_deref(), Some("review"));
        assert!(listed[0].resolved);
        assert_eq!(listed[0].replies.len(), 1);
        assert_eq!(listed[0].replies[0].id, reply);
        assert_eq!(doc.get_visible_text(), "needs review");

        assert_eq!(doc.delete_comment(id).unwrap(), vec![id, reply]);
        assert!(doc.list_comments(None).is_empty());
    }
}

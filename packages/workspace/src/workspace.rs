//! Path-addressed operation surface over the document cache.
//!
//! Every operation names a document by path and loads it on first use with
//! the session author. Reads never check the disk; edits, saves and comment
//! changes fail with `StaleState` when the file changed since it was loaded.

use std::path::{Path, PathBuf};

use redline_common::FileSystem;
use redline_editor::{ChangeSet, Comment, Document, EditMode, Match, Revision};
use serde::Serialize;

use crate::author::{AuthorResolver, ResolvedAuthor};
use crate::cache::{DiscardOutcome, DocumentCache, ShutdownReport};
use crate::config::WorkspaceConfig;
use crate::error::WorkspaceResult;

/// Result of opening a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOutcome {
    pub path: PathBuf,
    pub author: String,
    /// Already resident before this call
    pub cached: bool,
    pub paragraphs: usize,
    /// Set when the author was not chosen by anyone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub struct Workspace {
    config: WorkspaceConfig,
    authors: AuthorResolver,
    cache: DocumentCache,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        let authors = AuthorResolver::new(&config);
        let cache = DocumentCache::new(config.max_documents);
        Self { config, authors, cache }
    }

    /// Workspace configured from `redline.config.json` in `dir`, if present
    pub fn load(dir: &Path) -> WorkspaceResult<Self> {
        Ok(Self::new(WorkspaceConfig::load(dir)?))
    }

    pub fn with_parts(config: WorkspaceConfig, authors: AuthorResolver, fs: Box<dyn FileSystem>) -> Self {
        let cache = DocumentCache::with_fs(config.max_documents, fs);
        Self { config, authors, cache }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Author an operation without an explicit name would use
    pub fn current_author(&self) -> ResolvedAuthor {
        self.authors.current()
    }

    pub fn open(&mut self, path: &Path, author: Option<&str>) -> WorkspaceResult<OpenOutcome> {
        let resolved = self.authors.resolve(author);
        let cached = self.cache.contains(path);
        let entry = self.cache.resolve_or_load(path, &resolved.name)?;
        if author.is_some() {
            entry.document.set_author(resolved.name.as_str());
        }

        let hint = resolved.is_default.then(|| {
            format!(
                "Edits will be attributed to {:?}; pass an author to change it",
                resolved.name
            )
        });
        tracing::info!(path = %entry.path.display(), author = %entry.document.author(), cached, "opened");
        Ok(OpenOutcome {
            path: entry.path.clone(),
            author: entry.document.author().to_string(),
            cached,
            paragraphs: entry.document.paragraph_count(),
            hint,
        })
    }

    pub fn save(&mut self, path: &Path) -> WorkspaceResult<()> {
        self.cache.save(path)
    }

    pub fn force_save(&mut self, path: &Path) -> WorkspaceResult<()> {
        self.cache.force_save(path)
    }

    pub fn close(&mut self, path: &Path) -> WorkspaceResult<DiscardOutcome> {
        self.cache.close(path)
    }

    pub fn reload(&mut self, path: &Path) -> WorkspaceResult<DiscardOutcome> {
        self.cache.reload(path)
    }

    pub fn shutdown(&mut self) -> ShutdownReport {
        self.cache.shutdown()
    }

    fn read(&mut self, path: &Path) -> WorkspaceResult<&mut Document> {
        let author = self.authors.current().name;
        Ok(&mut self.cache.resolve_or_load(path, &author)?.document)
    }

    fn write(&mut self, path: &Path) -> WorkspaceResult<&mut Document> {
        let author = self.authors.current().name;
        Ok(&mut self.cache.resolve_fresh(path, &author)?.document)
    }

    pub fn find(&mut self, path: &Path, text: &str, occurrence: usize) -> WorkspaceResult<Match> {
        Ok(self.read(path)?.find(text, occurrence)?)
    }

    pub fn count(&mut self, path: &Path, text: &str) -> WorkspaceResult<usize> {
        Ok(self.read(path)?.count(text)?)
    }

    pub fn get_visible_text(&mut self, path: &Path) -> WorkspaceResult<String> {
        Ok(self.read(path)?.get_visible_text())
    }

    /// Replace with the given mode, or the configured one
    pub fn replace(
        &mut self,
        path: &Path,
        old: &str,
        new: &str,
        occurrence: usize,
        mode: Option<EditMode>,
    ) -> WorkspaceResult<ChangeSet> {
        let mode = mode.unwrap_or(self.config.edit_mode);
        Ok(self.write(path)?.replace(old, new, occurrence, mode)?)
    }

    pub fn delete(&mut self, path: &Path, text: &str, occurrence: usize, mode: Option<EditMode>) -> WorkspaceResult<ChangeSet> {
        let mode = mode.unwrap_or(self.config.edit_mode);
        Ok(self.write(path)?.delete(text, occurrence, mode)?)
    }

    pub fn insert_after(&mut self, path: &Path, anchor: &str, text: &str, occurrence: usize) -> WorkspaceResult<ChangeSet> {
        Ok(self.write(path)?.insert_after(anchor, text, occurrence)?)
    }

    pub fn insert_before(&mut self, path: &Path, anchor: &str, text: &str, occurrence: usize) -> WorkspaceResult<ChangeSet> {
        Ok(self.write(path)?.insert_before(anchor, text, occurrence)?)
    }

    pub fn list_revisions(&mut self, path: &Path, author: Option<&str>) -> WorkspaceResult<Vec<Revision>> {
        Ok(self.read(path)?.list_revisions(author))
    }

    pub fn accept_revision(&mut self, path: &Path, id: u32) -> WorkspaceResult<Revision> {
        Ok(self.write(path)?.accept_revision(id)?)
    }

    pub fn reject_revision(&mut self, path: &Path, id: u32) -> WorkspaceResult<Revision> {
        Ok(self.write(path)?.reject_revision(id)?)
    }

    pub fn accept_all(&mut self, path: &Path, author: Option<&str>) -> WorkspaceResult<Vec<Revision>> {
        Ok(self.write(path)?.accept_all(author))
    }

    pub fn reject_all(&mut self, path: &Path, author: Option<&str>) -> WorkspaceResult<Vec<Revision>> {
        Ok(self.write(path)?.reject_all(author))
    }

    pub fn add_comment(&mut self, path: &Path, anchor: &str, text: &str, occurrence: usize) -> WorkspaceResult<u32> {
        Ok(self.write(path)?.add_comment(anchor, text, occurrence)?)
    }

    pub fn list_comments(&mut self, path: &Path, author: Option<&str>) -> WorkspaceResult<Vec<Comment>> {
        Ok(self.read(path)?.list_comments(author))
    }

    pub fn reply_to_comment(&mut self, path: &Path, parent: u32, text: &str) -> WorkspaceResult<u32> {
        Ok(self.write(path)?.reply_to_comment(parent, text)?)
    }

    pub fn resolve_comment(&mut self, path: &Path, id: u32) -> WorkspaceResult<()> {
        Ok(self.write(path)?.resolve_comment(id)?)
    }

    pub fn delete_comment(&mut self, path: &Path, id: u32) -> WorkspaceResult<Vec<u32>> {
        Ok(self.write(path)?.delete_comment(id)?)
    }
}

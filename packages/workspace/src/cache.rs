//! # Document Cache
//!
//! Bounded set of resident documents keyed by canonical path.
//!
//! ```text
//! miss → load → [resident] ── touch on every access
//!                   │
//!     over capacity │ least recent: save if dirty, then drop
//!                   ↓
//!               [evicted]
//! ```
//!
//! Each entry remembers the file's modification time as of its last load or
//! save. A different time on disk means someone else wrote the file; writes
//! are refused until the caller reloads or forces. Timestamps are a
//! heuristic: two writes inside the filesystem's time resolution look the same.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use redline_common::{normalize_path, FileSystem, RealFileSystem};
use redline_editor::Document;
use serde::Serialize;

use crate::error::{WorkspaceError, WorkspaceResult};

/// A resident document with its freshness bookkeeping
#[derive(Debug)]
pub struct CachedDocument {
    /// Canonical path, also the cache key
    pub path: PathBuf,
    pub document: Document,
    mtime: Option<SystemTime>,
    last_access: u64,
}

impl CachedDocument {
    /// Modification time observed at the last load or save
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    pub fn last_access(&self) -> u64 {
        self.last_access
    }
}

/// What happened to in-memory changes when a document left the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardOutcome {
    pub path: PathBuf,
    pub discarded_changes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct DocumentCache {
    capacity: usize,
    entries: HashMap<PathBuf, CachedDocument>,
    clock: u64,
    fs: Box<dyn FileSystem>,
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_fs(capacity, Box::new(RealFileSystem))
    }

    pub fn with_fs(capacity: usize, fs: Box<dyn FileSystem>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
            fs,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical cache key for any spelling of a path
    pub fn normalize(&self, path: &Path) -> WorkspaceResult<PathBuf> {
        Ok(normalize_path(self.fs.as_ref(), path)?)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.normalize(path)
            .map(|key| self.entries.contains_key(&key))
            .unwrap_or(false)
    }

    /// Resident paths, most recently used first
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| b.last_access.cmp(&a.last_access));
        entries.into_iter().map(|entry| entry.path.clone()).collect()
    }

    /// Look up a resident document without loading
    pub fn get(&mut self, path: &Path) -> WorkspaceResult<&mut CachedDocument> {
        let key = self.normalize(path)?;
        self.touch(&key).ok_or(WorkspaceError::NotOpen(key))
    }

    /// Return the resident document, loading it on a miss
    pub fn resolve_or_load(&mut self, path: &Path, author: &str) -> WorkspaceResult<&mut CachedDocument> {
        let key = self.normalize(path)?;
        if !self.entries.contains_key(&key) {
            self.load(key.clone(), author)?;
        }
        self.touch(&key).ok_or(WorkspaceError::NotOpen(key))
    }

    /// Like [`resolve_or_load`](Self::resolve_or_load), but a resident
    /// document must still match the file on disk
    pub fn resolve_fresh(&mut self, path: &Path, author: &str) -> WorkspaceResult<&mut CachedDocument> {
        let key = self.normalize(path)?;
        if self.entries.contains_key(&key) {
            self.check_fresh(&key)?;
        } else {
            self.load(key.clone(), author)?;
        }
        self.touch(&key).ok_or(WorkspaceError::NotOpen(key))
    }

    fn touch(&mut self, key: &Path) -> Option<&mut CachedDocument> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.get_mut(key)?;
        entry.last_access = clock;
        Some(entry)
    }

    fn load(&mut self, key: PathBuf, author: &str) -> WorkspaceResult<()> {
        if !self.fs.exists(&key) {
            return Err(WorkspaceError::FileNotFound(key));
        }
        let mtime = self.fs.modified(&key).ok();
        let document = Document::open(&key, author)?;

        self.make_room();
        self.entries.insert(
            key.clone(),
            CachedDocument {
                path: key,
                document,
                mtime,
                last_access: self.clock,
            },
        );
        Ok(())
    }

    fn make_room(&mut self) {
        let mut candidates: Vec<(u64, PathBuf)> = self
            .entries
            .values()
            .map(|entry| (entry.last_access, entry.path.clone()))
            .collect();
        candidates.sort();

        // Entries whose save fails stay; if none can go the cache runs over capacity
        for (_, key) in candidates {
            if self.entries.len() < self.capacity {
                break;
            }
            let _ = self.evict_key(&key);
        }
    }

    /// Whether the file on disk changed since the entry last saw it
    pub fn is_stale(&self, path: &Path) -> WorkspaceResult<bool> {
        let key = self.normalize(path)?;
        let entry = self.entries.get(&key).ok_or_else(|| WorkspaceError::NotOpen(key.clone()))?;
        Ok(self.fs.modified(&key).ok() != entry.mtime)
    }

    fn check_fresh(&self, key: &Path) -> WorkspaceResult<()> {
        if self.is_stale(key)? {
            tracing::warn!(path = %key.display(), "document changed on disk since it was loaded");
            return Err(WorkspaceError::StaleState { path: key.to_path_buf() });
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, path: &Path) -> WorkspaceResult<()> {
        self.get(path)?.document.mark_dirty();
        Ok(())
    }

    /// Save a resident document; refused if the file changed underneath it
    pub fn save(&mut self, path: &Path) -> WorkspaceResult<()> {
        let key = self.normalize(path)?;
        self.check_fresh(&key)?;
        self.write(&key)
    }

    /// Save regardless of on-disk changes and adopt the new timestamp
    pub fn force_save(&mut self, path: &Path) -> WorkspaceResult<()> {
        let key = self.normalize(path)?;
        self.write(&key)
    }

    fn write(&mut self, key: &Path) -> WorkspaceResult<()> {
        let entry = self.touch(key).ok_or_else(|| WorkspaceError::NotOpen(key.to_path_buf()))?;
        entry.document.save()?;
        let mtime = self.fs.modified(key).ok();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.mtime = mtime;
        }
        Ok(())
    }

    /// Drop a document from the cache, saving it first if dirty
    pub fn evict(&mut self, path: &Path) -> WorkspaceResult<()> {
        let key = self.normalize(path)?;
        self.evict_key(&key)
    }

    fn evict_key(&mut self, key: &Path) -> WorkspaceResult<()> {
        let dirty = self
            .entries
            .get(key)
            .ok_or_else(|| WorkspaceError::NotOpen(key.to_path_buf()))?
            .document
            .is_dirty();
        if dirty {
            if let Err(err) = self.save(key) {
                tracing::error!(path = %key.display(), error = %err, "could not save evicted document; keeping it resident");
                return Err(err);
            }
        }
        self.entries.remove(key);
        tracing::info!(path = %key.display(), saved = dirty, "evicted document");
        Ok(())
    }

    /// Drop a document without saving
    pub fn close(&mut self, path: &Path) -> WorkspaceResult<DiscardOutcome> {
        let key = self.normalize(path)?;
        let entry = self.entries.remove(&key).ok_or_else(|| WorkspaceError::NotOpen(key.clone()))?;
        let discarded_changes = entry.document.is_dirty();
        if discarded_changes {
            tracing::warn!(path = %key.display(), "closed with unsaved changes; they are discarded");
        } else {
            tracing::info!(path = %key.display(), "closed document");
        }
        Ok(DiscardOutcome {
            path: key,
            discarded_changes,
        })
    }

    /// Replace a resident document with a fresh load from disk.
    /// The previous entry survives if the file cannot be read.
    pub fn reload(&mut self, path: &Path) -> WorkspaceResult<DiscardOutcome> {
        let key = self.normalize(path)?;
        let entry = self.entries.get(&key).ok_or_else(|| WorkspaceError::NotOpen(key.clone()))?;
        let discarded_changes = entry.document.is_dirty();
        let author = entry.document.author().to_string();

        let mtime = self.fs.modified(&key).ok();
        let document = Document::open(&key, &author)?;
        if let Some(entry) = self.touch(&key) {
            entry.document = document;
            entry.mtime = mtime;
        }
        tracing::info!(path = %key.display(), discarded_changes, "reloaded document");
        Ok(DiscardOutcome {
            path: key,
            discarded_changes,
        })
    }

    /// Save every dirty document best-effort and empty the cache
    pub fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let mut dirty: Vec<PathBuf> = self
            .entries
            .values()
            .filter(|entry| entry.document.is_dirty())
            .map(|entry| entry.path.clone())
            .collect();
        dirty.sort();

        for key in dirty {
            match self.save(&key) {
                Ok(()) => report.saved.push(key),
                Err(err) => {
                    tracing::error!(path = %key.display(), error = %err, "could not save document on shutdown");
                    report.failed.push((key, err.to_string()));
                }
            }
        }
        self.entries.clear();
        report
    }
}

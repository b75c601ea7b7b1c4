use crate::error::CommonError;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// File system abstraction for path resolution and change detection
pub trait FileSystem {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Canonicalize a path (resolve symlinks, make absolute)
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error>;

    /// Last modification time of a file
    fn modified(&self, path: &Path) -> Result<SystemTime, std::io::Error>;
}

/// Real file system implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::canonicalize(path)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime, std::io::Error> {
        std::fs::metadata(path)?.modified()
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_user(path: &Path) -> Result<PathBuf, CommonError> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let home = dirs::home_dir()
                .ok_or_else(|| CommonError::NoHomeDirectory(path.display().to_string()))?;
            Ok(home.join(components.as_path()))
        }
        _ => Ok(path.to_path_buf()),
    }
}

/// Normalize a path to its absolute canonical form.
///
/// Expands `~`, makes the path absolute against the current directory and
/// follows symlinks. Paths that do not exist yet are lexically normalized
/// instead, so two spellings of the same missing file still agree.
pub fn normalize_path(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf, CommonError> {
    let expanded = expand_user(path)?;
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    match fs.canonicalize(&absolute) {
        Ok(canonical) => Ok(canonical),
        Err(_) => Ok(lexical_normalize(&absolute)),
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

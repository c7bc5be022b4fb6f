//! Confinement of caller-supplied document paths to one directory tree.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving a caller-supplied document path.
#[derive(Debug, Error)]
pub enum DocumentPathError {
    /// The documents directory itself could not be prepared.
    #[error("Documents root {path} is unusable: {source}")]
    Root {
        /// Configured root.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// The path does not exist or cannot be resolved.
    #[error("Document {0} not found")]
    NotFound(PathBuf),
    /// The path resolves outside the documents root.
    #[error("Document {0} is outside the documents root")]
    OutsideRoot(PathBuf),
}

/// Directory that remote callers may read documents from.
///
/// Relative paths are taken relative to the root. Every path is canonicalized, so `..`
/// components and symlinks cannot escape it.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// Create the directory when missing and pin its canonical location.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DocumentPathError> {
        let path = path.as_ref();
        let root_error = |source| DocumentPathError::Root {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(path).await.map_err(root_error)?;
        let root = tokio::fs::canonicalize(path).await.map_err(root_error)?;
        Ok(Self { root })
    }

    /// Canonical location of the root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` to a canonical path inside the root.
    pub async fn resolve(&self, requested: &Path) -> Result<PathBuf, DocumentPathError> {
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        if requested.is_relative()
            && requested
                .components()
                .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(DocumentPathError::OutsideRoot(requested.to_path_buf()));
        }

        let resolved = tokio::fs::canonicalize(&candidate).await.map_err(|_| {
            if candidate.starts_with(&self.root) {
                DocumentPathError::NotFound(requested.to_path_buf())
            } else {
                DocumentPathError::OutsideRoot(requested.to_path_buf())
            }
        })?;
        if !resolved.starts_with(&self.root) {
            return Err(DocumentPathError::OutsideRoot(requested.to_path_buf()));
        }
        Ok(resolved)
    }

    /// Resolve every path, failing on the first one that escapes the root.
    pub async fn resolve_all(&self, requested: &[PathBuf]) -> Result<Vec<PathBuf>, DocumentPathError> {
        let mut resolved = Vec::with_capacity(requested.len());
        for path in requested {
            resolved.push(self.resolve(path).await?);
        }
        Ok(resolved)
    }
}

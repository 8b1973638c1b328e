/**
 * Filesystem Mirror
 *
 * On-disk copy of stored file content, laid out as one subdirectory per
 * user identifier under a configurable root. The mirror is the fast path
 * for live edits: text files are read fresh from disk, and saves land
 * here first with durable-write verification before the content store is
 * updated.
 *
 * # Identity Sanitization
 *
 * User ids and relative paths are validated before any filesystem access.
 * Traversal segments (`..`), absolute paths, and backslashes are rejected
 * with `InvalidIdentity`, so a resolved path can never escape the owning
 * user's directory.
 *
 * # Durable Writes
 *
 * `write_verified` writes the file, forces it to stable storage with
 * fsync, reads it back, and compares byte-for-byte against the intended
 * content. A mismatch is a `WriteVerification` failure, never a silent
 * success.
 */

use crate::error::SyncError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Extensions treated as text; these are read fresh from the mirror on
/// join instead of being served from the store snapshot.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rs", "js", "jsx", "ts", "tsx", "py", "rb", "go", "java", "c",
    "cpp", "h", "hpp", "cs", "html", "htm", "css", "scss", "json", "yaml", "yml", "toml",
    "xml", "sh", "bash", "sql", "csv", "log", "ini", "env", "cfg", "conf",
];

/// Whether a file name classifies as text, by extension
///
/// Extensionless files count as text (dotfiles, Makefiles and the like).
pub fn is_text_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => true,
    }
}

/// Validate a user identifier before it becomes a directory name
pub fn sanitize_user_id(user_id: &str) -> Result<(), SyncError> {
    if user_id.is_empty() {
        return Err(SyncError::invalid_identity("user id is empty"));
    }
    if user_id.contains("..") || user_id.contains('/') || user_id.contains('\\') {
        return Err(SyncError::invalid_identity(format!(
            "user id '{user_id}' contains path segments"
        )));
    }
    if Path::new(user_id).is_absolute() {
        return Err(SyncError::invalid_identity(format!(
            "user id '{user_id}' is an absolute path"
        )));
    }
    Ok(())
}

/// Validate a user-rooted relative file path
pub fn sanitize_path(path: &str) -> Result<(), SyncError> {
    if path.is_empty() {
        return Err(SyncError::invalid_identity("file path is empty"));
    }
    if Path::new(path).is_absolute() || path.starts_with('/') {
        return Err(SyncError::invalid_identity(format!(
            "file path '{path}' is absolute"
        )));
    }
    if path.contains('\\') {
        return Err(SyncError::invalid_identity(format!(
            "file path '{path}' contains backslashes"
        )));
    }
    if path.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err(SyncError::invalid_identity(format!(
            "file path '{path}' contains traversal or empty segments"
        )));
    }
    Ok(())
}

/// User-rooted on-disk mirror of stored file content
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    /// Create a mirror rooted at `root`. The root itself is created lazily
    /// by `ensure_user_dir`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the absolute on-disk path for a user's file
    ///
    /// Fails with `InvalidIdentity` before touching the filesystem if
    /// either component is malformed.
    pub fn resolve(&self, user_id: &str, path: &str) -> Result<PathBuf, SyncError> {
        sanitize_user_id(user_id)?;
        sanitize_path(path)?;
        Ok(self.root.join(user_id).join(path))
    }

    /// Idempotently create a user's directory (and the mirror root)
    pub async fn ensure_user_dir(&self, user_id: &str) -> Result<PathBuf, SyncError> {
        sanitize_user_id(user_id)?;
        let dir = self.root.join(user_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Whether the mirror currently holds a user's file
    pub async fn exists(&self, user_id: &str, path: &str) -> Result<bool, SyncError> {
        let absolute = self.resolve(user_id, path)?;
        Ok(tokio::fs::try_exists(&absolute).await?)
    }

    /// Read a user's file from the mirror
    pub async fn read(&self, user_id: &str, path: &str) -> Result<String, SyncError> {
        let absolute = self.resolve(user_id, path)?;
        match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SyncError::not_found(path))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write a user's file without verification
    ///
    /// Used to reconcile the mirror from the store when a file is missing
    /// on disk (the bootstrap path on join).
    pub async fn write(&self, user_id: &str, path: &str, content: &str) -> Result<(), SyncError> {
        let absolute = self.resolve(user_id, path)?;
        self.ensure_parent(&absolute, user_id).await?;
        tokio::fs::write(&absolute, content).await?;
        Ok(())
    }

    /// Write a user's file, fsync it, and verify the readback
    ///
    /// Returns the verified content on success. A byte-level mismatch
    /// between the intended content and the readback is reported as
    /// `WriteVerification` and must not be acknowledged as a save.
    pub async fn write_verified(
        &self,
        user_id: &str,
        path: &str,
        content: &str,
    ) -> Result<String, SyncError> {
        let absolute = self.resolve(user_id, path)?;
        self.ensure_parent(&absolute, user_id).await?;

        let mut file = tokio::fs::File::create(&absolute).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        verify_readback(&absolute, path, content).await
    }

    async fn ensure_parent(&self, absolute: &Path, user_id: &str) -> Result<(), SyncError> {
        self.ensure_user_dir(user_id).await?;
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Read `absolute` back and compare byte-for-byte against `expected`
async fn verify_readback(
    absolute: &Path,
    path: &str,
    expected: &str,
) -> Result<String, SyncError> {
    let readback = tokio::fs::read(absolute).await?;
    if readback != expected.as_bytes() {
        tracing::error!(
            "[Storage] Readback mismatch for {path}: wrote {} bytes, read {} bytes",
            expected.len(),
            readback.len()
        );
        return Err(SyncError::write_verification(path));
    }
    String::from_utf8(readback).map_err(|_| SyncError::write_verification(path))
}

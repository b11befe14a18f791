//! Filesystem storage for uploaded files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use medportal_api::ApiError;
use medportal_core::FileRef;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::form::UploadedFile;

/// URL prefix under which stored files are addressed.
pub const PUBLIC_PREFIX: &str = "uploads";

pub const REPORT_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to write upload {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove upload {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not an upload path: {0}")]
    InvalidPath(String),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Stores uploaded bytes and hands back the reference kept on the document.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, file: &UploadedFile) -> Result<FileRef, UploadError>;

    /// Removes a file previously returned by [`FileStore::save`].
    async fn remove(&self, path: &str) -> Result<(), UploadError>;
}

pub type DynFileStore = Arc<dyn FileStore>;

/// Writes uploads into one local directory.
pub struct LocalFileStore {
    dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stored_name(original: &str) -> String {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let ext = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        format!("{millis}-{}{ext}", Uuid::new_v4())
    }

    fn resolve(&self, public_path: &str) -> Result<PathBuf, UploadError> {
        let name = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
            .ok_or_else(|| UploadError::InvalidPath(public_path.to_string()))?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, file: &UploadedFile) -> Result<FileRef, UploadError> {
        let name = Self::stored_name(&file.file_name);
        let target = self.dir.join(&name);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| UploadError::Write {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&target, &file.bytes)
            .await
            .map_err(|source| UploadError::Write {
                path: target.clone(),
                source,
            })?;
        tracing::debug!(path = %target.display(), size = file.bytes.len(), "upload stored");
        Ok(FileRef {
            path: format!("{PUBLIC_PREFIX}/{name}"),
            size: file.bytes.len() as u64,
            mime_type: file.content_type.clone(),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), UploadError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(UploadError::Remove {
                path: target,
                source,
            }),
        }
    }
}

/// Removes a stored file, logging instead of failing.
pub async fn remove_quietly(store: &dyn FileStore, path: &str) {
    if let Err(e) = store.remove(path).await {
        tracing::warn!(error = %e, path, "failed to remove uploaded file");
    }
}

pub fn is_report_mime(mime: &str) -> bool {
    REPORT_MIME_TYPES.contains(&mime)
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_video_mime(mime: &str) -> bool {
    mime.starts_with("video/")
}

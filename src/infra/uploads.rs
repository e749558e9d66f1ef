//! Filesystem storage for post attachments and cropped images.

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

const ATTACHMENT_DIR: &str = "attachments";
const IMAGE_DIR: &str = "images";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
    #[error("storage worker failed: {0}")]
    Worker(String),
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub size_bytes: i64,
}

/// Filesystem-backed upload storage. Stored paths are relative to the root and
/// use forward slashes so they can be embedded in `/uploads/...` URLs.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store a post attachment under `attachments/<year>/<month>/<uuid>-<name>`.
    pub async fn store_attachment(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        let (year, month, _) = time::OffsetDateTime::now_utc().to_calendar_date();
        let stored_path = format!(
            "{ATTACHMENT_DIR}/{year}/{:02}/{}-{}",
            month as u8,
            Uuid::new_v4(),
            sanitize_filename(original_name)
        );
        self.write_atomic(stored_path, data).await
    }

    /// Store a cropped image under `images/cropped-<uuid>.<extension>`.
    pub async fn store_image(
        &self,
        extension: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        let extension = slugify(extension);
        let extension = if extension.is_empty() {
            "png".to_string()
        } else {
            extension
        };
        let stored_path = format!("{IMAGE_DIR}/cropped-{}.{extension}", Uuid::new_v4());
        self.write_atomic(stored_path, data).await
    }

    /// Attempt to read the stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Resolve the absolute filesystem path for a stored upload, refusing paths
    /// that would escape the storage root.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    /// Writes into a temporary file beside the destination and renames it into
    /// place, so readers only ever observe complete files.
    async fn write_atomic(
        &self,
        stored_path: String,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        let size_bytes =
            i64::try_from(data.len()).map_err(|_| UploadStorageError::SizeOverflow)?;
        let absolute = self.resolve(&stored_path)?;

        tokio::task::spawn_blocking(move || -> Result<(), UploadStorageError> {
            let parent = absolute.parent().ok_or(UploadStorageError::InvalidPath)?;
            std::fs::create_dir_all(parent)?;
            let mut temp = NamedTempFile::new_in(parent)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&absolute)
                .map_err(|err| UploadStorageError::Io(err.error))?;
            Ok(())
        })
        .await
        .map_err(|err| UploadStorageError::Worker(err.to_string()))??;

        Ok(StoredUpload {
            stored_path,
            size_bytes,
        })
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

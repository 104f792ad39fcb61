//! The uploads directory.
//!
//! Files are accepted only when both the filename extension and the declared
//! MIME type name an allowed image or video format. They are stored flat as
//! `<uuid>.<ext>` and addressed by the URL path `/uploads/<file>`.

use std::path::{Path, PathBuf};

use marianna_core::persona::media::MediaSource;
use marianna_types::chat::{MediaKind, MediaRef};
use marianna_types::error::UploadError;
use marianna_types::llm::InlineData;
use uuid::Uuid;

/// URL prefix under which uploads are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "mp4", "webm"];

/// Local directory holding uploaded media.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
    max_bytes: usize,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_exists(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Check an upload before anything is written.
    ///
    /// Returns the normalized (lowercase) extension to store the file under.
    pub fn validate(&self, file_name: &str, mime: &str, size: usize) -> Result<String, UploadError> {
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| UploadError::UnsupportedType(file_name.to_string()))?;

        let mime = mime.trim().to_ascii_lowercase();
        let subtype_allowed = match mime.split_once('/') {
            Some(("image" | "video", subtype)) => ALLOWED_EXTENSIONS.contains(&subtype),
            _ => false,
        };
        if !subtype_allowed {
            return Err(UploadError::UnsupportedType(mime));
        }

        Ok(extension)
    }

    /// Validate and store an upload, returning the reference to put on the message.
    pub async fn save(
        &self,
        file_name: &str,
        mime: &str,
        bytes: &[u8],
    ) -> Result<MediaRef, UploadError> {
        let extension = self.validate(file_name, mime, bytes.len())?;
        let stored_name = format!("{}.{extension}", Uuid::now_v7());

        self.ensure_exists()
            .await
            .map_err(|e| UploadError::FileSystem(e.to_string()))?;
        tokio::fs::write(self.root.join(&stored_name), bytes)
            .await
            .map_err(|e| UploadError::FileSystem(e.to_string()))?;

        tracing::debug!(file = %stored_name, size = bytes.len(), "upload stored");
        Ok(MediaRef {
            url: format!("{UPLOADS_URL_PREFIX}{stored_name}"),
            kind: MediaKind::from_mime(&mime.trim().to_ascii_lowercase()),
        })
    }

    /// Remove a stored upload. Missing files are ignored.
    pub async fn remove(&self, media: &MediaRef) {
        let Some(path) = self.resolve(&media.url) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove upload");
            }
        }
    }

    /// Map `/uploads/<file>` to a path inside the directory.
    ///
    /// Anything else (other prefixes, nested paths, `..`) resolves to `None`.
    fn resolve(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOADS_URL_PREFIX)?;
        let is_plain_name = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        is_plain_name.then(|| self.root.join(name))
    }
}

fn image_mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

impl MediaSource for UploadDir {
    async fn load_inline(&self, media: &MediaRef) -> std::io::Result<Option<InlineData>> {
        if media.kind != MediaKind::Image {
            return Ok(None);
        }
        let Some(path) = self.resolve(&media.url) else {
            tracing::debug!(url = %media.url, "media url is not a local upload");
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(InlineData {
                mime_type: image_mime_for(&path).to_string(),
                data,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

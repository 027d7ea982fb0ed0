//! # Media Storage
//!
//! Product photos and store logos on the local filesystem.
//!
//! Files live under the configured media directory and are referenced from
//! the database by a relative path such as `products/<id>-1a2b3c4d.png`.
//! Only PNG, JPEG and WebP are accepted; the type is detected from the file
//! signature, not trusted from the request.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PRODUCT_FOLDER: &str = "products";
pub const LOGO_FOLDER: &str = "logos";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Invalid media path: {0}")]
    InvalidPath(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Media I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
}

impl ImageKind {
    /// Detects the format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// Filesystem-backed image store.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        MediaStore {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Stores an image and returns its relative path.
    ///
    /// The name gets a random suffix so a replaced photo never serves a
    /// stale cached copy.
    pub async fn save(&self, folder: &str, stem: &str, bytes: &[u8]) -> Result<String, MediaError> {
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        let kind = ImageKind::detect(bytes)
            .ok_or_else(|| MediaError::UnsupportedType("expected png, jpeg or webp".to_string()))?;

        let suffix = Uuid::new_v4().simple().to_string();
        let relative = format!("{}/{}-{}.{}", folder, stem, &suffix[..8], kind.extension());
        let path = self.resolve(&relative)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(path = %relative, bytes = bytes.len(), "Media stored");
        Ok(relative)
    }

    /// Reads a stored image.
    pub async fn read(&self, relative: &str) -> Result<(Vec<u8>, ImageKind), MediaError> {
        let path = self.resolve(relative)?;
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageKind::from_extension)
            .ok_or_else(|| MediaError::InvalidPath(relative.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, kind)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MediaError::NotFound(relative.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a stored image. Missing files are not an error.
    pub async fn remove(&self, relative: &str) -> Result<(), MediaError> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %relative, "Media removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %relative, "Media already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Joins a relative path onto the root, refusing anything that escapes it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

use std::{
    io,
    path::{Path, PathBuf},
};

use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

use crate::constants::RECIPE_IMAGE_DIR;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,

    #[error("Media storage failed: {0}")]
    Io(#[from] io::Error),

    #[error("Image validation aborted: {0}")]
    Task(String),
}

/// Uploaded files live under `root`; the database only keeps paths relative
/// to it, e.g. `uploads/recipe/<uuid>.png`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        _ => "png",
    }
}

/// Decodes the whole image, so truncated files are caught as well as
/// files that merely carry a plausible header.
pub fn detect_image(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    let format = image::guess_format(bytes).map_err(|_| MediaError::InvalidImage)?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(MediaError::InvalidImage);
    }

    image::load_from_memory_with_format(bytes, format).map_err(|_| MediaError::InvalidImage)?;
    Ok(format)
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates `bytes` as an image and writes it under a fresh name.
    /// Returns the stored path relative to the media root.
    pub async fn save_recipe_image(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        let (bytes, format) = tokio::task::spawn_blocking(move || {
            detect_image(&bytes).map(|format| (bytes, format))
        })
        .await
        .map_err(|e| MediaError::Task(e.to_string()))??;

        let relative = format!("{RECIPE_IMAGE_DIR}/{}.{}", Uuid::new_v4(), extension(format));
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        log::debug!("Stored image {relative}");

        Ok(relative)
    }

    /// Best effort removal of a stored file. Failures are logged, never
    /// returned: the database row has already moved on.
    pub async fn discard(&self, relative: &str) {
        let target = self.root.join(relative);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => log::debug!("Removed image {relative}"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {}: {e}", target.display()),
        }
    }
}

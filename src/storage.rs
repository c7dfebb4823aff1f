//! Storage sinks for finished captures.
//!
//! Persistence is an outer concern: the capture stays terminal even when a
//! sink fails, and the failure is only reported.

use crate::config::StorageConfig;
use crate::errors::CaptureError;
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Receives the final image and its generated filename.
pub trait StorageSink: Send {
    /// Persist the image, returning where it ended up.
    fn store(&mut self, image: &RgbImage, filename: &str) -> Result<PathBuf, CaptureError>;
}

/// `{prefix}_{timestamp}.jpg`, with the timestamp rendered by `format`.
///
/// An unusable format string falls back to `%Y%m%d_%H%M%S`.
pub fn capture_filename(prefix: &str, format: &str, now: DateTime<Local>) -> String {
    let mut timestamp = String::new();
    if write!(timestamp, "{}", now.format(format)).is_err() {
        log::warn!("Invalid timestamp format {:?}, using default", format);
        timestamp.clear();
        let _ = write!(timestamp, "{}", now.format(FALLBACK_TIMESTAMP_FORMAT));
    }
    format!("{}_{}.jpg", prefix, timestamp)
}

/// Writes JPEG files into a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    directory: PathBuf,
    jpeg_quality: u8,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Path>>(directory: P, jpeg_quality: u8) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.output_directory, config.jpeg_quality)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl StorageSink for DirectoryStorage {
    fn store(&mut self, image: &RgbImage, filename: &str) -> Result<PathBuf, CaptureError> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            CaptureError::Storage(format!(
                "Failed to create output directory {:?}: {}",
                self.directory, e
            ))
        })?;

        let path = self.directory.join(filename);
        let file = File::create(&path)
            .map_err(|e| CaptureError::Storage(format!("Failed to create {:?}: {}", path, e)))?;

        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
            .encode_image(image)
            .map_err(|e| CaptureError::Storage(format!("Failed to encode {:?}: {}", path, e)))?;
        writer
            .flush()
            .map_err(|e| CaptureError::Storage(format!("Failed to write {:?}: {}", path, e)))?;

        log::info!("Saved capture to {:?}", path);
        Ok(path)
    }
}

/// Keeps captures in memory; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    images: Arc<Mutex<Vec<(String, RgbImage)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything stored so far.
    pub fn images(&self) -> Vec<(String, RgbImage)> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StorageSink for MemoryStorage {
    fn store(&mut self, image: &RgbImage, filename: &str) -> Result<PathBuf, CaptureError> {
        self.images
            .lock()
            .map_err(|_| CaptureError::poisoned_lock())?
            .push((filename.to_string(), image.clone()));
        Ok(PathBuf::from(filename))
    }
}

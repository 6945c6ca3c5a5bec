use crate::config::{CaptureConfig, LibraryConfig};
use crate::error::CaptureError;
use crate::session::{
    file_timestamp, resolve_timestamp_timezone, MediaLibrary, Thumbnail, ThumbnailSource,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono_tz::Tz;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

pub const PHOTO_PREFIX: &str = "photo_";
pub const PHOTO_EXTENSION: &str = "jpg";
const LIBRARY_VIDEO_PREFIX: &str = "video_";

/// Upper bound on the bytes read to find a video's first frame
const VIDEO_FRAME_SCAN_BYTES: u64 = 8 * 1024 * 1024;
const THUMBNAIL_QUALITY: u8 = 85;

/// Kind of asset stored in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Photo,
    Video,
}

/// Sidecar written to `<library>/metadata/<asset>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub file_name: String,
    pub kind: AssetKind,
    pub size_bytes: u64,
    pub saved_at: SystemTime,
    /// Scratch recording the video was copied from
    pub source: Option<PathBuf>,
}

/// Media library backed by a plain directory.
///
/// Photos land as `photo_<timestamp>.jpg`, videos are copied in as
/// `video_<timestamp>.<ext>`. The scratch copy of a video is left for the
/// caller to delete.
///
/// Thumbnails are decoded and scaled to fit the requested size. Videos are
/// expected to be Motion-JPEG streams; other containers have no decoder here
/// and their previews fail with `ThumbnailGenerationFailed`.
#[derive(Debug, Clone)]
pub struct FilesystemLibrary {
    root: PathBuf,
    save_metadata: bool,
    timezone: Tz,
    video_extension: String,
}

impl FilesystemLibrary {
    pub fn new(library: &LibraryConfig, capture: &CaptureConfig) -> Self {
        Self {
            root: PathBuf::from(&library.path),
            save_metadata: library.save_metadata,
            timezone: resolve_timestamp_timezone(&capture.timestamp_timezone),
            video_extension: capture.video_extension.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn asset_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let stamp = file_timestamp(self.timezone, SystemTime::now());
        let mut candidate = self.root.join(format!("{}{}.{}", prefix, stamp, extension));
        let mut suffix = 1;
        while fs::try_exists(&candidate).await.unwrap_or(false) {
            candidate = self
                .root
                .join(format!("{}{}_{}.{}", prefix, stamp, suffix, extension));
            suffix += 1;
        }
        candidate
    }

    async fn write_metadata(&self, metadata: &AssetMetadata) {
        if !self.save_metadata {
            return;
        }

        let result = async {
            let json = serde_json::to_string_pretty(metadata)
                .map_err(|e| format!("failed to serialize metadata: {}", e))?;
            let dir = self.root.join("metadata");
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| format!("failed to create metadata directory: {}", e))?;
            let path = dir.join(format!("{}.json", metadata.file_name));
            fs::write(&path, json)
                .await
                .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
            debug!("Saved metadata to {}", path.display());
            Ok::<(), String>(())
        }
        .await;

        // The asset itself is already saved
        if let Err(e) = result {
            warn!("Metadata for {} not written: {}", metadata.file_name, e);
        }
    }

    async fn newest_photo(&self) -> std::io::Result<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(PHOTO_PREFIX) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            let path = entry.path();
            let is_newer = match &newest {
                Some((time, current)) => {
                    modified > *time || (modified == *time && path > *current)
                }
                None => true,
            };
            if is_newer {
                newest = Some((modified, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

/// Decode `data` and shrink it to fit `max_size`, keeping the aspect ratio
fn scale_to_thumbnail(
    data: &[u8],
    (max_width, max_height): (u32, u32),
) -> Result<Bytes, image::ImageError> {
    let image = image::load_from_memory(data)?;
    let thumbnail = image.thumbnail(max_width, max_height).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, THUMBNAIL_QUALITY).encode_image(&thumbnail)?;
    Ok(Bytes::from(buf))
}

async fn render_thumbnail(data: Vec<u8>, max_size: (u32, u32)) -> Result<Bytes, String> {
    tokio::task::spawn_blocking(move || scale_to_thumbnail(&data, max_size))
        .await
        .map_err(|e| format!("thumbnail task failed: {}", e))?
        .map_err(|e| e.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl MediaLibrary for FilesystemLibrary {
    async fn request_permission(&self) -> bool {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            warn!(
                "Cannot create media library at {}: {}",
                self.root.display(),
                e
            );
            return false;
        }
        match fs::metadata(&self.root).await {
            Ok(metadata) if !metadata.permissions().readonly() => true,
            Ok(_) => {
                warn!("Media library {} is read-only", self.root.display());
                false
            }
            Err(e) => {
                warn!("Cannot inspect media library {}: {}", self.root.display(), e);
                false
            }
        }
    }

    async fn save_photo(&self, photo: Bytes) -> Result<(), CaptureError> {
        let path = self.asset_path(PHOTO_PREFIX, PHOTO_EXTENSION).await;
        fs::write(&path, &photo).await.map_err(|e| {
            CaptureError::persistence_failed(format!("write {}: {}", path.display(), e))
        })?;
        info!("Saved photo {} ({} bytes)", path.display(), photo.len());

        self.write_metadata(&AssetMetadata {
            file_name: file_name(&path),
            kind: AssetKind::Photo,
            size_bytes: photo.len() as u64,
            saved_at: SystemTime::now(),
            source: None,
        })
        .await;
        Ok(())
    }

    async fn save_video(&self, path: &Path) -> Result<(), CaptureError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.video_extension.clone());
        let target = self.asset_path(LIBRARY_VIDEO_PREFIX, &extension).await;

        let size = fs::copy(path, &target).await.map_err(|e| {
            CaptureError::persistence_failed(format!(
                "copy {} to {}: {}",
                path.display(),
                target.display(),
                e
            ))
        })?;
        info!("Saved video {} ({} bytes)", target.display(), size);

        self.write_metadata(&AssetMetadata {
            file_name: file_name(&target),
            kind: AssetKind::Video,
            size_bytes: size,
            saved_at: SystemTime::now(),
            source: Some(path.to_path_buf()),
        })
        .await;
        Ok(())
    }

    async fn fetch_most_recent_thumbnail(&self, max_size: (u32, u32)) -> Option<Thumbnail> {
        let path = match self.newest_photo().await {
            Ok(Some(path)) => path,
            Ok(None) => return None,
            Err(e) => {
                debug!("Cannot scan media library: {}", e);
                return None;
            }
        };

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match render_thumbnail(data, max_size).await {
            Ok(thumbnail) => Some(Thumbnail::new(thumbnail, ThumbnailSource::Library)),
            Err(e) => {
                warn!("Cannot preview {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn video_thumbnail(
        &self,
        path: &Path,
        max_size: (u32, u32),
    ) -> Result<Thumbnail, CaptureError> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| CaptureError::thumbnail_failed(format!("{}: {}", path.display(), e)))?;

        let mut data = Vec::new();
        file.take(VIDEO_FRAME_SCAN_BYTES)
            .read_to_end(&mut data)
            .await
            .map_err(|e| CaptureError::thumbnail_failed(format!("{}: {}", path.display(), e)))?;

        if data.is_empty() {
            return Err(CaptureError::thumbnail_failed(format!(
                "{} has no frames",
                path.display()
            )));
        }

        // A Motion-JPEG stream decodes as its first frame
        let thumbnail = render_thumbnail(data, max_size).await.map_err(|e| {
            CaptureError::thumbnail_failed(format!(
                "no decodable first frame in {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Thumbnail::new(thumbnail, ThumbnailSource::Video))
    }
}

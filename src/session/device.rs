use crate::error::CaptureError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Normalised frame coordinate, (0,0) top-left and (1,1) bottom-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusPoint {
    pub x: f32,
    pub y: f32,
}

impl FocusPoint {
    pub const CENTER: FocusPoint = FocusPoint { x: 0.5, y: 0.5 };
}

/// Parameters handed to the camera for a single still capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoRequest {
    pub exposure_compensation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailSource {
    Photo,
    Video,
    Library,
}

/// Preview image of the most recent capture
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub data: Bytes,
    pub source: ThumbnailSource,
}

impl Thumbnail {
    pub fn new(data: impl Into<Bytes>, source: ThumbnailSource) -> Self {
        Self {
            data: data.into(),
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Camera and microphone hardware
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the user for camera and microphone access
    async fn request_permission(&self) -> bool;

    /// Select the back wide-angle camera and attach photo and movie outputs
    async fn configure(&self) -> Result<(), CaptureError>;

    async fn start_session(&self) -> Result<(), CaptureError>;

    async fn stop_session(&self) -> Result<(), CaptureError>;

    /// Whether focus and exposure can be pinned to a point of interest
    fn supports_point_of_interest(&self) -> bool;

    /// Pin auto-focus and auto-exposure to `point`
    async fn set_point_of_interest(&self, point: FocusPoint) -> Result<(), CaptureError>;

    /// Capture one still image and return its encoded bytes
    async fn capture_photo(&self, request: PhotoRequest) -> Result<Bytes, CaptureError>;

    /// Begin writing a movie to `path`
    async fn start_recording(&self, path: &Path) -> Result<(), CaptureError>;

    /// Finish the movie and return the path it was written to
    async fn stop_recording(&self) -> Result<PathBuf, CaptureError>;
}

/// Persistent photo and video store
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn request_permission(&self) -> bool;

    async fn save_photo(&self, photo: Bytes) -> Result<(), CaptureError>;

    /// Import the movie at `path`; the caller keeps ownership of the file
    async fn save_video(&self, path: &Path) -> Result<(), CaptureError>;

    async fn fetch_most_recent_thumbnail(&self, max_size: (u32, u32)) -> Option<Thumbnail>;

    /// Derive a thumbnail from the first frame of the movie at `path`
    async fn video_thumbnail(
        &self,
        path: &Path,
        max_size: (u32, u32),
    ) -> Result<Thumbnail, CaptureError>;
}

use super::device::{
    CaptureDevice, FocusPoint, MediaLibrary, PhotoRequest, Thumbnail, ThumbnailSource,
};
use crate::error::CaptureError;
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

const PHOTO_SIZE: (u32, u32) = (640, 480);
const FRAME_SIZE: (u32, u32) = (320, 240);

/// Failures a simulated camera can be told to produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedFailures {
    pub no_device: bool,
    pub photo: bool,
    pub start_recording: bool,
    pub stop_recording: bool,
}

/// Number of calls received per capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCalls {
    pub configure: usize,
    pub start_session: usize,
    pub stop_session: usize,
    pub point_of_interest: usize,
    pub capture_photo: usize,
    pub start_recording: usize,
    pub stop_recording: usize,
}

#[derive(Debug, Default)]
struct CameraState {
    calls: DeviceCalls,
    running: bool,
    recording: Option<PathBuf>,
    last_request: Option<PhotoRequest>,
    photo_sequence: u64,
}

/// Camera stand-in used when no hardware is present and in tests.
///
/// Photos are synthetic JPEG frames whose brightness follows the exposure
/// compensation. Recordings are written as a Motion-JPEG stream holding a
/// single frame, so the persistence path can run end to end.
#[derive(Debug)]
pub struct SimulatedCamera {
    permission: bool,
    point_of_interest: bool,
    failures: SimulatedFailures,
    state: Mutex<CameraState>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            permission: true,
            point_of_interest: true,
            failures: SimulatedFailures::default(),
            state: Mutex::new(CameraState::default()),
        }
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }

    pub fn with_point_of_interest(mut self, supported: bool) -> Self {
        self.point_of_interest = supported;
        self
    }

    pub fn with_failures(mut self, failures: SimulatedFailures) -> Self {
        self.failures = failures;
        self
    }

    pub fn calls(&self) -> DeviceCalls {
        self.state.lock().calls
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn last_photo_request(&self) -> Option<PhotoRequest> {
        self.state.lock().last_request
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCamera {
    async fn request_permission(&self) -> bool {
        self.permission
    }

    async fn configure(&self) -> Result<(), CaptureError> {
        self.state.lock().calls.configure += 1;
        if self.failures.no_device {
            return Err(CaptureError::DeviceUnavailable {
                details: "no back wide-angle camera".to_string(),
            });
        }
        Ok(())
    }

    async fn start_session(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.calls.start_session += 1;
        state.running = true;
        Ok(())
    }

    async fn stop_session(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.calls.stop_session += 1;
        state.running = false;
        Ok(())
    }

    fn supports_point_of_interest(&self) -> bool {
        self.point_of_interest
    }

    async fn set_point_of_interest(&self, point: FocusPoint) -> Result<(), CaptureError> {
        debug!("Simulated focus at ({:.2}, {:.2})", point.x, point.y);
        self.state.lock().calls.point_of_interest += 1;
        Ok(())
    }

    async fn capture_photo(&self, request: PhotoRequest) -> Result<Bytes, CaptureError> {
        let sequence = {
            let mut state = self.state.lock();
            state.calls.capture_photo += 1;
            state.last_request = Some(request);
            state.photo_sequence += 1;
            state.photo_sequence
        };

        if self.failures.photo {
            return Err(CaptureError::capture_failed("simulated sensor fault"));
        }
        debug!("Simulated photo {}", sequence);
        let shade = (128.0 + request.exposure_compensation * 60.0).clamp(0.0, 255.0) as u8;
        synthetic_frame(PHOTO_SIZE, shade)
    }

    async fn start_recording(&self, path: &Path) -> Result<(), CaptureError> {
        self.state.lock().calls.start_recording += 1;
        if self.failures.start_recording {
            return Err(CaptureError::capture_failed("simulated movie output fault"));
        }

        let frame = synthetic_frame(FRAME_SIZE, 96)?;
        fs::write(path, &frame)
            .await
            .map_err(|e| CaptureError::capture_failed(e.to_string()))?;
        self.state.lock().recording = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_recording(&self) -> Result<PathBuf, CaptureError> {
        let recording = {
            let mut state = self.state.lock();
            state.calls.stop_recording += 1;
            state.recording.take()
        };

        if self.failures.stop_recording {
            return Err(CaptureError::capture_failed("simulated finalisation fault"));
        }
        recording.ok_or_else(|| CaptureError::capture_failed("not recording"))
    }
}

/// Gradient test card, JPEG encoded
fn synthetic_frame((width, height): (u32, u32), shade: u8) -> Result<Bytes, CaptureError> {
    let frame = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, shade])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&frame)
        .map_err(|e| CaptureError::capture_failed(format!("frame encoding failed: {}", e)))?;
    Ok(Bytes::from(buf))
}

/// Number of calls received per library capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryCalls {
    pub saved_photos: Vec<Bytes>,
    pub saved_videos: Vec<PathBuf>,
    pub video_thumbnails: usize,
}

/// In-memory media library for tests
#[derive(Debug)]
pub struct MockMediaLibrary {
    permission: bool,
    fail_saves: bool,
    fail_thumbnails: bool,
    video_save_delay: Option<Duration>,
    recent: Option<Thumbnail>,
    calls: Mutex<LibraryCalls>,
}

impl MockMediaLibrary {
    pub fn new() -> Self {
        Self {
            permission: true,
            fail_saves: false,
            fail_thumbnails: false,
            video_save_delay: None,
            recent: None,
            calls: Mutex::new(LibraryCalls::default()),
        }
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }

    pub fn with_failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn with_failing_thumbnails(mut self) -> Self {
        self.fail_thumbnails = true;
        self
    }

    /// Hold every video save for `delay` before it completes
    pub fn with_slow_video_saves(mut self, delay: Duration) -> Self {
        self.video_save_delay = Some(delay);
        self
    }

    pub fn with_recent(mut self, data: &'static [u8]) -> Self {
        self.recent = Some(Thumbnail::new(data, ThumbnailSource::Library));
        self
    }

    pub fn calls(&self) -> LibraryCalls {
        self.calls.lock().clone()
    }
}

impl Default for MockMediaLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaLibrary for MockMediaLibrary {
    async fn request_permission(&self) -> bool {
        self.permission
    }

    async fn save_photo(&self, photo: Bytes) -> Result<(), CaptureError> {
        if self.fail_saves {
            return Err(CaptureError::persistence_failed("simulated library write fault"));
        }
        self.calls.lock().saved_photos.push(photo);
        Ok(())
    }

    async fn save_video(&self, path: &Path) -> Result<(), CaptureError> {
        if let Some(delay) = self.video_save_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_saves {
            return Err(CaptureError::persistence_failed("simulated library write fault"));
        }
        self.calls.lock().saved_videos.push(path.to_path_buf());
        Ok(())
    }

    async fn fetch_most_recent_thumbnail(&self, _max_size: (u32, u32)) -> Option<Thumbnail> {
        self.recent.clone()
    }

    async fn video_thumbnail(
        &self,
        path: &Path,
        _max_size: (u32, u32),
    ) -> Result<Thumbnail, CaptureError> {
        self.calls.lock().video_thumbnails += 1;
        if self.fail_thumbnails {
            return Err(CaptureError::thumbnail_failed("simulated frame decode fault"));
        }
        let data = fs::read(path)
            .await
            .map_err(|e| CaptureError::thumbnail_failed(e.to_string()))?;
        Ok(Thumbnail::new(data, ThumbnailSource::Video))
    }
}

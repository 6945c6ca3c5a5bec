use super::mock::{MockMediaLibrary, SimulatedCamera, SimulatedFailures};
use super::*;
use crate::config::SnapcamConfig;
use crate::events::{EventBus, SnapcamEvent};
use crate::settings::CaptureSettings;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

struct Fixture {
    controller: SessionController,
    handle: SessionHandle,
    camera: Arc<SimulatedCamera>,
    library: Arc<MockMediaLibrary>,
    events: broadcast::Receiver<SnapcamEvent>,
    scratch: TempDir,
}

fn fixture(camera: SimulatedCamera, library: MockMediaLibrary) -> Fixture {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = SnapcamConfig::default();
    config.capture.scratch_dir = scratch.path().to_string_lossy().into_owned();

    let event_bus = Arc::new(EventBus::new(64));
    let events = event_bus.subscribe();
    let camera = Arc::new(camera);
    let library = Arc::new(library);

    let controller = SessionController::new(&config, event_bus, camera.clone(), library.clone());
    let handle = controller.handle();

    Fixture {
        controller,
        handle,
        camera,
        library,
        events,
        scratch,
    }
}

async fn ready_fixture(camera: SimulatedCamera, library: MockMediaLibrary) -> Fixture {
    let fixture = fixture(camera, library);
    fixture.handle.initialize().await.unwrap();
    fixture.handle.start_session().await.unwrap();
    fixture.handle.flush().await.unwrap();
    fixture
}

fn fault_kinds(events: &mut broadcast::Receiver<SnapcamEvent>) -> Vec<String> {
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SnapcamEvent::CaptureFault { kind, .. } = event {
            kinds.push(kind);
        }
    }
    kinds
}

fn scratch_recordings(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
        .count()
}

fn settings_with_exposure(exposure_compensation: f32) -> CaptureSettings {
    CaptureSettings {
        exposure_compensation,
        ..CaptureSettings::default()
    }
}

#[tokio::test]
async fn test_initialize_grants_configures_and_loads_recent_thumbnail() {
    let fixture = fixture(
        SimulatedCamera::new(),
        MockMediaLibrary::new().with_recent(b"recent-library-item"),
    );

    fixture.handle.initialize().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let status = fixture.handle.status();
    assert!(status.camera_permission_granted);
    assert!(status.library_permission_granted);
    assert!(status.configured);
    assert!(!status.session_running);
    let thumbnail = status.last_thumbnail.unwrap();
    assert_eq!(thumbnail.source, ThumbnailSource::Library);
    assert_eq!(&thumbnail.data[..], b"recent-library-item");
}

#[tokio::test]
async fn test_denied_camera_permission_makes_capture_inert() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new().with_permission(false),
        MockMediaLibrary::new().with_permission(false).with_recent(b"hidden"),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.start_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.configure, 0);
    assert_eq!(calls.start_session, 0);
    assert_eq!(calls.capture_photo, 0);
    assert_eq!(calls.start_recording, 0);

    let status = fixture.handle.status();
    assert!(!status.camera_permission_granted);
    assert!(!status.library_permission_granted);
    assert!(!status.is_recording);
    assert!(status.last_thumbnail.is_none());
    assert_eq!(
        fault_kinds(&mut fixture.events),
        vec!["permission_denied", "permission_denied"]
    );
}

#[tokio::test]
async fn test_denied_library_permission_skips_saving() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new(),
        MockMediaLibrary::new().with_permission(false),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    assert_eq!(fixture.camera.calls().capture_photo, 1);
    assert_eq!(
        fixture.handle.status().last_thumbnail.unwrap().source,
        ThumbnailSource::Photo
    );

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.stop_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let library_calls = fixture.library.calls();
    assert!(library_calls.saved_photos.is_empty());
    assert!(library_calls.saved_videos.is_empty());
    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
    assert_eq!(
        fixture.handle.status().last_thumbnail.unwrap().source,
        ThumbnailSource::Video
    );
    assert_eq!(
        fault_kinds(&mut fixture.events),
        vec!["permission_denied", "permission_denied"]
    );
}

#[tokio::test]
async fn test_missing_device_is_reported_and_capture_ignored() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new().with_failures(SimulatedFailures {
            no_device: true,
            ..SimulatedFailures::default()
        }),
        MockMediaLibrary::new(),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    let status = fixture.handle.status();
    assert!(status.camera_permission_granted);
    assert!(!status.configured);
    assert_eq!(fixture.camera.calls().capture_photo, 0);
    assert_eq!(fault_kinds(&mut fixture.events), vec!["device_unavailable"]);
}

#[tokio::test]
async fn test_session_start_and_stop_are_idempotent() {
    let fixture = fixture(SimulatedCamera::new(), MockMediaLibrary::new());

    fixture.handle.initialize().await.unwrap();
    fixture.handle.start_session().await.unwrap();
    fixture.handle.start_session().await.unwrap();
    fixture.handle.flush().await.unwrap();
    assert!(fixture.camera.is_running());
    assert!(fixture.handle.status().session_running);

    fixture.handle.stop_session().await.unwrap();
    fixture.handle.stop_session().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.start_session, 1);
    assert_eq!(calls.stop_session, 1);
    assert!(!fixture.camera.is_running());
    assert!(!fixture.handle.status().session_running);
}

#[tokio::test]
async fn test_capture_after_stop_session_never_reaches_device() {
    let mut fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;

    fixture.handle.stop_session().await.unwrap();
    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.start_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.capture_photo, 0);
    assert_eq!(calls.start_recording, 0);
    let status = fixture.handle.status();
    assert!(!status.session_running);
    assert!(!status.is_recording);
    assert!(fixture.library.calls().saved_photos.is_empty());
    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
    assert!(fault_kinds(&mut fixture.events).is_empty());
}

#[tokio::test]
async fn test_take_photo_centres_focus_and_refreshes_thumbnail() {
    let fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;

    fixture
        .handle
        .take_photo(settings_with_exposure(-1.5))
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.point_of_interest, 1);
    assert_eq!(calls.capture_photo, 1);
    assert_eq!(
        fixture.camera.last_photo_request(),
        Some(PhotoRequest {
            exposure_compensation: -1.5
        })
    );

    let saved = fixture.library.calls().saved_photos;
    assert_eq!(saved.len(), 1);
    let thumbnail = fixture.handle.status().last_thumbnail.unwrap();
    assert_eq!(thumbnail.source, ThumbnailSource::Photo);
    assert_eq!(thumbnail.data, saved[0]);
}

#[tokio::test]
async fn test_photo_without_point_of_interest_support_still_captures() {
    let fixture = ready_fixture(
        SimulatedCamera::new().with_point_of_interest(false),
        MockMediaLibrary::new(),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.point_of_interest, 0);
    assert_eq!(calls.capture_photo, 1);
}

#[tokio::test]
async fn test_failed_photo_keeps_previous_thumbnail() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new().with_failures(SimulatedFailures {
            photo: true,
            ..SimulatedFailures::default()
        }),
        MockMediaLibrary::new().with_recent(b"before"),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    let thumbnail = fixture.handle.status().last_thumbnail.unwrap();
    assert_eq!(thumbnail.source, ThumbnailSource::Library);
    assert!(fixture.library.calls().saved_photos.is_empty());
    assert_eq!(fault_kinds(&mut fixture.events), vec!["capture_failed"]);
}

#[tokio::test]
async fn test_failed_photo_save_is_reported() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new(),
        MockMediaLibrary::new().with_failing_saves(),
    )
    .await;

    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    assert_eq!(fault_kinds(&mut fixture.events), vec!["persistence_failed"]);
    // The capture itself succeeded, so the preview still reflects it
    assert_eq!(
        fixture.handle.status().last_thumbnail.unwrap().source,
        ThumbnailSource::Photo
    );
}

#[tokio::test]
async fn test_recording_lifecycle_persists_and_removes_scratch_file() {
    let fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.start_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert!(fixture.handle.status().is_recording);
    assert_eq!(fixture.camera.calls().start_recording, 1);
    assert_eq!(scratch_recordings(fixture.scratch.path()), 1);

    fixture.handle.stop_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let status = fixture.handle.status();
    assert!(!status.is_recording);
    let thumbnail = status.last_thumbnail.unwrap();
    assert_eq!(thumbnail.source, ThumbnailSource::Video);
    // First frame of the simulated Motion-JPEG recording
    assert!(thumbnail.data.starts_with(&[0xFF, 0xD8]));

    let library_calls = fixture.library.calls();
    assert_eq!(library_calls.saved_videos.len(), 1);
    assert!(library_calls.saved_videos[0].starts_with(fixture.scratch.path()));
    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
}

#[tokio::test]
async fn test_late_video_thumbnail_does_not_replace_newer_photo() {
    let fixture = ready_fixture(
        SimulatedCamera::new(),
        MockMediaLibrary::new().with_slow_video_saves(Duration::from_millis(100)),
    )
    .await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.stop_recording().await.unwrap();
    fixture
        .handle
        .take_photo(CaptureSettings::default())
        .await
        .unwrap();
    fixture.handle.flush().await.unwrap();

    let library_calls = fixture.library.calls();
    assert_eq!(library_calls.saved_videos.len(), 1);
    assert_eq!(library_calls.video_thumbnails, 1);
    let thumbnail = fixture.handle.status().last_thumbnail.unwrap();
    assert_eq!(thumbnail.source, ThumbnailSource::Photo);
    assert_eq!(thumbnail.data, library_calls.saved_photos[0]);
}

#[tokio::test]
async fn test_stop_without_recording_is_noop() {
    let fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;

    fixture.handle.stop_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert_eq!(fixture.camera.calls().stop_recording, 0);
    assert!(fixture.library.calls().saved_videos.is_empty());
}

#[tokio::test]
async fn test_failed_video_save_still_removes_scratch_file() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new(),
        MockMediaLibrary::new().with_failing_saves().with_failing_thumbnails(),
    )
    .await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.stop_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
    assert!(fixture.handle.status().last_thumbnail.is_none());
    assert_eq!(
        fault_kinds(&mut fixture.events),
        vec!["persistence_failed", "thumbnail_generation_failed"]
    );
}

#[tokio::test]
async fn test_failed_recording_stop_clears_flag_and_scratch() {
    let mut fixture = ready_fixture(
        SimulatedCamera::new().with_failures(SimulatedFailures {
            stop_recording: true,
            ..SimulatedFailures::default()
        }),
        MockMediaLibrary::new(),
    )
    .await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.stop_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert!(!fixture.handle.status().is_recording);
    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
    assert!(fixture.library.calls().saved_videos.is_empty());
    assert_eq!(fault_kinds(&mut fixture.events), vec!["capture_failed"]);
}

#[tokio::test]
async fn test_failed_recording_start_never_sets_flag() {
    let fixture = ready_fixture(
        SimulatedCamera::new().with_failures(SimulatedFailures {
            start_recording: true,
            ..SimulatedFailures::default()
        }),
        MockMediaLibrary::new(),
    )
    .await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert!(!fixture.handle.status().is_recording);
    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
}

#[tokio::test]
async fn test_stop_session_finishes_active_recording_first() {
    let fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;

    fixture.handle.start_recording().await.unwrap();
    fixture.handle.stop_session().await.unwrap();
    fixture.handle.flush().await.unwrap();

    let calls = fixture.camera.calls();
    assert_eq!(calls.stop_recording, 1);
    assert_eq!(calls.stop_session, 1);
    assert!(!fixture.handle.status().is_recording);
    assert_eq!(fixture.library.calls().saved_videos.len(), 1);
}

#[tokio::test]
async fn test_initialize_cleans_stale_scratch_files() {
    let fixture = fixture(SimulatedCamera::new(), MockMediaLibrary::new());
    std::fs::write(fixture.scratch.path().join("scratch_video_stale.mov"), b"old").unwrap();

    fixture.handle.initialize().await.unwrap();
    fixture.handle.flush().await.unwrap();

    assert_eq!(scratch_recordings(fixture.scratch.path()), 0);
}

#[tokio::test]
async fn test_dispose_stops_session_and_closes_queue() {
    let mut fixture = ready_fixture(SimulatedCamera::new(), MockMediaLibrary::new()).await;
    fixture.handle.start_recording().await.unwrap();

    fixture.controller.dispose().await.unwrap();

    assert!(!fixture.camera.is_running());
    assert_eq!(fixture.library.calls().saved_videos.len(), 1);
    assert!(fixture.handle.start_session().await.is_err());
}

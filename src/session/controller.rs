use super::device::{
    CaptureDevice, FocusPoint, MediaLibrary, PhotoRequest, Thumbnail, ThumbnailSource,
};
use super::persist::{persistence_worker, report_fault, PersistJob};
use super::scratch::{
    clean_scratch_dir, recording_path, remove_scratch_file, resolve_timestamp_timezone,
};
use super::status::SessionStatus;
use crate::config::{CaptureConfig, SnapcamConfig};
use crate::error::{CaptureError, Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::settings::CaptureSettings;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DISPOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands drained one at a time by the session actor
pub(crate) enum SessionCommand {
    Initialize,
    StartSession,
    StopSession,
    TakePhoto { settings: CaptureSettings },
    StartRecording,
    StopRecording,
    /// `seq` is the capture the thumbnail belongs to
    ThumbnailReady { thumbnail: Thumbnail, seq: u64 },
    Flush(oneshot::Sender<()>),
    Barrier(oneshot::Sender<()>),
    Dispose(oneshot::Sender<()>),
}

/// Owns the capture device for the lifetime of the app.
///
/// All device and library calls happen on a single actor task fed by a
/// command queue, so session start/stop can never interleave with a photo
/// or recording in flight.
pub struct SessionController {
    handle: SessionHandle,
    actor_task: Option<JoinHandle<()>>,
    worker_task: Option<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl SessionController {
    /// Spawn the session actor and its persistence worker
    pub fn new(
        config: &SnapcamConfig,
        event_bus: Arc<EventBus>,
        device: Arc<dyn CaptureDevice>,
        library: Arc<dyn MediaLibrary>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.system.command_queue_capacity);
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();

        let worker_task = tokio::spawn(persistence_worker(
            job_rx,
            Arc::clone(&library),
            command_tx.clone(),
            Arc::clone(&event_bus),
            config.capture.thumbnail_max_size,
        ));

        let actor = SessionActor {
            capture_config: config.capture.clone(),
            timezone: resolve_timestamp_timezone(&config.capture.timestamp_timezone),
            device,
            library,
            event_bus,
            status: status_tx,
            jobs: job_tx,
            initialized: false,
            recording: None,
            capture_seq: 0,
            thumbnail_seq: 0,
        };
        let actor_task = tokio::spawn(actor.run(command_rx, cancellation_token.clone()));

        Self {
            handle: SessionHandle {
                commands: command_tx,
                status: status_rx,
            },
            actor_task: Some(actor_task),
            worker_task: Some(worker_task),
            cancellation_token,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop any recording and the session, then shut the actor down
    pub async fn dispose(&mut self) -> Result<()> {
        let Some(actor_task) = self.actor_task.take() else {
            return Ok(());
        };

        info!("Disposing capture session");
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .handle
            .commands
            .send(SessionCommand::Dispose(reply_tx))
            .await
            .is_ok()
        {
            let _ = timeout(DISPOSE_TIMEOUT, reply_rx).await;
        }

        self.cancellation_token.cancel();
        if timeout(DISPOSE_TIMEOUT, actor_task).await.is_err() {
            return Err(SnapcamError::component(
                "session",
                "session actor did not stop in time",
            ));
        }

        if let Some(worker_task) = self.worker_task.take() {
            // Drains pending saves before exiting
            if timeout(DISPOSE_TIMEOUT, worker_task).await.is_err() {
                warn!("Persistence worker did not finish in time");
            }
        }

        info!("Capture session disposed");
        Ok(())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Cloneable front door to the session actor
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Request permissions and configure the device once granted
    pub async fn initialize(&self) -> Result<()> {
        self.send(SessionCommand::Initialize).await
    }

    pub async fn start_session(&self) -> Result<()> {
        self.send(SessionCommand::StartSession).await
    }

    pub async fn stop_session(&self) -> Result<()> {
        self.send(SessionCommand::StopSession).await
    }

    pub async fn take_photo(&self, settings: CaptureSettings) -> Result<()> {
        self.send(SessionCommand::TakePhoto { settings }).await
    }

    pub async fn start_recording(&self) -> Result<()> {
        self.send(SessionCommand::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<()> {
        self.send(SessionCommand::StopRecording).await
    }

    /// Resolves once every command and persistence job queued before it has completed
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Flush(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| SnapcamError::component("session", "flush dropped by session actor"))
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SnapcamError::component("session", "command queue closed"))
    }
}

struct SessionActor {
    capture_config: CaptureConfig,
    timezone: Tz,
    device: Arc<dyn CaptureDevice>,
    library: Arc<dyn MediaLibrary>,
    event_bus: Arc<EventBus>,
    status: watch::Sender<SessionStatus>,
    jobs: mpsc::UnboundedSender<PersistJob>,
    initialized: bool,
    /// Scratch file of the recording in progress
    recording: Option<PathBuf>,
    /// Bumped for every finished photo or recording
    capture_seq: u64,
    /// Capture the published thumbnail belongs to; 0 is the library preview
    thumbnail_seq: u64,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        cancellation_token: CancellationToken,
    ) {
        debug!("Session actor started");

        loop {
            let command = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                SessionCommand::Initialize => self.initialize().await,
                SessionCommand::StartSession => self.start_session().await,
                SessionCommand::StopSession => self.stop_session().await,
                SessionCommand::TakePhoto { settings } => self.take_photo(settings).await,
                SessionCommand::StartRecording => self.start_recording().await,
                SessionCommand::StopRecording => self.stop_recording().await,
                SessionCommand::ThumbnailReady { thumbnail, seq } => {
                    self.set_thumbnail(thumbnail, seq)
                }
                SessionCommand::Flush(reply) => {
                    if let Err(mpsc::error::SendError(PersistJob::Flush(reply))) =
                        self.jobs.send(PersistJob::Flush(reply))
                    {
                        let _ = reply.send(());
                    }
                }
                SessionCommand::Barrier(reply) => {
                    let _ = reply.send(());
                }
                SessionCommand::Dispose(reply) => {
                    self.stop_session().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        debug!("Session actor stopped");
    }

    async fn initialize(&mut self) {
        if self.initialized {
            debug!("Session already initialized");
            return;
        }
        self.initialized = true;
        info!("Initializing capture session");

        if self.capture_config.clean_scratch_on_start {
            if let Err(e) = clean_scratch_dir(&self.capture_config).await {
                warn!("Failed to clean scratch directory: {}", e);
            }
        }

        let camera_granted = self.device.request_permission().await;
        self.status
            .send_modify(|s| s.camera_permission_granted = camera_granted);
        self.publish(SnapcamEvent::PermissionResolved {
            resource: "camera".to_string(),
            granted: camera_granted,
        });

        if camera_granted {
            match self.device.configure().await {
                Ok(()) => {
                    self.status.send_modify(|s| s.configured = true);
                    info!("Capture device configured");
                }
                Err(e) => self.fault(e),
            }
        }

        let library_granted = self.library.request_permission().await;
        self.status
            .send_modify(|s| s.library_permission_granted = library_granted);
        self.publish(SnapcamEvent::PermissionResolved {
            resource: "library".to_string(),
            granted: library_granted,
        });

        if library_granted {
            let max_size = self.capture_config.thumbnail_max_size;
            match self.library.fetch_most_recent_thumbnail(max_size).await {
                Some(thumbnail) => self.set_thumbnail(thumbnail, 0),
                None => debug!("Library has no recent item to preview"),
            }
        }
    }

    async fn start_session(&mut self) {
        let status = self.status.borrow().clone();
        if !status.can_capture() {
            warn!("Capture device not ready; session start ignored");
            return;
        }
        if status.session_running {
            debug!("Capture session already running");
            return;
        }

        match self.device.start_session().await {
            Ok(()) => {
                self.status.send_modify(|s| s.session_running = true);
                self.publish(SnapcamEvent::SessionStateChanged { running: true });
            }
            Err(e) => self.fault(e),
        }
    }

    async fn stop_session(&mut self) {
        if self.status.borrow().is_recording {
            info!("Stopping active recording before session shutdown");
            self.stop_recording().await;
        }
        if !self.status.borrow().session_running {
            debug!("Capture session already stopped");
            return;
        }

        if let Err(e) = self.device.stop_session().await {
            self.fault(e);
        }
        self.status.send_modify(|s| s.session_running = false);
        self.publish(SnapcamEvent::SessionStateChanged { running: false });
    }

    async fn take_photo(&mut self, settings: CaptureSettings) {
        if !self.ready_to_capture("photo") {
            return;
        }

        if self.device.supports_point_of_interest() {
            if let Err(e) = self.device.set_point_of_interest(FocusPoint::CENTER).await {
                warn!("Could not centre focus and exposure: {}", e);
            }
        }

        let request = PhotoRequest {
            exposure_compensation: settings.exposure_compensation,
        };
        match self.device.capture_photo(request).await {
            Ok(data) => {
                self.publish(SnapcamEvent::PhotoCaptured {
                    bytes: data.len(),
                    timestamp: SystemTime::now(),
                });
                let seq = self.next_capture_seq();
                self.set_thumbnail(Thumbnail::new(data.clone(), ThumbnailSource::Photo), seq);
                if self.library_writable("photo") {
                    self.queue(PersistJob::Photo { data });
                }
            }
            Err(e) => self.fault(e),
        }
    }

    async fn start_recording(&mut self) {
        if self.status.borrow().is_recording {
            warn!("Recording already in progress; start ignored");
            return;
        }
        if !self.ready_to_capture("recording") {
            return;
        }

        let scratch_dir = self.capture_config.scratch_path();
        if let Err(e) = fs::create_dir_all(&scratch_dir).await {
            self.fault(CaptureError::capture_failed(format!(
                "cannot create scratch directory {}: {}",
                scratch_dir.display(),
                e
            )));
            return;
        }

        let path = recording_path(&self.capture_config, self.timezone, SystemTime::now()).await;
        match self.device.start_recording(&path).await {
            Ok(()) => {
                self.recording = Some(path.clone());
                self.status.send_modify(|s| s.is_recording = true);
                self.publish(SnapcamEvent::RecordingStarted { path });
            }
            Err(e) => {
                self.fault(e);
                remove_scratch_file(&path).await;
            }
        }
    }

    async fn stop_recording(&mut self) {
        if !self.status.borrow().is_recording {
            warn!("No recording in progress; stop ignored");
            return;
        }

        let result = self.device.stop_recording().await;
        let scratch = self.recording.take();
        self.status.send_modify(|s| s.is_recording = false);

        match result {
            Ok(path) => {
                if let Some(scratch) = scratch.filter(|scratch| *scratch != path) {
                    // The device wrote elsewhere; nothing will clean up the reserved name
                    remove_scratch_file(&scratch).await;
                }
                self.publish(SnapcamEvent::RecordingStopped { path: path.clone() });
                let seq = self.next_capture_seq();
                let save = self.library_writable("video");
                self.queue(PersistJob::Video { path, seq, save });
            }
            Err(e) => {
                self.fault(e);
                if let Some(scratch) = scratch {
                    remove_scratch_file(&scratch).await;
                }
            }
        }
    }

    /// Camera permission, a configured device and a running session are
    /// all required; a denied permission is reported as a fault
    fn ready_to_capture(&self, what: &str) -> bool {
        let status = self.status.borrow().clone();
        if !status.camera_permission_granted {
            warn!("Camera permission denied; {} request refused", what);
            self.fault(CaptureError::permission_denied("camera"));
            return false;
        }
        if !status.configured || !status.session_running {
            warn!("Capture session not running; {} request ignored", what);
            return false;
        }
        true
    }

    fn library_writable(&self, what: &str) -> bool {
        if self.status.borrow().library_permission_granted {
            return true;
        }
        warn!("Library permission denied; {} will not be saved", what);
        self.fault(CaptureError::permission_denied("library"));
        false
    }

    fn next_capture_seq(&mut self) -> u64 {
        self.capture_seq += 1;
        self.capture_seq
    }

    fn set_thumbnail(&mut self, thumbnail: Thumbnail, seq: u64) {
        if seq < self.thumbnail_seq {
            debug!(
                "Dropping {:?} thumbnail for capture {}; capture {} is newer",
                thumbnail.source, seq, self.thumbnail_seq
            );
            return;
        }
        self.thumbnail_seq = seq;
        let source = thumbnail.source;
        // The previous thumbnail is dropped here
        self.status.send_modify(|s| s.last_thumbnail = Some(thumbnail));
        self.publish(SnapcamEvent::ThumbnailUpdated { source });
    }

    fn queue(&self, job: PersistJob) {
        if self.jobs.send(job).is_err() {
            error!("Persistence worker stopped; capture will not be saved");
        }
    }

    fn fault(&self, error: CaptureError) {
        report_fault(&self.event_bus, error);
    }

    fn publish(&self, event: SnapcamEvent) {
        let _ = self.event_bus.publish(event);
    }
}

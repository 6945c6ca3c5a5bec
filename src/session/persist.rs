use super::controller::SessionCommand;
use super::device::MediaLibrary;
use super::scratch::remove_scratch_file;
use crate::error::CaptureError;
use crate::events::{EventBus, SnapcamEvent};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Work handed from the session actor to the persistence worker
pub(crate) enum PersistJob {
    Photo { data: Bytes },
    /// `seq` tags the thumbnail; `save` is false when the library is off limits
    Video { path: PathBuf, seq: u64, save: bool },
    /// Sent back to the actor as a barrier once every earlier job is done
    Flush(oneshot::Sender<()>),
}

/// Background worker that stores captures in the media library.
///
/// Video thumbnails are returned to the session actor as commands; the worker
/// never touches published status itself.
pub(crate) async fn persistence_worker(
    mut jobs: mpsc::UnboundedReceiver<PersistJob>,
    library: Arc<dyn MediaLibrary>,
    commands: mpsc::Sender<SessionCommand>,
    event_bus: Arc<EventBus>,
    thumbnail_max_size: (u32, u32),
) {
    debug!("Persistence worker started");

    while let Some(job) = jobs.recv().await {
        match job {
            PersistJob::Photo { data } => {
                let size = data.len();
                match library.save_photo(data).await {
                    Ok(()) => info!("Saved photo to library ({} bytes)", size),
                    Err(e) => report_fault(&event_bus, e),
                }
            }
            PersistJob::Video { path, seq, save } => {
                if save {
                    match library.save_video(&path).await {
                        Ok(()) => info!("Saved video {} to library", path.display()),
                        Err(e) => report_fault(&event_bus, e),
                    }
                }

                match library.video_thumbnail(&path, thumbnail_max_size).await {
                    Ok(thumbnail) => {
                        let _ = commands
                            .send(SessionCommand::ThumbnailReady { thumbnail, seq })
                            .await;
                    }
                    Err(e) => report_fault(&event_bus, e),
                }

                remove_scratch_file(&path).await;
            }
            PersistJob::Flush(reply) => {
                if commands.send(SessionCommand::Barrier(reply)).await.is_err() {
                    debug!("Session actor gone; dropping flush request");
                }
            }
        }
    }

    debug!("Persistence worker stopped");
}

pub(crate) fn report_fault(event_bus: &EventBus, error: CaptureError) {
    // publish() logs the fault at error level
    let _ = event_bus.publish(SnapcamEvent::CaptureFault {
        kind: error.kind().to_string(),
        details: error.to_string(),
    });
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SnapcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by the camera, the media library or thumbnail generation.
///
/// These never cross the session controller boundary as errors: they are
/// logged and republished as `SnapcamEvent::CaptureFault`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Permission denied for {resource}")]
    PermissionDenied { resource: String },

    #[error("Capture device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Capture failed: {details}")]
    CaptureFailed { details: String },

    #[error("Failed to persist media: {details}")]
    PersistenceFailed { details: String },

    #[error("Failed to generate thumbnail: {details}")]
    ThumbnailGenerationFailed { details: String },
}

impl CaptureError {
    /// Stable identifier used for event filtering and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied { .. } => "permission_denied",
            CaptureError::DeviceUnavailable { .. } => "device_unavailable",
            CaptureError::CaptureFailed { .. } => "capture_failed",
            CaptureError::PersistenceFailed { .. } => "persistence_failed",
            CaptureError::ThumbnailGenerationFailed { .. } => "thumbnail_generation_failed",
        }
    }

    pub fn permission_denied<S: Into<String>>(resource: S) -> Self {
        Self::PermissionDenied {
            resource: resource.into(),
        }
    }

    pub fn capture_failed<S: Into<String>>(details: S) -> Self {
        Self::CaptureFailed {
            details: details.into(),
        }
    }

    pub fn persistence_failed<S: Into<String>>(details: S) -> Self {
        Self::PersistenceFailed {
            details: details.into(),
        }
    }

    pub fn thumbnail_failed<S: Into<String>>(details: S) -> Self {
        Self::ThumbnailGenerationFailed {
            details: details.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SnapcamError>;

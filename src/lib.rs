pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod keyboard_input;
pub mod library;
pub mod session;
pub mod settings;
pub mod view;

pub use app::{ComponentState, ShutdownReason, SnapcamApp};
pub use config::SnapcamConfig;
pub use error::{CaptureError, EventBusError, Result, SnapcamError};
pub use events::{EventBus, EventFilter, EventReceiver, SnapcamEvent};
pub use library::FilesystemLibrary;
pub use session::{
    CaptureDevice, MediaLibrary, SessionController, SessionHandle, SessionStatus, Thumbnail,
    ThumbnailSource,
};
pub use settings::{CaptureSettings, SettingsStore, SettingsUpdate};
pub use view::{CaptureMode, ViewController, ViewHandle, ViewSnapshot, ViewState};

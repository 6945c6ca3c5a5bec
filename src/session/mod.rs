mod controller;
mod device;
pub mod mock;
mod persist;
mod scratch;
mod status;
#[cfg(test)]
mod tests;

pub use controller::{SessionController, SessionHandle};
pub use device::{
    CaptureDevice, FocusPoint, MediaLibrary, PhotoRequest, Thumbnail, ThumbnailSource,
};
pub use scratch::{clean_scratch_dir, recording_path, SCRATCH_PREFIX};
pub(crate) use scratch::{file_timestamp, resolve_timestamp_timezone};
pub use status::SessionStatus;

use super::device::Thumbnail;

/// Fields published by the session controller for the presentation layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub is_recording: bool,
    pub camera_permission_granted: bool,
    pub library_permission_granted: bool,
    /// Camera selected and outputs attached
    pub configured: bool,
    pub session_running: bool,
    pub last_thumbnail: Option<Thumbnail>,
}

impl SessionStatus {
    /// Photo capture and recording are only attempted when this holds
    pub fn can_capture(&self) -> bool {
        self.camera_permission_granted && self.configured
    }
}

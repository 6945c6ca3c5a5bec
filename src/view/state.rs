use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen currently shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    Welcome,
    Main,
    Countdown,
    Capturing,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewState::Welcome => "welcome",
            ViewState::Main => "main",
            ViewState::Countdown => "countdown",
            ViewState::Capturing => "capturing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    Photo,
    Video,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Photo => f.write_str("photo"),
            CaptureMode::Video => f.write_str("video"),
        }
    }
}

/// Complete logical state of the view machine.
///
/// `generation` increases on every state entry; timers scheduled under an
/// older generation have no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub mode: CaptureMode,
    pub counter: u8,
    pub generation: u64,
    pub settings_open: bool,
}

impl ViewModel {
    pub fn new() -> Self {
        Self {
            state: ViewState::Welcome,
            mode: CaptureMode::Photo,
            counter: 0,
            generation: 0,
            settings_open: false,
        }
    }

    pub(crate) fn enter(self, state: ViewState) -> Self {
        Self {
            state,
            generation: self.generation.wrapping_add(1),
            ..self
        }
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new()
    }
}

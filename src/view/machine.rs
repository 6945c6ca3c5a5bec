use super::state::{CaptureMode, ViewModel, ViewState};
use crate::config::TimingConfig;
use std::time::Duration;
use tracing::{debug, trace};

/// Delayed steps the machine can ask to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Welcome,
    CountdownTick,
    PhotoCapture,
    PhotoReturn,
}

/// Inputs to the view machine: user taps and expired timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    PhotoTapped,
    VideoTapped,
    SettingsTapped,
    SettingsClosed,
    ScreenTapped,
    TimerFired { kind: TimerKind, generation: u64 },
}

/// Side effects requested by a transition, executed by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Schedule {
        kind: TimerKind,
        generation: u64,
        after: Duration,
    },
    TakePhoto,
    StartRecording,
    StopRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub welcome: Duration,
    pub countdown_start: u8,
    pub countdown_tick: Duration,
    pub photo_capture_delay: Duration,
    pub photo_return: Duration,
}

impl From<&TimingConfig> for Timing {
    fn from(config: &TimingConfig) -> Self {
        Self {
            welcome: config.welcome(),
            countdown_start: config.countdown_start,
            countdown_tick: config.countdown_tick(),
            photo_capture_delay: config.photo_capture_delay(),
            photo_return: config.photo_return(),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&crate::config::SnapcamConfig::default().timing)
    }
}

/// Initial model and the welcome timer that moves it to the main screen
pub fn start(timing: &Timing) -> (ViewModel, Vec<Effect>) {
    let model = ViewModel::new();
    let effects = vec![Effect::Schedule {
        kind: TimerKind::Welcome,
        generation: model.generation,
        after: timing.welcome,
    }];
    (model, effects)
}

/// Pure transition function. Events that do not apply to the current state,
/// including timers from an earlier generation, leave the model unchanged and
/// produce no effects.
pub fn transition(model: ViewModel, event: ViewEvent, timing: &Timing) -> (ViewModel, Vec<Effect>) {
    match (model.state, event) {
        (ViewState::Welcome, ViewEvent::TimerFired { kind: TimerKind::Welcome, generation })
            if generation == model.generation =>
        {
            (model.enter(ViewState::Main), Vec::new())
        }

        (ViewState::Main, ViewEvent::PhotoTapped) if !model.settings_open => {
            enter_countdown(model, CaptureMode::Photo, timing)
        }
        (ViewState::Main, ViewEvent::VideoTapped) if !model.settings_open => {
            enter_countdown(model, CaptureMode::Video, timing)
        }
        (ViewState::Main, ViewEvent::SettingsTapped) => (
            ViewModel {
                settings_open: true,
                ..model
            },
            Vec::new(),
        ),
        (_, ViewEvent::SettingsClosed) if model.settings_open => (
            ViewModel {
                settings_open: false,
                ..model
            },
            Vec::new(),
        ),

        (
            ViewState::Countdown,
            ViewEvent::TimerFired {
                kind: TimerKind::CountdownTick,
                generation,
            },
        ) if generation == model.generation => countdown_tick(model, timing),

        (
            ViewState::Capturing,
            ViewEvent::TimerFired {
                kind: TimerKind::PhotoCapture,
                generation,
            },
        ) if generation == model.generation && model.mode == CaptureMode::Photo => {
            (model, vec![Effect::TakePhoto])
        }
        (
            ViewState::Capturing,
            ViewEvent::TimerFired {
                kind: TimerKind::PhotoReturn,
                generation,
            },
        ) if generation == model.generation && model.mode == CaptureMode::Photo => {
            (model.enter(ViewState::Main), Vec::new())
        }

        (ViewState::Capturing, ViewEvent::ScreenTapped) if model.mode == CaptureMode::Video => {
            (model.enter(ViewState::Main), vec![Effect::StopRecording])
        }

        (_, ViewEvent::TimerFired { kind, generation }) => {
            debug!(
                "Ignoring {:?} timer from generation {} in state {} (generation {})",
                kind, generation, model.state, model.generation
            );
            (model, Vec::new())
        }
        (state, event) => {
            trace!("Event {:?} has no effect in state {}", event, state);
            (model, Vec::new())
        }
    }
}

fn enter_countdown(model: ViewModel, mode: CaptureMode, timing: &Timing) -> (ViewModel, Vec<Effect>) {
    let next = ViewModel {
        mode,
        counter: timing.countdown_start,
        ..model.enter(ViewState::Countdown)
    };
    let effects = vec![Effect::Schedule {
        kind: TimerKind::CountdownTick,
        generation: next.generation,
        after: timing.countdown_tick,
    }];
    (next, effects)
}

fn countdown_tick(model: ViewModel, timing: &Timing) -> (ViewModel, Vec<Effect>) {
    let remaining = model.counter.saturating_sub(1);

    if remaining > 0 {
        let next = ViewModel {
            counter: remaining,
            ..model
        };
        let effects = vec![Effect::Schedule {
            kind: TimerKind::CountdownTick,
            generation: next.generation,
            after: timing.countdown_tick,
        }];
        return (next, effects);
    }

    let next = ViewModel {
        counter: 0,
        ..model.enter(ViewState::Capturing)
    };
    let effects = match next.mode {
        CaptureMode::Photo => vec![
            Effect::Schedule {
                kind: TimerKind::PhotoCapture,
                generation: next.generation,
                after: timing.photo_capture_delay,
            },
            Effect::Schedule {
                kind: TimerKind::PhotoReturn,
                generation: next.generation,
                after: timing.photo_return,
            },
        ],
        CaptureMode::Video => vec![Effect::StartRecording],
    };
    (next, effects)
}

/// Owns a model and applies events to it in place
#[derive(Debug, Clone)]
pub struct ViewMachine {
    model: ViewModel,
    timing: Timing,
}

impl ViewMachine {
    /// Returns the machine together with the effects needed to leave the welcome screen
    pub fn new(timing: Timing) -> (Self, Vec<Effect>) {
        let (model, effects) = start(&timing);
        (Self { model, timing }, effects)
    }

    pub fn model(&self) -> ViewModel {
        self.model
    }

    pub fn handle(&mut self, event: ViewEvent) -> Vec<Effect> {
        let (next, effects) = transition(self.model, event, &self.timing);
        self.model = next;
        effects
    }
}

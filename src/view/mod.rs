mod controller;
mod machine;
mod state;

pub use controller::{ViewController, ViewHandle, ViewSnapshot};
pub use machine::{start, transition, Effect, TimerKind, Timing, ViewEvent, ViewMachine};
pub use state::{CaptureMode, ViewModel, ViewState};

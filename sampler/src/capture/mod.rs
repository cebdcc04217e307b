//! Capture state machine and the task that drives it.

mod controller;
mod handle;
mod report;
mod scheduler;

pub use controller::{CaptureController, CaptureError, CaptureSettings, CaptureState};
pub use handle::{spawn_controller, CaptureHandle};
pub use report::ReportedState;
pub use scheduler::{Tick, TickScheduler};

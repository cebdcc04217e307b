//! Center-region color sampling over a live or frozen camera feed.

pub mod capture;
pub mod region;
pub mod source;

pub use capture::{
    spawn_controller, CaptureController, CaptureError, CaptureHandle, CaptureSettings,
    CaptureState, ReportedState,
};
pub use region::{crop_region, sample_cropped, sample_frame, sample_region, Region, SampleError};
pub use source::{FrameSource, FrameStream, SourceError, StreamConstraints};

//! Per frame orchestration: ROI, ground removal, downsampling, registration against
//! the previous frame, pose accumulation and map fusion.

mod params;
pub use params::{PipelineParams, RegistrationFailurePolicy};
mod pipeline;
pub use pipeline::Pipeline;
mod report;
pub use report::{FrameOutcome, FrameReport, SessionSummary};
mod source;
pub use source::{FrameSource, IterFrameSource};
mod viewer;
pub use viewer::{ChannelViewer, MapSnapshot, MapViewer, SendOutcome};

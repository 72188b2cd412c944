use crate::{error::Error, icp::RegistrationResult, transform::Transform};

/// How a frame ended up in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Fused at the current pose without registration. Happens on the first frame and
    /// whenever the previous fused frame is too sparse to register against.
    Anchored,
    /// Registration converged and the frame was fused.
    Registered,
    /// Registration did not converge, the frame was fused with the best transform found.
    BestEffort,
    /// Registration did not converge, the frame was not fused and the pose was kept.
    Skipped,
}

impl FrameOutcome {
    pub fn is_fused(&self) -> bool {
        !matches!(self, FrameOutcome::Skipped)
    }
}

/// Summary of one processed frame.
#[derive(Debug)]
pub struct FrameReport {
    pub index: usize,
    pub input_points: usize,
    /// Points inside the region of interest.
    pub roi_points: usize,
    /// Points removed as ground.
    pub ground_points: usize,
    /// Points used for registration.
    pub downsampled_points: usize,
    /// `None` for anchored frames.
    pub registration: Option<RegistrationResult>,
    pub outcome: FrameOutcome,
    /// Pose after the frame.
    pub pose: Transform,
    /// Map size after the frame.
    pub map_points: usize,
    /// Recoverable problems found while processing the frame.
    pub warnings: Vec<Error>,
}

/// Result of [`crate::pipeline::Pipeline::run`].
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub reports: Vec<FrameReport>,
    /// Frames that failed, with their error. Their state changes were discarded.
    pub failures: Vec<(usize, Error)>,
    /// True if the viewer disconnected during the session.
    pub viewer_closed: bool,
}

impl SessionSummary {
    /// Number of frames pulled from the source.
    pub fn frames(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    pub fn fused(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_fused())
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome == FrameOutcome::Skipped)
            .count()
    }
}

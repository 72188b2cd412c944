use log::{debug, info, warn};

use super::{
    params::{PipelineParams, RegistrationFailurePolicy},
    report::{FrameOutcome, FrameReport, SessionSummary},
    source::FrameSource,
    viewer::{MapViewer, SendOutcome},
};
use crate::{
    error::Error,
    filter::{crop_box, Downsample},
    fusion::{GlobalMap, MapFuser},
    icp::{Icp, RegistrationResult},
    pointcloud::PointCloud,
    pose_accumulator::PoseAccumulator,
    segmentation::PlaneSegmenter,
    trajectory::Trajectory,
    transform::Transform,
};

/// Registration outcome of a frame, before any state is modified.
struct Alignment {
    relative: Transform,
    registration: Option<RegistrationResult>,
    outcome: FrameOutcome,
}

/// Sequential registration and fusion of a stream of frames.
///
/// Owns the running pose and the global map. Both are only updated once a frame
/// went through every stage, so a failed frame leaves no partial state behind.
pub struct Pipeline {
    params: PipelineParams,
    segmenter: Option<PlaneSegmenter>,
    fuser: MapFuser,
    accumulator: PoseAccumulator,
    map: GlobalMap,
    /// Downsampled previous frame, with normals. Registration target of the next frame,
    /// or replaced by it when too sparse to register against.
    previous: Option<PointCloud>,
    last_relative: Transform,
    next_index: usize,
}

impl Pipeline {
    /// Validates `params` and creates an empty session.
    pub fn new(params: PipelineParams) -> Result<Self, Error> {
        params.validate()?;
        let segmenter = params.ground.clone().map(PlaneSegmenter::new).transpose()?;
        let fuser = MapFuser::new(params.fusion)?;
        Ok(Self {
            params,
            segmenter,
            fuser,
            accumulator: PoseAccumulator::new(),
            map: GlobalMap::new(),
            previous: None,
            last_relative: Transform::eye(),
            next_index: 0,
        })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn map(&self) -> &GlobalMap {
        &self.map
    }

    /// Current sensor pose relative to the first frame.
    pub fn pose(&self) -> Transform {
        self.accumulator.pose()
    }

    /// Pose of every processed frame.
    pub fn trajectory(&self) -> &Trajectory {
        self.accumulator.trajectory()
    }

    /// Drops the map and the pose, keeping the parameters.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.map = GlobalMap::new();
        self.previous = None;
        self.last_relative = Transform::eye();
        self.next_index = 0;
    }

    /// Smallest registration target ICP can accept correspondences from.
    fn min_target_points(&self) -> usize {
        self.params.icp.min_correspondences.max(3)
    }

    fn register(
        &self,
        target: &PointCloud,
        moving: &PointCloud,
        warnings: &mut Vec<Error>,
    ) -> Result<Alignment, Error> {
        let initial = if self.params.use_motion_prior {
            self.last_relative
        } else {
            Transform::eye()
        };
        let result = Icp::new(self.params.icp, target)?
            .with_initial_transform(initial)
            .align(moving);

        if result.converged {
            return Ok(Alignment {
                relative: result.transform,
                registration: Some(result),
                outcome: FrameOutcome::Registered,
            });
        }

        let relative = result.transform;
        let diverged = result.clone().ok_if_converged().err();
        let outcome = match self.params.failure_policy {
            RegistrationFailurePolicy::SkipFrame => FrameOutcome::Skipped,
            RegistrationFailurePolicy::AcceptBestEffort => FrameOutcome::BestEffort,
        };
        if let Some(err) = diverged {
            warn!("{err}, frame {:?}", outcome);
            warnings.push(err);
        }
        Ok(Alignment {
            relative,
            registration: Some(result),
            outcome,
        })
    }

    /// Runs one frame through every stage and updates the map and the pose.
    ///
    /// Recoverable problems (no ground plane, non-converged registration) are handled
    /// per the parameters and listed in the report. An error means the frame was
    /// dropped without touching the session state.
    pub fn process_frame(&mut self, frame: &PointCloud) -> Result<FrameReport, Error> {
        let index = self.next_index;
        self.next_index += 1;
        let mut warnings = Vec::new();

        let cropped = match self.params.roi.as_ref() {
            Some(roi) => crop_box(frame, roi)?,
            None => frame.clone(),
        };

        let (ground_points, non_ground) = match self.segmenter.as_ref() {
            Some(segmenter) => {
                let segmentation = segmenter.segment(&cropped);
                match segmentation.plane() {
                    Ok(_) => (
                        segmentation.inliers.len(),
                        cropped.select(&segmentation.outliers),
                    ),
                    Err(err) => {
                        warn!("Frame {index}: {err}, keeping every point");
                        warnings.push(err);
                        (0, cropped.clone())
                    }
                }
            }
            None => (0, cropped.clone()),
        };

        let mut downsampled = self.params.downsample.downsample(&non_ground)?;
        downsampled.ensure_normals(self.params.icp.normal_neighbors);
        let downsampled_points = downsampled.len();
        debug!(
            "Frame {index}: {} input, {} in ROI, {} ground, {} downsampled",
            frame.len(),
            cropped.len(),
            ground_points,
            downsampled_points
        );

        let alignment = match self.previous.as_ref() {
            Some(previous) if previous.len() >= self.min_target_points() => {
                self.register(previous, &downsampled, &mut warnings)?
            }
            target => {
                if let Some(target) = target {
                    warn!(
                        "Frame {index}: previous frame has {} points, anchoring again",
                        target.len()
                    );
                }
                Alignment {
                    relative: Transform::eye(),
                    registration: None,
                    outcome: FrameOutcome::Anchored,
                }
            }
        };

        let pose = if alignment.outcome.is_fused() {
            let pose = self.accumulator.peek(&alignment.relative)?;
            self.fuser
                .fuse(&mut self.map, &(&pose * &non_ground), &pose)?;
            self.accumulator.accumulate(&alignment.relative, Some(index))?;
            self.previous = Some(downsampled);
            self.last_relative = alignment.relative;
            pose
        } else {
            self.accumulator.hold(Some(index))
        };

        Ok(FrameReport {
            index,
            input_points: frame.len(),
            roi_points: cropped.len(),
            ground_points,
            downsampled_points,
            registration: alignment.registration,
            outcome: alignment.outcome,
            pose,
            map_points: self.map.len(),
            warnings,
        })
    }

    /// Processes every frame of `source`, publishing the map to `viewer` after each
    /// fused frame. Failed frames are logged and the session goes on.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        mut viewer: Option<&mut dyn MapViewer>,
    ) -> SessionSummary {
        let mut summary = SessionSummary::default();
        while let Some(frame) = source.next_frame() {
            let index = self.next_index;
            match self.process_frame(&frame) {
                Ok(report) => {
                    let disconnected = report.outcome.is_fused()
                        && viewer.as_mut().map_or(false, |viewer| {
                            viewer.publish(index, &self.map) == SendOutcome::Disconnected
                        });
                    if disconnected {
                        warn!("Viewer disconnected at frame {index}, no more updates");
                        summary.viewer_closed = true;
                        viewer = None;
                    }
                    summary.reports.push(report);
                }
                Err(err) => {
                    warn!("Frame {index} dropped: {err}");
                    summary.failures.push((index, err));
                }
            }
        }
        info!(
            "Session finished: {} frames, {} fused, {} skipped, {} failed, map of {} points",
            summary.frames(),
            summary.fused(),
            summary.skipped(),
            summary.failures.len(),
            self.map.len()
        );
        summary
    }
}

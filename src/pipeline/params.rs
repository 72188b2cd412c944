use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::{
    bounds::Box3D, error::Error, filter::DownsampleStrategy, fusion::FusionParams,
    icp::IcpParams, segmentation::PlaneSegmentationParams,
};

/// What to do with a frame whose registration did not converge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFailurePolicy {
    /// Do not fuse the frame and keep the previous pose. The next frame is registered
    /// against the last fused one.
    #[default]
    SkipFrame,
    /// Accumulate and fuse using the best transform found.
    AcceptBestEffort,
}

/// Parameters of a mapping session.
///
/// Every field has a default, so a JSON document only needs the values it changes:
///
/// ```
/// use scanfuse::pipeline::{PipelineParams, RegistrationFailurePolicy};
///
/// let params = PipelineParams::from_json_str(
///     r#"{"fusion": {"merge_voxel_size": 0.2}, "failure_policy": "accept_best_effort"}"#,
/// )
/// .unwrap();
/// assert_eq!(params.fusion.merge_voxel_size, 0.2);
/// assert_eq!(params.failure_policy, RegistrationFailurePolicy::AcceptBestEffort);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Region of interest in sensor coordinates.
    /// Default: None, every point is kept
    pub roi: Option<Box3D>,
    /// Ground plane removal.
    /// Default: enabled with the default segmentation parameters
    pub ground: Option<PlaneSegmentationParams>,
    /// Downsampling of the frames used for registration.
    /// Default: grid average with 0.1 m voxels
    pub downsample: DownsampleStrategy,
    pub icp: IcpParams,
    pub fusion: FusionParams,
    /// Default: SkipFrame
    pub failure_policy: RegistrationFailurePolicy,
    /// Start each registration from the previous relative transform instead of
    /// the identity.
    /// Default: true
    pub use_motion_prior: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            roi: None,
            ground: Some(PlaneSegmentationParams::default()),
            downsample: DownsampleStrategy::default(),
            icp: IcpParams::default(),
            fusion: FusionParams::default(),
            failure_policy: RegistrationFailurePolicy::default(),
            use_motion_prior: true,
        }
    }
}

impl PipelineParams {
    pub fn with_roi(mut self, roi: Box3D) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn with_ground(mut self, ground: Option<PlaneSegmentationParams>) -> Self {
        self.ground = ground;
        self
    }

    pub fn with_downsample(mut self, downsample: DownsampleStrategy) -> Self {
        self.downsample = downsample;
        self
    }

    pub fn with_icp(mut self, icp: IcpParams) -> Self {
        self.icp = icp;
        self
    }

    pub fn with_merge_voxel_size(mut self, meters: f64) -> Self {
        self.fusion.merge_voxel_size = meters;
        self
    }

    pub fn with_failure_policy(mut self, policy: RegistrationFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_motion_prior(mut self, enabled: bool) -> Self {
        self.use_motion_prior = enabled;
        self
    }

    /// Checks every parameter group.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(roi) = self.roi.as_ref() {
            roi.validate()?;
        }
        if let Some(ground) = self.ground.as_ref() {
            ground.validate()?;
        }
        self.downsample.validate()?;
        self.icp.validate()?;
        self.fusion.validate()
    }

    /// Parses and validates parameters from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Reads, parses and validates parameters from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

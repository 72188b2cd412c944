//! Map fusion: voxel merge of posed frames into the persistent map.

use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::{
    bounds::Box3D,
    error::Error,
    filter::voxel_downsample,
    pointcloud::{PointCloud, PointRecord},
    transform::Transform,
    voxel::check_voxel_size,
};

/// Persistent accumulated map of a session: the fused cloud in the frame of the
/// first frame and the latest sensor pose.
#[derive(Clone, Debug, Default)]
pub struct GlobalMap {
    cloud: PointCloud,
    pose: Transform,
}

impl GlobalMap {
    /// Empty map anchored at the identity pose.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    /// Pose of the last fused frame.
    pub fn pose(&self) -> Transform {
        self.pose
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    pub fn bounds(&self) -> Option<Box3D> {
        self.cloud.bounds()
    }

    /// Flat list of `x, y, z[, color]` records of the map.
    pub fn to_records(&self) -> Vec<PointRecord> {
        self.cloud.to_records()
    }
}

/// Configuration of the map fuser.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// Voxel size of the merge grid (meters).
    /// Default: 0.1
    pub merge_voxel_size: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            merge_voxel_size: 0.1,
        }
    }
}

impl FusionParams {
    pub fn with_merge_voxel_size(mut self, meters: f64) -> Self {
        self.merge_voxel_size = meters;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        check_voxel_size(self.merge_voxel_size)
    }
}

/// Merges posed frames into a [`GlobalMap`]. The union of the map and the frame is
/// grid averaged, so the map size is bounded by the covered volume.
#[derive(Clone, Debug)]
pub struct MapFuser {
    params: FusionParams,
}

impl MapFuser {
    pub fn new(params: FusionParams) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Fuses `posed_frame`, already in map coordinates, and records `pose` as the
    /// map pose. The map is only modified if the merge succeeds.
    pub fn fuse(
        &self,
        map: &mut GlobalMap,
        posed_frame: &PointCloud,
        pose: &Transform,
    ) -> Result<(), Error> {
        let merged = voxel_downsample(
            &map.cloud.concat(posed_frame),
            self.params.merge_voxel_size,
        )?;
        debug!(
            "Fused {} points into a map of {}, now {}",
            posed_frame.len(),
            map.len(),
            merged.len()
        );
        map.cloud = merged;
        map.pose = *pose;
        Ok(())
    }
}

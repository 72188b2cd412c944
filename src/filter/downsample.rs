use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::pointcloud::PointCloud;
use crate::voxel::VoxelGrid;

/// Reduces the density of a point cloud.
pub trait Downsample {
    fn downsample(&self, pcl: &PointCloud) -> Result<PointCloud, Error>;
}

/// Downsampling strategies, selected per call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DownsampleStrategy {
    /// One point per occupied voxel, the mean of its members.
    GridAverage { voxel_size: f64 },
    /// Keeps exactly `round(keep_fraction * n)` of the `n` valid points, drawn
    /// uniformly without replacement from a generator seeded with `seed`.
    Random { keep_fraction: f64, seed: u64 },
}

impl Default for DownsampleStrategy {
    fn default() -> Self {
        DownsampleStrategy::GridAverage { voxel_size: 0.1 }
    }
}

impl DownsampleStrategy {
    pub fn validate(&self) -> Result<(), Error> {
        match *self {
            DownsampleStrategy::GridAverage { voxel_size } => {
                crate::voxel::check_voxel_size(voxel_size)
            }
            DownsampleStrategy::Random { keep_fraction, .. } => {
                if keep_fraction > 0.0 && keep_fraction <= 1.0 {
                    Ok(())
                } else {
                    Err(Error::invalid_parameter(format!(
                        "keep fraction must be in (0, 1], got {keep_fraction}"
                    )))
                }
            }
        }
    }
}

impl Downsample for DownsampleStrategy {
    fn downsample(&self, pcl: &PointCloud) -> Result<PointCloud, Error> {
        match *self {
            DownsampleStrategy::GridAverage { voxel_size } => voxel_downsample(pcl, voxel_size),
            DownsampleStrategy::Random {
                keep_fraction,
                seed,
            } => random_downsample(pcl, keep_fraction, seed),
        }
    }
}

/// Grid-average downsampling. The output has exactly one point per occupied voxel.
pub fn voxel_downsample(pcl: &PointCloud, voxel_size: f64) -> Result<PointCloud, Error> {
    let mut grid = VoxelGrid::new(voxel_size)?;
    grid.insert(pcl);
    Ok(grid.to_point_cloud())
}

/// Random decimation keeping an exact fraction of the valid points. Kept points
/// preserve their input order.
pub fn random_downsample(
    pcl: &PointCloud,
    keep_fraction: f64,
    seed: u64,
) -> Result<PointCloud, Error> {
    DownsampleStrategy::Random {
        keep_fraction,
        seed,
    }
    .validate()?;

    let valid = pcl.valid_indices();
    let amount = ((valid.len() as f64) * keep_fraction).round() as usize;
    let amount = amount.min(valid.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, valid.len(), amount).into_vec();
    picked.sort_unstable();

    let indices = picked.into_iter().map(|i| valid[i]).collect::<Vec<_>>();
    Ok(pcl.select(&indices))
}

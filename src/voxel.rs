use std::collections::HashMap;

use nalgebra::Vector3;

use crate::error::Error;
use crate::pointcloud::{is_finite_point, PointCloud};

/// Integer cell coordinates of a voxel, `floor(coordinate / voxel_size)` per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelKey {
    pub ix: i64,
    pub iy: i64,
    pub iz: i64,
}

impl VoxelKey {
    /// Cell of `point` in a grid of `voxel_size`. Cells are half-open:
    /// `[k * size, (k + 1) * size)`.
    ///
    /// Returns `None` for non-finite points and for cells whose index does not fit
    /// in an `i64`, so distinct cells never share a key.
    pub fn from_point(point: &Vector3<f64>, voxel_size: f64) -> Option<Self> {
        Some(Self {
            ix: cell_index(point[0], voxel_size)?,
            iy: cell_index(point[1], voxel_size)?,
            iz: cell_index(point[2], voxel_size)?,
        })
    }
}

fn cell_index(coordinate: f64, voxel_size: f64) -> Option<i64> {
    // i64::MIN is exactly -2^63 and `i64::MAX as f64` rounds up to 2^63.
    let cell = (coordinate / voxel_size).floor();
    (cell >= i64::MIN as f64 && cell < i64::MAX as f64).then_some(cell as i64)
}

pub(crate) fn check_voxel_size(voxel_size: f64) -> Result<(), Error> {
    if voxel_size.is_finite() && voxel_size > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "voxel size must be strictly positive, got {voxel_size}"
        )))
    }
}

#[derive(Clone, Debug)]
struct VoxelAccumulator {
    count: usize,
    position: Vector3<f64>,
    normal: Vector3<f64>,
    color: Vector3<f64>,
    intensity: f64,
}

impl VoxelAccumulator {
    fn new() -> Self {
        Self {
            count: 0,
            position: Vector3::zeros(),
            normal: Vector3::zeros(),
            color: Vector3::zeros(),
            intensity: 0.0,
        }
    }
}

/// Voxel hash that averages every attribute of the points falling in each cell.
/// Voxels are emitted in the order they were first occupied, so the output only
/// depends on the input order.
pub struct VoxelGrid {
    voxel_size: f64,
    cells: HashMap<VoxelKey, usize>,
    voxels: Vec<VoxelAccumulator>,
    has_normals: bool,
    has_colors: bool,
    has_intensities: bool,
}

impl VoxelGrid {
    pub fn new(voxel_size: f64) -> Result<Self, Error> {
        check_voxel_size(voxel_size)?;
        Ok(Self {
            voxel_size,
            cells: HashMap::new(),
            voxels: Vec::new(),
            has_normals: true,
            has_colors: true,
            has_intensities: true,
        })
    }

    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Number of occupied voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn contains(&self, key: &VoxelKey) -> bool {
        self.cells.contains_key(key)
    }

    /// Adds the valid points of `pcl`. An attribute is averaged in the output only if
    /// every inserted cloud carries it.
    pub fn insert(&mut self, pcl: &PointCloud) {
        if pcl.is_empty() {
            return;
        }
        self.has_normals &= pcl.normals.is_some();
        self.has_colors &= pcl.colors.is_some();
        self.has_intensities &= pcl.intensities.is_some();

        for (idx, point) in pcl.points.iter().enumerate() {
            if !is_finite_point(point) {
                continue;
            }
            let Some(key) = VoxelKey::from_point(point, self.voxel_size) else {
                continue;
            };
            let voxels = &mut self.voxels;
            let slot = *self.cells.entry(key).or_insert_with(|| {
                voxels.push(VoxelAccumulator::new());
                voxels.len() - 1
            });

            let voxel = &mut self.voxels[slot];
            voxel.count += 1;
            voxel.position += point;
            if let Some(normals) = pcl.normals.as_ref() {
                voxel.normal += normals[idx];
            }
            if let Some(colors) = pcl.colors.as_ref() {
                voxel.color += colors[idx].cast::<f64>();
            }
            if let Some(intensities) = pcl.intensities.as_ref() {
                voxel.intensity += intensities[idx] as f64;
            }
        }
    }

    /// One point per occupied voxel: the mean of its members.
    pub fn to_point_cloud(&self) -> PointCloud {
        let mean = |v: &VoxelAccumulator, sum: Vector3<f64>| sum / v.count as f64;
        let points = self
            .voxels
            .iter()
            .map(|v| mean(v, v.position))
            .collect();
        let mut pcl = PointCloud::new(points);
        if self.is_empty() {
            return pcl;
        }

        if self.has_normals {
            pcl.normals = Some(
                self.voxels
                    .iter()
                    .map(|v| {
                        let normal = v.normal;
                        let norm = normal.norm();
                        if norm > 0.0 {
                            normal / norm
                        } else {
                            normal
                        }
                    })
                    .collect(),
            );
        }
        if self.has_colors {
            pcl.colors = Some(
                self.voxels
                    .iter()
                    .map(|v| mean(v, v.color).map(|c| c.round().clamp(0.0, 255.0) as u8))
                    .collect(),
            );
        }
        if self.has_intensities {
            pcl.intensities = Some(
                self.voxels
                    .iter()
                    .map(|v| (v.intensity / v.count as f64) as f32)
                    .collect(),
            );
        }
        pcl
    }
}

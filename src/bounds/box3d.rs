use nalgebra::Vector3;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Axis aligned box. Both `min` and `max` are part of the box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box3D {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Box3D {
    /// Creates a box, failing with `InvalidBounds` if `min > max` on any axis.
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Result<Self, Error> {
        let bbox = Self { min, max };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Creates a box from the six bounds `{x_min, x_max, y_min, y_max, z_min, z_max}`.
    pub fn from_limits(limits: [f64; 6]) -> Result<Self, Error> {
        Self::new(
            Vector3::new(limits[0], limits[2], limits[4]),
            Vector3::new(limits[1], limits[3], limits[5]),
        )
    }

    /// Box that contains every finite point.
    pub fn infinite() -> Self {
        Self {
            min: Vector3::repeat(f64::NEG_INFINITY),
            max: Vector3::repeat(f64::INFINITY),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (axis, name) in ["x", "y", "z"].iter().enumerate() {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(Error::invalid_bounds(format!(
                    "{name} axis has min {lo} > max {hi}"
                )));
            }
        }
        Ok(())
    }

    /// Inclusive containment test. Non-finite points are never contained.
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        (0..3).all(|axis| {
            let v = point[axis];
            v.is_finite() && self.min[axis] <= v && v <= self.max[axis]
        })
    }
}

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::normals::DEFAULT_NORMAL_NEIGHBORS;

/// Parameters of the point-to-plane ICP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Maximum number of iterations. Bounds the registration time.
    /// Default: 30
    pub max_iterations: usize,
    /// Stop once the relative improvement of the RMS residual between two
    /// iterations falls below this value.
    /// Default: 1e-6
    pub convergence_tolerance: f64,
    /// Maximum distance between corresponding points (meters).
    /// Default: 1.0
    pub max_distance: f64,
    /// Maximum angle between the normals of corresponding points (radians).
    /// Default: 45 degrees
    pub max_normal_angle: f64,
    /// Minimum number of accepted correspondences.
    /// Default: 6
    pub min_correspondences: usize,
    /// Minimum fraction of the moving points with an accepted correspondence.
    /// Default: 0.05
    pub min_correspondence_ratio: f64,
    /// Neighborhood size used to estimate missing normals.
    /// Default: 10
    pub normal_neighbors: usize,
    /// Extrapolate along consistent update directions.
    /// Default: true
    pub extrapolation: bool,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            convergence_tolerance: 1e-6,
            max_distance: 1.0,
            max_normal_angle: 45.0_f64.to_radians(),
            min_correspondences: 6,
            min_correspondence_ratio: 0.05,
            normal_neighbors: DEFAULT_NORMAL_NEIGHBORS,
            extrapolation: true,
        }
    }
}

impl IcpParams {
    pub fn with_max_iterations(mut self, value: usize) -> Self {
        self.max_iterations = value;
        self
    }

    pub fn with_convergence_tolerance(mut self, value: f64) -> Self {
        self.convergence_tolerance = value;
        self
    }

    pub fn with_max_distance(mut self, meters: f64) -> Self {
        self.max_distance = meters;
        self
    }

    pub fn with_max_normal_angle(mut self, radians: f64) -> Self {
        self.max_normal_angle = radians;
        self
    }

    pub fn with_extrapolation(mut self, enabled: bool) -> Self {
        self.extrapolation = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_iterations == 0 {
            return Err(Error::invalid_parameter("ICP needs at least one iteration"));
        }
        if !(self.convergence_tolerance.is_finite() && self.convergence_tolerance >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "ICP convergence tolerance must be non-negative, got {}",
                self.convergence_tolerance
            )));
        }
        if !(self.max_distance > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "ICP correspondence distance must be strictly positive, got {}",
                self.max_distance
            )));
        }
        if !(self.max_normal_angle > 0.0 && self.max_normal_angle <= std::f64::consts::PI) {
            return Err(Error::invalid_parameter(format!(
                "ICP normal angle must be in (0, pi], got {}",
                self.max_normal_angle
            )));
        }
        if !(0.0..=1.0).contains(&self.min_correspondence_ratio) {
            return Err(Error::invalid_parameter(format!(
                "ICP correspondence ratio must be in [0, 1], got {}",
                self.min_correspondence_ratio
            )));
        }
        if self.normal_neighbors < 3 {
            return Err(Error::invalid_parameter(
                "normal estimation needs at least 3 neighbors",
            ));
        }
        Ok(())
    }
}

//! RANSAC plane segmentation.
//!
//! Samples minimal point triples, scores the candidate planes by their inlier
//! count and refines the winner with a total least squares fit over its inliers.

use log::{debug, warn};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_derive::{Deserialize, Serialize};

use super::plane::Plane;
use crate::error::Error;
use crate::pointcloud::PointCloud;
use crate::trig::angle_between_lines;

/// Rounds of least squares refit and inlier reclassification after sampling.
const REFINE_ROUNDS: usize = 3;

/// Configuration of the plane segmenter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneSegmentationParams {
    /// Maximum point to plane distance of an inlier (meters).
    /// Default: 0.1
    pub max_distance: f64,
    /// Expected plane normal, e.g. the gravity axis for ground removal.
    /// Default: +Z
    pub reference_normal: Vector3<f64>,
    /// Maximum angle between a candidate normal and the reference normal (radians).
    /// Default: 20 degrees
    pub max_angle: f64,
    /// Number of sampled candidates.
    /// Default: 200
    pub max_iterations: usize,
    /// Stop sampling once this fraction of the points are inliers.
    /// Default: 0.9
    pub early_exit_inlier_ratio: f64,
    /// Minimum number of valid points to attempt a fit.
    /// Default: 3
    pub min_points: usize,
    /// Seed of the sampler.
    /// Default: 0
    pub seed: u64,
}

impl Default for PlaneSegmentationParams {
    fn default() -> Self {
        Self {
            max_distance: 0.1,
            reference_normal: Vector3::z(),
            max_angle: 20.0_f64.to_radians(),
            max_iterations: 200,
            early_exit_inlier_ratio: 0.9,
            min_points: 3,
            seed: 0,
        }
    }
}

impl PlaneSegmentationParams {
    /// Builder-style setter for the inlier distance.
    pub fn with_max_distance(mut self, meters: f64) -> Self {
        self.max_distance = meters;
        self
    }

    /// Builder-style setter for the reference normal.
    pub fn with_reference_normal(mut self, normal: Vector3<f64>) -> Self {
        self.reference_normal = normal;
        self
    }

    /// Builder-style setter for the maximum deviation from the reference normal.
    pub fn with_max_angle(mut self, radians: f64) -> Self {
        self.max_angle = radians;
        self
    }

    /// Builder-style setter for the number of sampled candidates.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "plane max distance must be strictly positive, got {}",
                self.max_distance
            )));
        }
        let norm = self.reference_normal.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(Error::invalid_parameter(
                "plane reference normal must be a non-zero vector",
            ));
        }
        if !(self.max_angle >= 0.0 && self.max_angle <= std::f64::consts::FRAC_PI_2) {
            return Err(Error::invalid_parameter(format!(
                "plane max angle must be in [0, pi/2], got {}",
                self.max_angle
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid_parameter(
                "plane segmentation needs at least one iteration",
            ));
        }
        if !(self.early_exit_inlier_ratio > 0.0 && self.early_exit_inlier_ratio <= 1.0) {
            return Err(Error::invalid_parameter(format!(
                "early exit inlier ratio must be in (0, 1], got {}",
                self.early_exit_inlier_ratio
            )));
        }
        Ok(())
    }
}

/// Partition of a point cloud by a plane. Points with non-finite coordinates
/// are in neither set.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneSegmentation {
    /// The fitted plane, `None` when no plane was found.
    pub plane: Option<Plane>,
    pub inliers: Vec<usize>,
    pub outliers: Vec<usize>,
}

impl PlaneSegmentation {
    /// Converts a missing plane into a `PlaneNotFound` error.
    pub fn plane(&self) -> Result<&Plane, Error> {
        self.plane.as_ref().ok_or_else(|| {
            Error::PlaneNotFound(format!(
                "no plane among {} points",
                self.inliers.len() + self.outliers.len()
            ))
        })
    }
}

/// Candidate score. Higher inlier count wins, then smaller residual sum.
#[derive(Clone, Copy, Debug)]
struct Score {
    inliers: usize,
    residual_sum: f64,
}

impl Score {
    fn better_than(&self, other: &Score) -> bool {
        self.inliers > other.inliers
            || (self.inliers == other.inliers && self.residual_sum < other.residual_sum)
    }
}

pub struct PlaneSegmenter {
    params: PlaneSegmentationParams,
}

impl PlaneSegmenter {
    pub fn new(params: PlaneSegmentationParams) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PlaneSegmentationParams {
        &self.params
    }

    fn score(&self, plane: &Plane, points: &[Vector3<f64>]) -> Score {
        points.iter().fold(
            Score {
                inliers: 0,
                residual_sum: 0.0,
            },
            |mut score, p| {
                let dist = plane.distance(p);
                if dist <= self.params.max_distance {
                    score.inliers += 1;
                    score.residual_sum += dist;
                }
                score
            },
        )
    }

    fn accepts_orientation(&self, plane: &Plane) -> bool {
        let reference = self.params.reference_normal.normalize();
        angle_between_lines(&plane.normal, &reference) <= self.params.max_angle
    }

    /// Splits `pcl` into the points within `max_distance` of the dominant plane
    /// aligned with the reference normal, and the rest.
    pub fn segment(&self, pcl: &PointCloud) -> PlaneSegmentation {
        let valid = pcl.valid_indices();
        let points = valid.iter().map(|idx| pcl.points[*idx]).collect::<Vec<_>>();
        let not_found = || PlaneSegmentation {
            plane: None,
            inliers: Vec::new(),
            outliers: valid.clone(),
        };

        if points.len() < self.params.min_points.max(3) {
            warn!(
                "Plane segmentation: only {} valid points, no plane fitted",
                points.len()
            );
            return not_found();
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let early_exit =
            (self.params.early_exit_inlier_ratio * points.len() as f64).ceil() as usize;
        let mut best: Option<(Plane, Score)> = None;

        for iteration in 0..self.params.max_iterations {
            let sample = rand::seq::index::sample(&mut rng, points.len(), 3);
            let Some(plane) = Plane::from_points(
                &points[sample.index(0)],
                &points[sample.index(1)],
                &points[sample.index(2)],
            ) else {
                continue;
            };
            if !self.accepts_orientation(&plane) {
                continue;
            }

            let score = self.score(&plane, &points);
            if best
                .as_ref()
                .map_or(true, |(_, best_score)| score.better_than(best_score))
            {
                best = Some((plane, score));
                if score.inliers >= early_exit {
                    debug!("Plane segmentation: early exit at iteration {iteration}");
                    break;
                }
            }
        }

        let Some((mut plane, _)) = best else {
            warn!("Plane segmentation: no candidate aligned with the reference normal");
            return not_found();
        };

        let mut inlier_mask = self.inlier_mask(&plane, &points);
        for _ in 0..REFINE_ROUNDS {
            let refit = Plane::fit(
                points
                    .iter()
                    .zip(inlier_mask.iter())
                    .filter(|(_, inlier)| **inlier)
                    .map(|(p, _)| p),
            );
            let Some((refit, _)) = refit else {
                break;
            };
            let refit_mask = self.inlier_mask(&refit, &points);
            let stable = refit_mask == inlier_mask;
            plane = refit;
            inlier_mask = refit_mask;
            if stable {
                break;
            }
        }
        let plane = plane.oriented_towards(&self.params.reference_normal);

        let (inliers, outliers): (Vec<_>, Vec<_>) = valid
            .iter()
            .zip(inlier_mask.iter())
            .partition(|(_, inlier)| **inlier);
        let inliers = inliers.into_iter().map(|(idx, _)| *idx).collect::<Vec<_>>();
        let outliers = outliers.into_iter().map(|(idx, _)| *idx).collect::<Vec<_>>();

        debug!(
            "Plane segmentation: normal {:?}, {} inliers, {} outliers",
            plane.normal.as_slice(),
            inliers.len(),
            outliers.len()
        );

        PlaneSegmentation {
            plane: Some(plane),
            inliers,
            outliers,
        }
    }

    fn inlier_mask(&self, plane: &Plane, points: &[Vector3<f64>]) -> Vec<bool> {
        points
            .iter()
            .map(|p| plane.distance(p) <= self.params.max_distance)
            .collect()
    }
}

use std::collections::VecDeque;

use log::{debug, trace};
use nalgebra::{Vector3, Vector6};
use ndarray::{Array1, Zip};

use super::cost_function::PointPlaneDistance;
use super::icp_params::IcpParams;
use crate::{
    error::Error,
    kdtree::KdTree,
    normals::estimate_normals_with_tree,
    optim::GaussNewton,
    pointcloud::{is_finite_point, PointCloud},
    transform::Transform,
    trig,
};

/// Minimum cosine between consecutive updates to consider the direction consistent.
const EXTRAPOLATION_MIN_COSINE: f64 = 0.9;
/// RMS residual considered an exact alignment.
const RESIDUAL_FLOOR: f64 = 1e-12;

/// Why the ICP loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The relative residual improvement dropped below the tolerance.
    Converged,
    /// `max_iterations` was reached.
    MaxIterations,
    /// Not enough correspondences were accepted.
    TooFewCorrespondences,
    /// The linear system was rank deficient or produced a non-finite update.
    Degenerate,
}

/// Output of one registration.
#[derive(Clone, Debug)]
pub struct RegistrationResult {
    /// Best transform found, mapping the moving cloud onto the fixed one.
    pub transform: Transform,
    /// True iff the loop stopped by the convergence tolerance.
    pub converged: bool,
    pub iterations: usize,
    /// RMS point-to-plane error of `transform` over its accepted correspondences.
    /// `f64::INFINITY` when the first iteration already failed and no residual was
    /// ever measured; check `is_finite` before aggregating.
    pub final_residual: f64,
    /// Accepted correspondences of `transform`.
    pub correspondences: usize,
    /// Number of accepted extrapolation steps.
    pub extrapolations: usize,
    pub termination: Termination,
}

impl RegistrationResult {
    /// Turns a non-converged registration into a `RegistrationDiverged` error.
    pub fn ok_if_converged(self) -> Result<Self, Error> {
        if self.converged {
            Ok(self)
        } else {
            Err(Error::RegistrationDiverged(format!(
                "{:?} after {} iterations, residual {:.6}, {} correspondences",
                self.termination, self.iterations, self.final_residual, self.correspondences
            )))
        }
    }
}

/// Linearized system of one correspondence search.
struct Linearization {
    optimizer: GaussNewton<6>,
}

impl Linearization {
    fn count(&self) -> usize {
        self.optimizer.count()
    }

    fn rms(&self) -> f64 {
        self.optimizer.mean_squared_residual().sqrt()
    }
}

/// Standard Iterative Closest Point (ICP) algorithm for aligning two point clouds.
/// This implementation uses the point-to-plane distance.
pub struct Icp<'target_lt> {
    // Parameters of the ICP algorithm.
    pub params: IcpParams,
    // Initial transformation to start the algorithm. Default is the identity.
    pub initial_transform: Transform,
    target: &'target_lt PointCloud,
    target_normals: Array1<Vector3<f64>>,
    kdtree: KdTree,
}

impl<'target_lt> Icp<'target_lt> {
    /// Create a new ICP instance. Builds the spatial index over the target and
    /// estimates its normals if it has none.
    ///
    /// # Arguments
    ///
    /// * params - Parameters of the ICP algorithm.
    /// * target - Target (fixed) point cloud.
    pub fn new(params: IcpParams, target: &'target_lt PointCloud) -> Result<Self, Error> {
        params.validate()?;
        let kdtree = KdTree::new(&target.points.view());
        let target_normals = match target.normals.as_ref() {
            Some(normals) => normals.clone(),
            None => estimate_normals_with_tree(
                &target.points.view(),
                &kdtree,
                params.normal_neighbors,
                &Vector3::zeros(),
            ),
        };
        Ok(Self {
            params,
            initial_transform: Transform::eye(),
            target,
            target_normals,
            kdtree,
        })
    }

    /// Builder-style setter for the initial transform.
    pub fn with_initial_transform(mut self, transform: Transform) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Searches the correspondences of the source under `transform` and
    /// accumulates the point-to-plane system. The search runs in parallel.
    fn linearize(
        &self,
        source_points: &Array1<Vector3<f64>>,
        source_normals: &Array1<Vector3<f64>>,
        transform: &Transform,
    ) -> Linearization {
        let geom_cost = PointPlaneDistance {};
        let max_distance_sqr = self.params.max_distance * self.params.max_distance;

        let terms = Zip::from(source_points)
            .and(source_normals)
            .par_map_collect(|source_point, source_normal| {
                if !is_finite_point(source_point) {
                    return None;
                }
                let source_point = transform.transform_point(source_point);
                let (found_index, found_sqr_distance) = self.kdtree.nearest(&source_point)?;
                if found_sqr_distance > max_distance_sqr {
                    return None;
                }

                let target_normal = self.target_normals[found_index];
                if target_normal.norm_squared() < 0.5 {
                    // Degenerate neighborhood.
                    return None;
                }
                if source_normal.norm_squared() > 0.5 {
                    let source_normal = transform.transform_normal(source_normal);
                    if trig::angle_between_lines(&source_normal, &target_normal)
                        > self.params.max_normal_angle
                    {
                        return None;
                    }
                }

                let target_point = self.target.points[found_index];
                Some(geom_cost.jacobian(&source_point, &target_point, &target_normal))
            });

        let mut optimizer = GaussNewton::<6>::new();
        for (residual, jacobian) in terms.iter().flatten() {
            optimizer.step(*residual, jacobian);
        }
        Linearization { optimizer }
    }

    fn min_correspondences(&self, source_len: usize) -> usize {
        let by_ratio = (self.params.min_correspondence_ratio * source_len as f64).ceil() as usize;
        self.params.min_correspondences.max(by_ratio).max(3)
    }

    /// Aligns the source point cloud to the target point cloud.
    ///
    /// # Arguments
    ///
    /// * source - Source (moving) point cloud. Normals are estimated if missing.
    ///
    /// # Returns
    ///
    /// The registration result. A result with `converged == false` holds the best
    /// transform found so far; the caller decides whether to use it.
    pub fn align(&self, source: &PointCloud) -> RegistrationResult {
        let source_normals = match source.normals.as_ref() {
            Some(normals) => normals.clone(),
            None => estimate_normals_with_tree(
                &source.points.view(),
                &KdTree::new(&source.points.view()),
                self.params.normal_neighbors,
                &Vector3::zeros(),
            ),
        };
        let min_correspondences = self.min_correspondences(source.len());

        let mut optim_transform = self.initial_transform;
        let mut best = (optim_transform, f64::INFINITY, 0usize);
        let mut previous_residual: Option<f64> = None;
        let mut updates: VecDeque<Vector6<f64>> = VecDeque::with_capacity(3);
        let mut extrapolations = 0;

        let finish = |best: (Transform, f64, usize),
                      iterations: usize,
                      extrapolations: usize,
                      termination: Termination| {
            debug!(
                "ICP stopped: {:?} after {} iterations, residual {:.6}, {} correspondences",
                termination, iterations, best.1, best.2
            );
            RegistrationResult {
                transform: best.0,
                converged: termination == Termination::Converged,
                iterations,
                final_residual: best.1,
                correspondences: best.2,
                extrapolations,
                termination,
            }
        };

        for iteration in 1..=self.params.max_iterations {
            let system = self.linearize(&source.points, &source_normals, &optim_transform);
            if system.count() < min_correspondences {
                debug!(
                    "ICP iteration {}: {} correspondences, {} required",
                    iteration,
                    system.count(),
                    min_correspondences
                );
                return finish(
                    best,
                    iteration,
                    extrapolations,
                    Termination::TooFewCorrespondences,
                );
            }

            let residual = system.rms();
            trace!(
                "ICP iteration {}: residual {:.8}, {} correspondences",
                iteration,
                residual,
                system.count()
            );
            if residual < best.1 {
                best = (optim_transform, residual, system.count());
            }

            let improved_enough = previous_residual.map_or(false, |previous| {
                ((previous - residual) / previous).abs() < self.params.convergence_tolerance
            });
            if residual <= RESIDUAL_FLOOR || improved_enough {
                return finish(
                    (optim_transform, residual, system.count()),
                    iteration,
                    extrapolations,
                    Termination::Converged,
                );
            }
            previous_residual = Some(residual);

            let Some(update) = system.optimizer.solve() else {
                return finish(best, iteration, extrapolations, Termination::Degenerate);
            };
            let step = Transform::exp(&update);
            let mut next_transform = &step * &optim_transform;
            if !next_transform.is_finite() {
                return finish(best, iteration, extrapolations, Termination::Degenerate);
            }

            if updates.len() == 3 {
                updates.pop_front();
            }
            updates.push_back(update);

            if self.params.extrapolation && consistent_direction(&updates) {
                if let Some(extrapolated) = self.extrapolate(
                    &source.points,
                    &source_normals,
                    &next_transform,
                    &step,
                    min_correspondences,
                ) {
                    next_transform = extrapolated;
                    extrapolations += 1;
                    updates.clear();
                }
            }

            optim_transform = next_transform;
        }

        finish(
            best,
            self.params.max_iterations,
            extrapolations,
            Termination::MaxIterations,
        )
    }

    /// Applies `step` once more on top of `candidate`, accepting it only if the
    /// residual does not increase.
    fn extrapolate(
        &self,
        source_points: &Array1<Vector3<f64>>,
        source_normals: &Array1<Vector3<f64>>,
        candidate: &Transform,
        step: &Transform,
        min_correspondences: usize,
    ) -> Option<Transform> {
        let extrapolated = step * candidate;
        if !extrapolated.is_finite() {
            return None;
        }

        let at_candidate = self.linearize(source_points, source_normals, candidate);
        let at_extrapolated = self.linearize(source_points, source_normals, &extrapolated);
        let accept = at_extrapolated.count() >= min_correspondences
            && at_extrapolated.rms() <= at_candidate.rms();
        trace!(
            "ICP extrapolation: residual {:.8} -> {:.8}, {}",
            at_candidate.rms(),
            at_extrapolated.rms(),
            if accept { "accepted" } else { "rejected" }
        );
        accept.then_some(extrapolated)
    }
}

/// True if the last three updates point in a consistent direction.
fn consistent_direction(updates: &VecDeque<Vector6<f64>>) -> bool {
    if updates.len() < 3 {
        return false;
    }
    updates
        .iter()
        .zip(updates.iter().skip(1))
        .all(|(a, b)| {
            let norms = a.norm() * b.norm();
            norms > 0.0 && a.dot(b) / norms >= EXTRAPOLATION_MIN_COSINE
        })
}

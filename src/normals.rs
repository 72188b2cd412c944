use nalgebra::Vector3;
use ndarray::{Array1, ArrayView1, Zip};

use crate::kdtree::KdTree;
use crate::pointcloud::{is_finite_point, PointCloud};
use crate::segmentation::Plane;

/// Default neighborhood size for normal estimation.
pub const DEFAULT_NORMAL_NEIGHBORS: usize = 10;

/// Estimates per point normals by fitting a plane to the `k` nearest neighbors.
/// Normals point towards `viewpoint`. Points that are not finite or have a degenerate
/// neighborhood get a zero normal.
///
/// # Arguments
///
/// * points - Points of the cloud.
/// * tree - KdTree built over `points`.
/// * k - Neighborhood size, including the point itself.
/// * viewpoint - Sensor position used to orient the normals.
pub fn estimate_normals_with_tree(
    points: &ArrayView1<Vector3<f64>>,
    tree: &KdTree,
    k: usize,
    viewpoint: &Vector3<f64>,
) -> Array1<Vector3<f64>> {
    Zip::from(points).par_map_collect(|point| {
        if !is_finite_point(point) {
            return Vector3::zeros();
        }
        let neighbors = tree.nearest_k(point, k.max(3));
        let fit = Plane::fit(neighbors.iter().map(|(idx, _)| &points[*idx]));
        match fit {
            Some((plane, _)) => plane.oriented_towards(&(viewpoint - point)).normal,
            None => Vector3::zeros(),
        }
    })
}

/// Same as [`estimate_normals_with_tree`], building the KdTree.
pub fn estimate_normals(
    points: &ArrayView1<Vector3<f64>>,
    k: usize,
    viewpoint: &Vector3<f64>,
) -> Array1<Vector3<f64>> {
    let tree = KdTree::new(points);
    estimate_normals_with_tree(points, &tree, k, viewpoint)
}

impl PointCloud {
    /// Fills `normals`, viewed from the cloud origin, if the cloud has none.
    pub fn ensure_normals(&mut self, k: usize) {
        if self.normals.is_none() {
            self.normals = Some(estimate_normals(&self.points.view(), k, &Vector3::zeros()));
        }
    }
}

use nalgebra::Vector3;
use ndarray::prelude::*;
use ndarray::Zip;
use ordered_float::OrderedFloat;

use crate::pointcloud::is_finite_point;

const LEAF_SIZE: usize = 16;
/// Subtrees larger than this are built in parallel.
const PARALLEL_BUILD_SIZE: usize = 8192;

enum KdNode {
    Leaf {
        points: Array1<Vector3<f64>>,
        indices: Vec<usize>,
    },
    NonLeaf {
        axis: usize,
        middle_value: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
}

/// Bounded list of the best `k` candidates, sorted by squared distance.
struct Candidates {
    k: usize,
    items: Vec<(usize, f64)>,
}

impl Candidates {
    fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k + 1),
        }
    }

    fn worst(&self) -> f64 {
        if self.items.len() < self.k {
            f64::INFINITY
        } else {
            self.items.last().map_or(f64::INFINITY, |(_, d)| *d)
        }
    }

    fn offer(&mut self, index: usize, sqr_distance: f64) {
        if sqr_distance >= self.worst() {
            return;
        }
        let pos = self
            .items
            .partition_point(|(_, d)| *d <= sqr_distance);
        self.items.insert(pos, (index, sqr_distance));
        self.items.truncate(self.k);
    }
}

/// KdTree for exact nearest neighbor search over 3D points.
/// Points with non-finite coordinates are not indexed.
pub struct KdTree {
    root: Option<Box<KdNode>>,
    len: usize,
}

impl KdTree {
    /// Create a new KdTree from a set of points.
    ///
    /// # Arguments
    ///
    /// * points - Points to index. Returned indices refer to this array.
    pub fn new(points: &ArrayView1<Vector3<f64>>) -> Self {
        // Recursive creation.
        fn rec(points: &ArrayView1<Vector3<f64>>, mut indices: Vec<usize>) -> KdNode {
            // Stop recursion if this should be a leaf node.
            if indices.len() <= LEAF_SIZE {
                return KdNode::Leaf {
                    points: points.select(Axis(0), &indices),
                    indices,
                };
            }

            // Split along the axis with the largest spread.
            let (min, max) = indices.iter().fold(
                (Vector3::repeat(f64::MAX), Vector3::repeat(f64::MIN)),
                |(min, max), idx| (min.inf(&points[*idx]), max.sup(&points[*idx])),
            );
            let axis = (max - min).imax();

            indices.sort_by_key(|idx| OrderedFloat(points[*idx][axis]));

            let mid = indices.len() / 2;
            let right = indices.split_off(mid);
            let middle_value = points[right[0]][axis];
            let (left, right) = if indices.len() + right.len() > PARALLEL_BUILD_SIZE {
                rayon::join(|| rec(points, indices), || rec(points, right))
            } else {
                (rec(points, indices), rec(points, right))
            };
            KdNode::NonLeaf {
                axis,
                middle_value,
                left: Box::new(left),
                right: Box::new(right),
            }
        }

        let indices = points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_finite_point(p))
            .map(|(idx, _)| idx)
            .collect::<Vec<usize>>();
        let len = indices.len();
        KdTree {
            root: if indices.is_empty() {
                None
            } else {
                Some(Box::new(rec(points, indices)))
            },
            len,
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn search(&self, point: &Vector3<f64>, candidates: &mut Candidates, radius_sqr: f64) {
        fn rec(
            node: &KdNode,
            point: &Vector3<f64>,
            candidates: &mut Candidates,
            radius_sqr: f64,
        ) {
            match node {
                KdNode::Leaf {
                    points: leaf_points,
                    indices,
                } => {
                    for (leaf_point, idx) in leaf_points.iter().zip(indices.iter()) {
                        let dist = (point - leaf_point).norm_squared();
                        if dist <= radius_sqr {
                            candidates.offer(*idx, dist);
                        }
                    }
                }
                KdNode::NonLeaf {
                    axis,
                    middle_value,
                    left,
                    right,
                } => {
                    let diff = point[*axis] - middle_value;
                    let (near, far) = if diff < 0.0 {
                        (left, right)
                    } else {
                        (right, left)
                    };
                    rec(near, point, candidates, radius_sqr);
                    let plane_dist = diff * diff;
                    if plane_dist <= radius_sqr && plane_dist < candidates.worst() {
                        rec(far, point, candidates, radius_sqr);
                    }
                }
            }
        }

        if let Some(root) = self.root.as_ref() {
            if is_finite_point(point) {
                rec(root, point, candidates, radius_sqr);
            }
        }
    }

    /// Find the nearest neighbor to a query point.
    ///
    /// # Returns
    ///
    /// A tuple containing the index of the nearest neighbor and the squared distance
    /// to it, or `None` if the tree is empty or the query is not finite.
    pub fn nearest(&self, point: &Vector3<f64>) -> Option<(usize, f64)> {
        let mut candidates = Candidates::new(1);
        self.search(point, &mut candidates, f64::INFINITY);
        candidates.items.first().copied()
    }

    /// Finds the `k` nearest neighbors, sorted by increasing squared distance.
    pub fn nearest_k(&self, point: &Vector3<f64>, k: usize) -> Vec<(usize, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let mut candidates = Candidates::new(k);
        self.search(point, &mut candidates, f64::INFINITY);
        candidates.items
    }

    /// Finds every point within `radius` (inclusive), sorted by increasing squared distance.
    pub fn within_radius(&self, point: &Vector3<f64>, radius: f64) -> Vec<(usize, f64)> {
        let mut candidates = Candidates::new(self.len);
        self.search(point, &mut candidates, radius * radius);
        candidates.items
    }

    /// Nearest neighbor of every query, searched in parallel.
    pub fn nearest_all(&self, queries: &ArrayView1<Vector3<f64>>) -> Array1<Option<(usize, f64)>> {
        Zip::from(queries).par_map_collect(|query| self.nearest(query))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use ndarray::prelude::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::kdtree::KdTree;

    fn brute_force_k(points: &Array1<Vector3<f64>>, query: &Vector3<f64>, k: usize) -> Vec<usize> {
        let mut all = points
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, (p - query).norm_squared()))
            .collect::<Vec<_>>();
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        all.into_iter().take(k).map(|(idx, _)| idx).collect()
    }

    #[test]
    fn should_find_nearest_points() {
        let points = array![
            Vector3::new(1., 2., 3.),
            Vector3::new(2., 3., 4.),
            Vector3::new(5., 6., 7.),
            Vector3::new(8., 9., 1.)
        ];
        let tree = KdTree::new(&points.view());

        let queries = array![
            Vector3::new(8., 9.1, 1.3),
            Vector3::new(5.1, 6.4, 7.),
            Vector3::new(1.5, 2.1, 3.3),
            Vector3::new(2.2, 3.1, 4.2)
        ];

        let found = tree
            .nearest_all(&queries.view())
            .map(|found| found.unwrap().0);
        assert_eq!(found, array![3, 2, 0, 1]);
    }

    #[test]
    fn should_find_nearest_points_big() {
        let ordered_points = (0..500)
            .map(|x| Vector3::new(x as f64, (x * 2) as f64, (x * 3) as f64))
            .collect::<Array1<_>>();

        let (random_indices, randomized_points) = {
            let mut random_indices = (0..500).collect::<Vec<usize>>();
            let seed: [u8; 32] = [5; 32];
            random_indices.shuffle(&mut SmallRng::from_seed(seed));

            let mut randomized_points = ordered_points.clone();
            for i in 0..500 {
                randomized_points[random_indices[i]] = ordered_points[i];
            }
            (random_indices, randomized_points)
        };

        let tree = KdTree::new(&randomized_points.view());

        for (query, expected) in ordered_points.iter().zip(random_indices.iter()) {
            let (idx, dist) = tree.nearest(query).unwrap();
            assert_eq!(idx, *expected);
            assert_eq!(dist, 0.0);
        }
    }

    #[test]
    fn should_match_brute_force_knn_and_radius() {
        let mut rng = SmallRng::seed_from_u64(11);
        let points = (0..2000)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-0.5..0.5),
                )
            })
            .collect::<Array1<Vector3<f64>>>();
        let tree = KdTree::new(&points.view());

        for _ in 0..50 {
            let query = Vector3::new(
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-1.0..1.0),
            );
            let found = tree
                .nearest_k(&query, 8)
                .into_iter()
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            assert_eq!(found, brute_force_k(&points, &query, 8));

            let radius = 0.7;
            let mut in_radius = tree
                .within_radius(&query, radius)
                .into_iter()
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            in_radius.sort_unstable();
            let expected = points
                .iter()
                .enumerate()
                .filter(|(_, p)| (*p - query).norm() <= radius)
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            assert_eq!(in_radius, expected);
        }
    }

    #[test]
    fn should_skip_non_finite_points() {
        let points = array![
            Vector3::new(f64::NAN, 0., 0.),
            Vector3::new(1., 1., 1.),
            Vector3::new(0., f64::INFINITY, 0.)
        ];
        let tree = KdTree::new(&points.view());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nearest(&Vector3::zeros()).unwrap().0, 1);
        assert!(tree.nearest(&Vector3::new(f64::NAN, 0., 0.)).is_none());

        let empty = KdTree::new(&Array1::<Vector3<f64>>::from_vec(vec![]).view());
        assert!(empty.is_empty());
        assert!(empty.nearest(&Vector3::zeros()).is_none());
    }
}

use nalgebra::Vector3;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::fixture;

use crate::{normals::DEFAULT_NORMAL_NEIGHBORS, pointcloud::PointCloud};

/// 1000 colored points uniformly spread over `[-3, 3] x [-3, 3] x [-1, 1]`.
#[fixture]
pub fn sample_random_cloud() -> PointCloud {
    let mut rng = StdRng::seed_from_u64(17);
    let points = (0..1000)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect::<Array1<_>>();
    let colors = (0..points.len())
        .map(|_| Vector3::new(rng.gen(), rng.gen(), rng.gen()))
        .collect::<Array1<Vector3<u8>>>();
    PointCloud::new(points).with_colors(colors)
}

fn grid(
    origin: Vector3<f64>,
    u: Vector3<f64>,
    v: Vector3<f64>,
    spacing: f64,
) -> impl Iterator<Item = Vector3<f64>> {
    let nu = (u.norm() / spacing).round() as usize;
    let nv = (v.norm() / spacing).round() as usize;
    let (du, dv) = (u / nu as f64, v / nv as f64);
    (0..=nu).flat_map(move |i| (0..=nv).map(move |j| origin + du * i as f64 + dv * j as f64))
}

/// Closed room of 12 x 12 x 3 meters with a floor, four walls and a box in
/// the middle, sampled every 25 cm. Every rigid motion is observable.
#[fixture]
pub fn sample_scene() -> PointCloud {
    let spacing = 0.25;
    let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
    let surfaces = [
        // floor
        (Vector3::new(-6.0, -6.0, 0.0), x * 12.0, y * 12.0),
        // walls
        (Vector3::new(-6.0, -6.0, 0.25), x * 12.0, z * 2.75),
        (Vector3::new(-6.0, 6.0, 0.25), x * 12.0, z * 2.75),
        (Vector3::new(-6.0, -5.75, 0.25), y * 11.5, z * 2.75),
        (Vector3::new(6.0, -5.75, 0.25), y * 11.5, z * 2.75),
        // box
        (Vector3::new(1.0, -1.0, 0.25), x * 2.0, z * 1.0),
        (Vector3::new(1.0, 1.0, 0.25), x * 2.0, z * 1.0),
        (Vector3::new(1.0, -0.75, 0.25), y * 1.5, z * 1.0),
        (Vector3::new(3.0, -0.75, 0.25), y * 1.5, z * 1.0),
        (Vector3::new(1.25, -0.75, 1.25), x * 1.5, y * 1.5),
    ];
    PointCloud::from_positions(
        surfaces
            .into_iter()
            .flat_map(|(origin, u, v)| grid(origin, u, v, spacing)),
    )
}

#[fixture]
pub fn sample_scene_with_normals(sample_scene: PointCloud) -> PointCloud {
    let mut scene = sample_scene;
    scene.ensure_normals(DEFAULT_NORMAL_NEIGHBORS);
    scene
}

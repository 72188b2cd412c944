use nalgebra::Vector3;
use scanfuse::{bounds::Box3D, filter::crop_box, PointCloud, Transform};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
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

/// Closed box surface, without its bottom, from `min` to `max`.
fn solid(min: Vector3<f64>, max: Vector3<f64>, spacing: f64) -> Vec<Vector3<f64>> {
    let size = max - min;
    let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
    let s = spacing;
    let mut points = Vec::new();
    // faces with a +-Y normal
    points.extend(grid(min + z * s, x * size[0], z * (size[2] - s), s));
    points.extend(grid(
        Vector3::new(min[0], max[1], min[2] + s),
        x * size[0],
        z * (size[2] - s),
        s,
    ));
    // faces with a +-X normal
    points.extend(grid(
        Vector3::new(min[0], min[1] + s, min[2] + s),
        y * (size[1] - 2.0 * s),
        z * (size[2] - s),
        s,
    ));
    points.extend(grid(
        Vector3::new(max[0], min[1] + s, min[2] + s),
        y * (size[1] - 2.0 * s),
        z * (size[2] - s),
        s,
    ));
    // top
    points.extend(grid(
        Vector3::new(min[0] + s, min[1] + s, max[2]),
        x * (size[0] - 2.0 * s),
        y * (size[1] - 2.0 * s),
        s,
    ));
    points
}

/// Corridor 28 m long along X and 12 m wide, with a floor, two side walls and
/// three crates, sampled every 25 cm.
pub fn corridor() -> PointCloud {
    let s = 0.25;
    let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
    let mut points = Vec::new();
    points.extend(grid(Vector3::new(-12.0, -6.0, 0.0), x * 28.0, y * 12.0, s));
    points.extend(grid(Vector3::new(-12.0, -6.0, s), x * 28.0, z * 2.75, s));
    points.extend(grid(Vector3::new(-12.0, 6.0, s), x * 28.0, z * 2.75, s));
    points.extend(solid(
        Vector3::new(-5.0, -3.0, 0.0),
        Vector3::new(-3.0, -1.0, 1.0),
        s,
    ));
    points.extend(solid(
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(2.0, 3.0, 1.5),
        s,
    ));
    points.extend(solid(
        Vector3::new(4.0, -2.5, 0.0),
        Vector3::new(6.0, -0.5, 0.75),
        s,
    ));
    PointCloud::from_positions(points)
}

/// Frame seen by a sensor at `sensor_x` on the corridor axis, limited to 8 m ahead
/// and behind.
pub fn frame_at(world: &PointCloud, sensor_x: f64) -> PointCloud {
    let world_to_sensor =
        Transform::from_axis_angle(&Vector3::new(-sensor_x, 0.0, 0.0), &Vector3::z(), 0.0);
    let local = &world_to_sensor * world;
    let view = Box3D::from_limits([-8.0, 8.0, -7.0, 7.0, -1.0, 4.0]).unwrap();
    crop_box(&local, &view).unwrap()
}

use nalgebra::Vector3;
use ndarray::{concatenate, Array1, Axis};
use serde_derive::{Deserialize, Serialize};

use crate::bounds::Box3D;
use crate::transform::Transform;

/// A single LIDAR return.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub position: Vector3<f64>,
    pub color: Option<Vector3<u8>>,
    pub intensity: Option<f32>,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            color: None,
            intensity: None,
        }
    }

    pub fn with_color(mut self, color: Vector3<u8>) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }

    /// Points with non-finite coordinates carry no geometry.
    pub fn is_valid(&self) -> bool {
        is_finite_point(&self.position)
    }
}

/// Flat serializable record of a point, `x, y, z[, color]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
}

pub(crate) fn is_finite_point(point: &Vector3<f64>) -> bool {
    point.iter().all(|v| v.is_finite())
}

/// Ordered point set. Attributes are stored as parallel columns, and every
/// optional column, when present, has the same length as `points`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub points: Array1<Vector3<f64>>,
    pub normals: Option<Array1<Vector3<f64>>>,
    pub colors: Option<Array1<Vector3<u8>>>,
    pub intensities: Option<Array1<f32>>,
}

impl PointCloud {
    pub fn new(points: Array1<Vector3<f64>>) -> Self {
        Self {
            points,
            normals: None,
            colors: None,
            intensities: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Array1::from_vec(Vec::new()))
    }

    pub fn from_positions<I: IntoIterator<Item = Vector3<f64>>>(positions: I) -> Self {
        Self::new(positions.into_iter().collect())
    }

    /// Builds a cloud from points. Colors (intensities) are kept only if every
    /// point has one.
    pub fn from_points(points: &[Point]) -> Self {
        let colors = points
            .iter()
            .map(|p| p.color)
            .collect::<Option<Vec<_>>>()
            .filter(|_| !points.is_empty());
        let intensities = points
            .iter()
            .map(|p| p.intensity)
            .collect::<Option<Vec<_>>>()
            .filter(|_| !points.is_empty());

        Self {
            points: points.iter().map(|p| p.position).collect(),
            normals: None,
            colors: colors.map(Array1::from_vec),
            intensities: intensities.map(Array1::from_vec),
        }
    }

    pub fn with_normals(mut self, normals: Array1<Vector3<f64>>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_colors(mut self, colors: Array1<Vector3<u8>>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_intensities(mut self, intensities: Array1<f32>) -> Self {
        self.intensities = Some(intensities);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        let position = *self.points.get(index)?;
        Some(Point {
            position,
            color: self.colors.as_ref().map(|colors| colors[index]),
            intensity: self.intensities.as_ref().map(|values| values[index]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Indices of points with finite coordinates.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_finite_point(p))
            .map(|(index, _)| index)
            .collect()
    }

    /// New cloud with the points at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            points: self.points.select(Axis(0), indices),
            normals: self.normals.as_ref().map(|n| n.select(Axis(0), indices)),
            colors: self.colors.as_ref().map(|c| c.select(Axis(0), indices)),
            intensities: self.intensities.as_ref().map(|i| i.select(Axis(0), indices)),
        }
    }

    /// New cloud with `self` followed by `other`. Optional columns survive only
    /// if both clouds carry them, unless one of the clouds is empty.
    pub fn concat(&self, other: &PointCloud) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        fn join<T: Clone>(a: &Option<Array1<T>>, b: &Option<Array1<T>>) -> Option<Array1<T>> {
            match (a, b) {
                (Some(a), Some(b)) => concatenate(Axis(0), &[a.view(), b.view()]).ok(),
                _ => None,
            }
        }

        Self {
            points: concatenate(Axis(0), &[self.points.view(), other.points.view()])
                .unwrap_or_else(|_| self.points.clone()),
            normals: join(&self.normals, &other.normals),
            colors: join(&self.colors, &other.colors),
            intensities: join(&self.intensities, &other.intensities),
        }
    }

    /// Axis aligned bounding box of the valid points, `None` if there are none.
    pub fn bounds(&self) -> Option<Box3D> {
        let mut iter = self.points.iter().filter(|p| is_finite_point(p));
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(p), max.sup(p)));
        Some(Box3D { min, max })
    }

    pub fn to_records(&self) -> Vec<PointRecord> {
        self.iter()
            .filter(Point::is_valid)
            .map(|p| PointRecord {
                x: p.position[0],
                y: p.position[1],
                z: p.position[2],
                color: p.color.map(|c| [c[0], c[1], c[2]]),
            })
            .collect()
    }
}

impl std::ops::Mul<&PointCloud> for &Transform {
    type Output = PointCloud;
    fn mul(self, rhs: &PointCloud) -> PointCloud {
        PointCloud {
            points: rhs.points.map(|p| self.transform_point(p)),
            normals: rhs
                .normals
                .as_ref()
                .map(|normals| normals.map(|n| self.transform_normal(n))),
            colors: rhs.colors.clone(),
            intensities: rhs.intensities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_from_points_keeps_complete_colors() {
        let pcl = PointCloud::from_points(&[
            Point::new(0.0, 0.0, 0.0).with_color(Vector3::new(255, 0, 0)),
            Point::new(1.0, 0.0, 0.0).with_color(Vector3::new(0, 255, 0)),
        ]);
        assert_eq!(pcl.len(), 2);
        assert_eq!(pcl.colors.as_ref().unwrap()[1], Vector3::new(0, 255, 0));
        assert!(pcl.intensities.is_none());

        let partial = PointCloud::from_points(&[
            Point::new(0.0, 0.0, 0.0).with_color(Vector3::new(255, 0, 0)),
            Point::new(1.0, 0.0, 0.0),
        ]);
        assert!(partial.colors.is_none());
    }

    #[test]
    fn test_select_and_concat() {
        let pcl = PointCloud::from_positions([
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        ])
        .with_intensities(array![0.1, 0.2, 0.3]);

        let selected = pcl.select(&[2, 0]);
        assert_eq!(selected.points, array![Vector3::new(2.0, 0.0, 0.0), Vector3::zeros()]);
        assert_eq!(selected.intensities, Some(array![0.3, 0.1]));

        let joined = pcl.concat(&selected);
        assert_eq!(joined.len(), 5);
        assert_eq!(joined.intensities.unwrap().len(), 5);

        let no_attr = pcl.concat(&PointCloud::from_positions([Vector3::new(5.0, 0.0, 0.0)]));
        assert_eq!(no_attr.len(), 4);
        assert!(no_attr.intensities.is_none());
    }

    #[test]
    fn test_bounds_skip_invalid() {
        let pcl = PointCloud::from_positions([
            Vector3::new(-1.0, 2.0, 0.0),
            Vector3::new(f64::NAN, 100.0, 0.0),
            Vector3::new(3.0, -2.0, 1.0),
        ]);
        let bounds = pcl.bounds().unwrap();
        assert_eq!(bounds.min, Vector3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vector3::new(3.0, 2.0, 1.0));
        assert_eq!(pcl.valid_indices(), vec![0, 2]);
        assert!(PointCloud::empty().bounds().is_none());
    }

    #[test]
    fn test_transform_cloud() {
        let pcl = PointCloud::from_positions([Vector3::new(1.0, 0.0, 0.0)])
            .with_normals(array![Vector3::new(1.0, 0.0, 0.0)]);
        let transform = Transform::from_axis_angle(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::z(),
            std::f64::consts::FRAC_PI_2,
        );
        let moved = &transform * &pcl;
        assert_abs_diff_eq!(moved.points[0], Vector3::new(0.0, 1.0, 1.0), epsilon = 1e-12);
        assert_abs_diff_eq!(
            moved.normals.unwrap()[0],
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_records() {
        let pcl = PointCloud::from_points(&[
            Point::new(1.0, 2.0, 3.0).with_color(Vector3::new(1, 2, 3)),
            Point::new(f64::INFINITY, 0.0, 0.0).with_color(Vector3::new(0, 0, 0)),
        ]);
        let records = pcl.to_records();
        assert_eq!(records.len(), 1);
        let json = serde_json::to_string(&records).unwrap();
        assert_eq!(json, r#"[{"x":1.0,"y":2.0,"z":3.0,"color":[1,2,3]}]"#);
    }
}

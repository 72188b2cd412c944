use crate::bounds::Box3D;
use crate::error::Error;
use crate::pointcloud::PointCloud;

/// Keeps the points inside `bounds`, both limits included.
///
/// # Arguments
///
/// * pcl - Input point cloud.
/// * bounds - Region of interest.
///
/// # Returns
///
/// A new point cloud, possibly empty. Fails with `InvalidBounds` if `min > max` on
/// any axis.
pub fn crop_box(pcl: &PointCloud, bounds: &Box3D) -> Result<PointCloud, Error> {
    bounds.validate()?;
    let indices = pcl
        .points
        .iter()
        .enumerate()
        .filter(|(_, point)| bounds.contains(point))
        .map(|(idx, _)| idx)
        .collect::<Vec<usize>>();
    Ok(pcl.select(&indices))
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use rstest::rstest;

    use super::*;
    use crate::unit_test::sample_random_cloud;

    #[rstest]
    fn test_crop_membership(sample_random_cloud: PointCloud) {
        let bounds = Box3D::from_limits([-1.0, 2.0, -3.0, 0.5, -0.2, 0.2]).unwrap();
        let cropped = crop_box(&sample_random_cloud, &bounds).unwrap();

        let expected = sample_random_cloud
            .points
            .iter()
            .filter(|p| bounds.contains(p))
            .count();
        assert_eq!(cropped.len(), expected);
        assert!(cropped.points.iter().all(|p| bounds.contains(p)));
        assert_eq!(
            cropped.colors.as_ref().map(|c| c.len()),
            Some(cropped.len())
        );
    }

    #[rstest]
    fn test_crop_idempotent(sample_random_cloud: PointCloud) {
        let bounds = Box3D::from_limits([-2.0, 2.0, -2.0, 2.0, -1.0, 1.0]).unwrap();
        let once = crop_box(&sample_random_cloud, &bounds).unwrap();
        let twice = crop_box(&once, &bounds).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_crop_boundaries_and_invalid() {
        let pcl = PointCloud::from_positions([
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0 + 1e-6),
            Vector3::new(f64::NAN, 0.5, 0.5),
        ]);
        let bounds = Box3D::from_limits([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(crop_box(&pcl, &bounds).unwrap().len(), 2);

        let outside = Box3D::from_limits([5.0, 6.0, 5.0, 6.0, 5.0, 6.0]).unwrap();
        assert!(crop_box(&pcl, &outside).unwrap().is_empty());

        let inverted = Box3D {
            min: Vector3::new(0.0, 2.0, 0.0),
            max: Vector3::new(1.0, 1.0, 1.0),
        };
        assert!(matches!(
            crop_box(&pcl, &inverted),
            Err(Error::InvalidBounds(_))
        ));
    }
}

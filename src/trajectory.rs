use std::ops::Index;

use crate::transform::Transform;

/// Trajectory of sensor poses. Use it to store poses while aligning scans.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    /// Sensor poses, transforms points from the sensor frame to the world frame.
    pub sensor_to_world: Vec<Transform>,
    /// Index of the frame each pose was estimated from.
    pub frames: Vec<usize>,
}

impl Trajectory {
    /// Adds a new pose to the trajectory.
    ///
    /// # Arguments
    ///
    /// * `sensor_to_world` - Transform from sensor to world.
    /// * `frame` - Index of the frame.
    pub fn push(&mut self, sensor_to_world: Transform, frame: usize) {
        self.sensor_to_world.push(sensor_to_world);
        self.frames.push(frame);
    }

    /// Returns the number of poses in the trajectory.
    pub fn len(&self) -> usize {
        self.sensor_to_world.len()
    }

    /// Returns true if the trajectory is empty.
    pub fn is_empty(&self) -> bool {
        self.sensor_to_world.is_empty()
    }

    /// Returns the transform taking points of pose `from_index` into pose `dest_index`.
    pub fn get_relative_transform(&self, from_index: usize, dest_index: usize) -> Option<Transform> {
        let from = self.sensor_to_world.get(from_index)?;
        let dest = self.sensor_to_world.get(dest_index)?;
        Some(&dest.inverse() * from)
    }

    /// Returns the iterator over poses and frame indices.
    pub fn iter(&self) -> impl Iterator<Item = (Transform, usize)> + '_ {
        self.sensor_to_world
            .iter()
            .copied()
            .zip(self.frames.iter().copied())
    }

    /// Creates a new trajectory with the poses transformed in such a way that the first pose is at origin.
    pub fn first_frame_at_origin(&self) -> Self {
        let Some(first) = self.sensor_to_world.first() else {
            return self.clone();
        };

        let first_inv = first.inverse();
        Self {
            sensor_to_world: self
                .sensor_to_world
                .iter()
                .map(|transform| &first_inv * transform)
                .collect(),
            frames: self.frames.clone(),
        }
    }

    /// Gets the last pose and frame index.
    /// If the trajectory is empty, it returns `None`.
    pub fn last(&self) -> Option<(Transform, usize)> {
        Some((*self.sensor_to_world.last()?, *self.frames.last()?))
    }
}

impl FromIterator<(Transform, usize)> for Trajectory {
    /// Creates a new trajectory from the `(Transform, usize)` iterator.
    /// Use with the `collect::<Trajectory>` method.
    fn from_iter<T: IntoIterator<Item = (Transform, usize)>>(iter: T) -> Self {
        let mut trajectory = Trajectory::default();
        for (transform, frame) in iter {
            trajectory.push(transform, frame);
        }
        trajectory
    }
}

impl Index<usize> for Trajectory {
    type Output = Transform;
    /// Returns the pose at the given index.
    fn index(&self, index: usize) -> &Self::Output {
        &self.sensor_to_world[index]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    use super::*;

    fn translation(x: f64) -> Transform {
        Transform::from_axis_angle(&Vector3::new(x, 0.0, 0.0), &Vector3::z(), 0.0)
    }

    #[test]
    fn test_relative_and_origin() {
        let trajectory = [translation(1.0), translation(3.0)]
            .into_iter()
            .zip(5..)
            .collect::<Trajectory>();

        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.last().unwrap().1, 6);
        let relative = trajectory.get_relative_transform(1, 0).unwrap();
        assert_abs_diff_eq!(relative.translation(), Vector3::new(2.0, 0.0, 0.0));
        assert!(trajectory.get_relative_transform(0, 2).is_none());

        let at_origin = trajectory.first_frame_at_origin();
        assert_abs_diff_eq!(at_origin[0].translation(), Vector3::zeros());
        assert_abs_diff_eq!(at_origin[1].translation(), Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty() {
        let trajectory = Trajectory::default();
        assert!(trajectory.is_empty());
        assert!(trajectory.last().is_none());
        assert!(trajectory.first_frame_at_origin().is_empty());
    }
}

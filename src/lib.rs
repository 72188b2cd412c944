pub mod bounds;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod icp;
pub mod kdtree;
pub mod metrics;
pub mod normals;
mod optim;
pub mod pipeline;
pub mod pointcloud;
pub mod pose_accumulator;
pub mod segmentation;
pub mod trajectory;
pub mod transform;
pub mod trig;
pub mod voxel;

#[cfg(test)]
mod unit_test;

pub use error::Error;
pub use pointcloud::{Point, PointCloud};
pub use transform::Transform;

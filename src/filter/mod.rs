mod downsample;
pub use downsample::{random_downsample, voxel_downsample, Downsample, DownsampleStrategy};
mod roi;
pub use roi::crop_box;

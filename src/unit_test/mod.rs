mod point_clouds;
pub(crate) use point_clouds::{sample_random_cloud, sample_scene, sample_scene_with_normals};

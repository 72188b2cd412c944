use crate::pointcloud::PointCloud;

/// Pull interface of the frame producer.
pub trait FrameSource {
    /// Next raw frame, `None` at the end of the sequence.
    fn next_frame(&mut self) -> Option<PointCloud>;
}

/// Frame source over any iterator of point clouds.
pub struct IterFrameSource<I> {
    frames: I,
}

impl<I: Iterator<Item = PointCloud>> IterFrameSource<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(frames: T) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl<I: Iterator<Item = PointCloud>> FrameSource for IterFrameSource<I> {
    fn next_frame(&mut self) -> Option<PointCloud> {
        self.frames.next()
    }
}

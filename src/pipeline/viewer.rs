use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{fusion::GlobalMap, pointcloud::PointCloud, transform::Transform};

/// Copy of the map published after a fused frame.
#[derive(Clone, Debug)]
pub struct MapSnapshot {
    /// Index of the frame that produced this state.
    pub frame: usize,
    pub cloud: PointCloud,
    pub pose: Transform,
}

/// Result of publishing a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The viewer was busy and the snapshot was discarded.
    Dropped,
    /// The viewer is gone; no further snapshots should be sent.
    Disconnected,
}

/// Consumer of map updates. Implementations must return without waiting on the
/// display side.
pub trait MapViewer {
    fn publish(&mut self, frame: usize, map: &GlobalMap) -> SendOutcome;
}

/// Viewer that forwards snapshots through a bounded channel to a rendering thread.
pub struct ChannelViewer {
    sender: Sender<MapSnapshot>,
}

impl ChannelViewer {
    /// Creates the viewer and the receiving end of its channel.
    /// A `capacity` of 0 is raised to 1.
    pub fn bounded(capacity: usize) -> (Self, Receiver<MapSnapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl MapViewer for ChannelViewer {
    fn publish(&mut self, frame: usize, map: &GlobalMap) -> SendOutcome {
        let snapshot = MapSnapshot {
            frame,
            cloud: map.cloud().clone(),
            pose: map.pose(),
        };
        match self.sender.try_send(snapshot) {
            Ok(()) => SendOutcome::Delivered,
            Err(TrySendError::Full(_)) => SendOutcome::Dropped,
            Err(TrySendError::Disconnected(_)) => SendOutcome::Disconnected,
        }
    }
}

//! Emergency checkpoint seam.

use std::fmt;

/// Identifier under which a state snapshot is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub u32);

impl SnapshotId {
    /// Reserved sentinel for the emergency snapshot written immediately
    /// before a fatal abort.
    pub const EMERGENCY: SnapshotId = SnapshotId(999_999);
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External snapshot writer, invoked before the run terminates on a
/// degenerate-step fault.
pub trait CheckpointSink {
    /// Request that a state snapshot be written under `id`.
    fn request_snapshot(&mut self, id: SnapshotId);
}

use super::{ReplacementPolicy, frame_slot, min_evictable_by};
use crate::buffer::frame::{FrameId, FrameMeta};

/// Evicts the frame whose page was loaded longest ago
///
/// Hits do not reorder the queue.
pub struct FifoReplacer {
    loaded_at: Vec<u64>,
    loads: u64,
}

impl FifoReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Never-loaded frames sort first
            loaded_at: vec![0; capacity],
            loads: 0,
        }
    }
}

impl ReplacementPolicy for FifoReplacer {
    fn on_load(&mut self, frame: FrameId) {
        self.loads += 1;
        *frame_slot(&mut self.loaded_at, frame) = self.loads;
    }

    fn on_access(&mut self, _frame: FrameId) {}

    fn select_victim(&mut self, frames: &[FrameMeta]) -> Option<FrameId> {
        min_evictable_by(frames, |idx| self.loaded_at.get(idx).copied().unwrap_or(0))
    }
}

use super::{ReplacementPolicy, frame_slot, min_evictable_by};
use crate::buffer::frame::{FrameId, FrameMeta};

/// Evicts the frame with the fewest accesses since its page was loaded,
/// the oldest load winning ties
pub struct LfuReplacer {
    accesses: Vec<u64>,
    loaded_at: Vec<u64>,
    loads: u64,
}

impl LfuReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            accesses: vec![0; capacity],
            loaded_at: vec![0; capacity],
            loads: 0,
        }
    }
}

impl ReplacementPolicy for LfuReplacer {
    fn on_load(&mut self, frame: FrameId) {
        self.loads += 1;
        *frame_slot(&mut self.loaded_at, frame) = self.loads;
        *frame_slot(&mut self.accesses, frame) = 1;
    }

    fn on_access(&mut self, frame: FrameId) {
        *frame_slot(&mut self.accesses, frame) += 1;
    }

    fn select_victim(&mut self, frames: &[FrameMeta]) -> Option<FrameId> {
        min_evictable_by(frames, |idx| {
            let accesses = self.accesses.get(idx).copied().unwrap_or(0);
            let loaded_at = self.loaded_at.get(idx).copied().unwrap_or(0);
            (accesses, loaded_at)
        })
    }
}

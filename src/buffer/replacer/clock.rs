use super::{ReplacementPolicy, frame_slot};
use crate::buffer::frame::{FrameId, FrameMeta};

/// Second-chance replacement
///
/// The hand sweeps from where it last stopped. Evictable frames with their
/// reference bit set lose the bit and are passed over; the first evictable
/// frame found with a clear bit is the victim.
pub struct ClockReplacer {
    referenced: Vec<bool>,
    hand: usize,
}

impl ClockReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            referenced: vec![false; capacity],
            hand: 0,
        }
    }

}

impl ReplacementPolicy for ClockReplacer {
    fn on_load(&mut self, frame: FrameId) {
        *frame_slot(&mut self.referenced, frame) = true;
    }

    fn on_access(&mut self, frame: FrameId) {
        *frame_slot(&mut self.referenced, frame) = true;
    }

    fn select_victim(&mut self, frames: &[FrameMeta]) -> Option<FrameId> {
        if frames.is_empty() {
            return None;
        }
        if self.referenced.len() < frames.len() {
            self.referenced.resize(frames.len(), false);
        }

        // One lap clears every bit that can be cleared, the second finds the victim.
        // With nothing evictable the hand ends where it started.
        for _ in 0..2 * frames.len() {
            let idx = self.hand % frames.len();
            self.hand = (idx + 1) % frames.len();

            if !frames[idx].is_evictable() {
                continue;
            }
            if self.referenced[idx] {
                self.referenced[idx] = false;
                continue;
            }
            return Some(idx);
        }
        None
    }
}

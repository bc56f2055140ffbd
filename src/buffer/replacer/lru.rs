use lru::LruCache;

use super::ReplacementPolicy;
use crate::buffer::frame::{FrameId, FrameMeta};

/// Evicts the frame touched least recently, a touch being a load or a hit
pub struct LruReplacer {
    // Only used for its recency ordering; frames never touched are absent
    recency: LruCache<FrameId, ()>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            recency: LruCache::unbounded(),
        }
    }

    fn touch(&mut self, frame: FrameId) {
        self.recency.put(frame, ());
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for LruReplacer {
    fn on_load(&mut self, frame: FrameId) {
        self.touch(frame);
    }

    fn on_access(&mut self, frame: FrameId) {
        self.touch(frame);
    }

    fn select_victim(&mut self, frames: &[FrameMeta]) -> Option<FrameId> {
        let untouched = frames
            .iter()
            .enumerate()
            .find(|&(idx, frame)| frame.is_evictable() && !self.recency.contains(&idx))
            .map(|(idx, _)| idx);

        // iter() runs most-recent first
        untouched.or_else(|| {
            self.recency
                .iter()
                .rev()
                .map(|(&idx, _)| idx)
                .find(|&idx| frames.get(idx).is_some_and(FrameMeta::is_evictable))
        })
    }
}

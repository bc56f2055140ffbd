//! Victim selection for the buffer pool.
//!
//! Every policy only considers frames whose [`FrameMeta::is_evictable`] holds,
//! and when several frames qualify equally the lowest frame index wins.

mod clock;
mod fifo;
mod lfu;
mod lru;

pub use clock::ClockReplacer;
pub use fifo::FifoReplacer;
pub use lfu::LfuReplacer;
pub use lru::LruReplacer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::frame::{FrameId, FrameMeta};

/// A pluggable victim-selection strategy
pub trait ReplacementPolicy: Send {
    /// A page was just read into `frame`
    fn on_load(&mut self, frame: FrameId);

    /// A resident page in `frame` was pinned again
    fn on_access(&mut self, frame: FrameId);

    /// Pick the frame to evict, or `None` when nothing is evictable
    fn select_victim(&mut self, frames: &[FrameMeta]) -> Option<FrameId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementStrategy {
    Fifo,
    #[default]
    Lru,
    Clock,
    Lfu,
}

impl ReplacementStrategy {
    /// Build a fresh policy for a pool of `capacity` frames
    pub fn build(self, capacity: usize) -> Box<dyn ReplacementPolicy> {
        match self {
            ReplacementStrategy::Fifo => Box::new(FifoReplacer::new(capacity)),
            ReplacementStrategy::Lru => Box::new(LruReplacer::new()),
            ReplacementStrategy::Clock => Box::new(ClockReplacer::new(capacity)),
            ReplacementStrategy::Lfu => Box::new(LfuReplacer::new(capacity)),
        }
    }
}

impl fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplacementStrategy::Fifo => "fifo",
            ReplacementStrategy::Lru => "lru",
            ReplacementStrategy::Clock => "clock",
            ReplacementStrategy::Lfu => "lfu",
        };
        f.write_str(name)
    }
}

impl FromStr for ReplacementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(ReplacementStrategy::Fifo),
            "lru" => Ok(ReplacementStrategy::Lru),
            "clock" => Ok(ReplacementStrategy::Clock),
            "lfu" => Ok(ReplacementStrategy::Lfu),
            other => Err(format!("unknown replacement strategy: {}", other)),
        }
    }
}

/// Lowest-keyed evictable frame, ties going to the lowest index
/// Per-frame state for `frame`, growing `values` when a pool has more frames
/// than the policy was built for
fn frame_slot<T: Clone + Default>(values: &mut Vec<T>, frame: FrameId) -> &mut T {
    if frame >= values.len() {
        values.resize(frame + 1, T::default());
    }
    &mut values[frame]
}

fn min_evictable_by<K: Ord>(
    frames: &[FrameMeta],
    mut key: impl FnMut(FrameId) -> K,
) -> Option<FrameId> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, frame)| frame.is_evictable())
        .min_by_key(|&(idx, _)| (key(idx), idx))
        .map(|(idx, _)| idx)
}

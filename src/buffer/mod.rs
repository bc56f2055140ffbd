mod config;
mod error;
mod frame;
mod pool;
mod replacer;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{FrameId, FrameMeta};
pub use pool::{BufferPool, PageHandle, PoolStats};
pub use replacer::{
    ClockReplacer, FifoReplacer, LfuReplacer, LruReplacer, ReplacementPolicy,
    ReplacementStrategy,
};

/// Default number of frames in a buffer pool
pub const DEFAULT_POOL_SIZE: usize = 64;

use thiserror::Error;

use crate::file::{PageId, VolumeError};

#[derive(Debug, Error)]
pub enum BufferError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Buffer pool is full: every frame is pinned")]
    PoolFull,

    #[error("Buffer pool is busy: {pinned} frame(s) still pinned")]
    PoolBusy { pinned: usize },

    #[error("Invalid page handle: page_id={0}")]
    InvalidHandle(PageId),

    #[error("Invalid pool configuration: {0}")]
    Config(String),

    #[error("Buffer pool has been shut down")]
    PoolClosed,
}

pub type BufferResult<T> = Result<T, BufferError>;

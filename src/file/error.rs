use std::io;
use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Volume not found: {0}")]
    NotFound(String),

    #[error("Page out of range: page_id={page_id}, page_count={page_count}")]
    OutOfRange { page_id: PageId, page_count: usize },

    #[error("Write failed: page_id={page_id} is beyond page_count={page_count}")]
    WriteFailure { page_id: PageId, page_count: usize },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

pub type VolumeResult<T> = Result<T, VolumeError>;

use thiserror::Error;

use crate::buffer::BufferError;
use crate::file::{PageId, VolumeError};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid slot: page_id={0}, slot_id={1}")]
    InvalidSlot(PageId, usize),

    #[error("Invalid attribute index: {0}")]
    InvalidAttribute(usize),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupt table metadata: {0}")]
    CorruptMetadata(String),
}

pub type RecordResult<T> = Result<T, RecordError>;

pub mod buffer;
pub mod file;
pub mod record;

pub use buffer::{
    BufferError, BufferPool, BufferResult, DEFAULT_POOL_SIZE, PageHandle, PoolConfig, PoolStats,
    ReplacementPolicy, ReplacementStrategy,
};
pub use file::{MemoryVolume, PAGE_SIZE, PageFile, PageId, Volume, VolumeError, VolumeResult};
pub use record::{
    Attribute, DataType, Record, RecordError, RecordId, RecordResult, Schema, Table, Value,
};

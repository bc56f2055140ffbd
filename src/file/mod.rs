mod error;
mod memory_volume;
mod page_file;

pub use error::{VolumeError, VolumeResult};
pub use memory_volume::MemoryVolume;
pub use page_file::PageFile;

/// Page size in bytes (4KB)
///
/// Shared by every layer. Pages carry no size tag, so a volume written with a
/// different value is silently misread.
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
pub type PageId = usize;

/// A paged volume backing one buffer pool.
pub trait Volume: Send {
    /// Total number of pages currently in the volume
    fn page_count(&self) -> usize;

    /// Read page `page_id` into `buffer`, which must be exactly `PAGE_SIZE` bytes
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> VolumeResult<()>;

    /// Write `buffer` to page `page_id`. Never grows the volume.
    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> VolumeResult<()>;

    /// Append zero-filled pages until the volume holds at least `pages` pages
    fn ensure_capacity(&mut self, pages: usize) -> VolumeResult<()>;

    /// Flush buffered writes to durable storage
    fn sync(&mut self) -> VolumeResult<()>;

    /// Fails with `OutOfRange` unless `page_id` can be read
    fn check_readable(&self, page_id: PageId) -> VolumeResult<()> {
        let page_count = self.page_count();
        if page_id >= page_count {
            return Err(VolumeError::OutOfRange {
                page_id,
                page_count,
            });
        }
        Ok(())
    }
}

pub(crate) fn check_page_size(len: usize) -> VolumeResult<()> {
    if len != PAGE_SIZE {
        return Err(VolumeError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

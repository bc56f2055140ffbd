use super::error::{VolumeError, VolumeResult};
use super::{PAGE_SIZE, PageId, Volume, check_page_size};

/// A volume kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    pages: Vec<Box<[u8]>>,
}

impl MemoryVolume {
    /// A volume holding a single zero-filled page
    pub fn new() -> Self {
        Self::with_pages(1)
    }

    /// A volume holding `pages` zero-filled pages
    pub fn with_pages(pages: usize) -> Self {
        let mut volume = Self { pages: Vec::new() };
        volume.grow_to(pages);
        volume
    }

    fn grow_to(&mut self, pages: usize) {
        while self.pages.len() < pages {
            self.pages.push(vec![0u8; PAGE_SIZE].into_boxed_slice());
        }
    }
}

impl Default for MemoryVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Volume for MemoryVolume {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> VolumeResult<()> {
        check_page_size(buffer.len())?;
        self.check_readable(page_id)?;
        buffer.copy_from_slice(&self.pages[page_id]);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> VolumeResult<()> {
        check_page_size(buffer.len())?;
        let page_count = self.pages.len();
        let page = self
            .pages
            .get_mut(page_id)
            .ok_or(VolumeError::WriteFailure {
                page_id,
                page_count,
            })?;
        page.copy_from_slice(buffer);
        Ok(())
    }

    fn ensure_capacity(&mut self, pages: usize) -> VolumeResult<()> {
        self.grow_to(pages);
        Ok(())
    }

    fn sync(&mut self) -> VolumeResult<()> {
        Ok(())
    }
}

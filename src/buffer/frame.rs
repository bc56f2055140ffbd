use crate::file::PageId;

/// Index of a frame in the frame table
pub type FrameId = usize;

/// Bookkeeping for one frame of the pool
///
/// The page bytes live separately, see `BufferPool::page`. Replacement
/// policies only ever see this metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMeta {
    pub(crate) page_id: Option<PageId>,
    pub(crate) dirty: bool,
    pub(crate) pin_count: usize,
    /// Set while a miss writes back the old page and reads the new one
    pub(crate) loading: bool,
    /// Number of explicit flushes currently writing this frame
    pub(crate) flushing: usize,
}

impl FrameMeta {
    /// The page held by this frame, `None` for a frame that was never loaded
    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pin_count(&self) -> usize {
        self.pin_count
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a replacement policy may pick this frame as a victim
    pub fn is_evictable(&self) -> bool {
        self.pin_count == 0 && !self.loading && self.flushing == 0
    }

    /// Holds a page that callers may use
    pub(crate) fn is_resident(&self) -> bool {
        self.page_id.is_some() && !self.loading
    }
}

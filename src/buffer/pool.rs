use std::{mem, slice};

use ahash::AHashMap;
use parking_lot::{
    Condvar, MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use tracing::{debug, info, trace, warn};

use super::config::PoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{FrameId, FrameMeta};
use super::replacer::{ReplacementPolicy, ReplacementStrategy};
use crate::file::{PAGE_SIZE, PageId, Volume, VolumeError};

/// A caller's claim on a pinned page
///
/// Handles are plain tokens: copying one does not add a pin, and every
/// successful [`BufferPool::pin`] must be matched by exactly one
/// [`BufferPool::unpin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    page_id: PageId,
    frame: FrameId,
}

impl PageHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }
}

/// Cumulative I/O counters of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub pages_read: u64,
    pub pages_written: u64,
}

/// Everything guarded by the pool-wide lock
struct FrameTable {
    page_table: AHashMap<PageId, FrameId>,
    frames: Vec<FrameMeta>,
    policy: Box<dyn ReplacementPolicy>,
    stats: PoolStats,
    /// Last known size of the volume
    page_count: usize,
    closed: bool,
}

/// A frame claimed by an explicit flush
struct FlushEntry {
    frame: FrameId,
    page_id: PageId,
    was_dirty: bool,
}

/// Outcome of the I/O half of a miss
struct SwapIn {
    wrote_back: bool,
    result: BufferResult<()>,
}

impl FrameTable {
    fn ensure_open(&self) -> BufferResult<()> {
        if self.closed {
            return Err(BufferError::PoolClosed);
        }
        Ok(())
    }

    /// Frame holding `page_id`; pages mid-load are not resident yet
    fn resident(&self, page_id: PageId) -> BufferResult<FrameId> {
        self.page_table
            .get(&page_id)
            .copied()
            .filter(|&idx| {
                let frame = &self.frames[idx];
                frame.is_resident() && frame.page_id == Some(page_id)
            })
            .ok_or(BufferError::InvalidHandle(page_id))
    }

    fn begin_flush_frame(&mut self, idx: FrameId) -> Option<FlushEntry> {
        let frame = &mut self.frames[idx];
        let page_id = frame.page_id?;
        let was_dirty = frame.dirty;
        frame.flushing += 1;
        frame.dirty = false;
        Some(FlushEntry {
            frame: idx,
            page_id,
            was_dirty,
        })
    }

    /// Claim every resident dirty frame for flushing
    fn begin_flush_dirty(&mut self) -> Vec<FlushEntry> {
        let dirty: Vec<FrameId> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_resident() && frame.dirty)
            .map(|(idx, _)| idx)
            .collect();

        dirty
            .into_iter()
            .filter_map(|idx| self.begin_flush_frame(idx))
            .collect()
    }

    /// Release flushed frames; the first `written` entries reached the volume
    fn finish_flush(&mut self, batch: &[FlushEntry], written: usize) {
        for (i, entry) in batch.iter().enumerate() {
            let frame = &mut self.frames[entry.frame];
            frame.flushing -= 1;
            if i < written {
                self.stats.pages_written += 1;
            } else {
                // A concurrent mark_dirty may have set it again meanwhile
                frame.dirty |= entry.was_dirty;
            }
        }
    }
}

/// The volume plus the spare page buffer misses read into
struct VolumeSlot<V> {
    volume: V,
    spare: Box<[u8]>,
}

/// A fixed-capacity page cache over one volume
///
/// All bookkeeping sits behind one pool-wide lock. Page bytes live in
/// per-frame locks so pinned pages can be read and written without it, and
/// the I/O of a miss runs with the pool-wide lock released.
pub struct BufferPool<V: Volume> {
    table: Mutex<FrameTable>,
    /// Signalled whenever a frame finishes loading or flushing
    settled: Condvar,
    buffers: Box<[RwLock<Box<[u8]>>]>,
    io: Mutex<VolumeSlot<V>>,
    strategy: Option<ReplacementStrategy>,
}

impl<V: Volume> BufferPool<V> {
    /// Create a buffer pool over `volume`
    pub fn new(volume: V, config: PoolConfig) -> BufferResult<Self> {
        config.validate()?;
        let policy = config.strategy.build(config.capacity);
        let mut pool = Self::with_policy(volume, config.capacity, policy)?;
        pool.strategy = Some(config.strategy);
        Ok(pool)
    }

    /// Create a buffer pool with a built-in replacement strategy
    pub fn with_capacity(
        volume: V,
        capacity: usize,
        strategy: ReplacementStrategy,
    ) -> BufferResult<Self> {
        Self::new(volume, PoolConfig::new(capacity, strategy))
    }

    /// Create a buffer pool driven by a caller-supplied policy
    ///
    /// The policy sees frame ids up to `capacity - 1`. Built-in replacers
    /// made for fewer frames grow on demand.
    pub fn with_policy(
        volume: V,
        capacity: usize,
        policy: Box<dyn ReplacementPolicy>,
    ) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::Config(
                "capacity must be at least 1 frame".to_string(),
            ));
        }

        let buffers = (0..capacity)
            .map(|_| RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()))
            .collect();
        let page_count = volume.page_count();

        info!(capacity, page_count, "created buffer pool");

        Ok(Self {
            table: Mutex::new(FrameTable {
                page_table: AHashMap::with_capacity(capacity),
                frames: vec![FrameMeta::default(); capacity],
                policy,
                stats: PoolStats::default(),
                page_count,
                closed: false,
            }),
            settled: Condvar::new(),
            buffers,
            io: Mutex::new(VolumeSlot {
                volume,
                spare: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            }),
            strategy: None,
        })
    }

    /// Pin `page_id`, reading it from the volume if it is not cached
    ///
    /// Fails with `PoolFull` when every frame is pinned; the caller decides
    /// whether to retry. Unpinned frames that are mid-load or mid-flush are
    /// waited for.
    pub fn pin(&self, page_id: PageId) -> BufferResult<PageHandle> {
        let mut table = self.table.lock();
        let victim = loop {
            table.ensure_open()?;
            if let Some(&idx) = table.page_table.get(&page_id) {
                if table.frames[idx].loading {
                    // Either being loaded or being evicted; look again once it settles
                    self.settled.wait(&mut table);
                    continue;
                }

                let state = &mut *table;
                state.frames[idx].pin_count += 1;
                state.policy.on_access(idx);
                trace!(page_id, frame = idx, "buffer pool hit");
                return Ok(PageHandle {
                    page_id,
                    frame: idx,
                });
            }

            if page_id >= table.page_count {
                return Err(VolumeError::OutOfRange {
                    page_id,
                    page_count: table.page_count,
                }
                .into());
            }

            let state = &mut *table;
            if let Some(victim) = state.policy.select_victim(&state.frames) {
                break victim;
            }
            let busy = state
                .frames
                .iter()
                .any(|frame| frame.pin_count == 0 && !frame.is_evictable());
            if !busy {
                debug!(page_id, "no evictable frame");
                return Err(BufferError::PoolFull);
            }
            self.settled.wait(&mut table);
        };

        let state = &mut *table;
        let frame = &mut state.frames[victim];
        let evicted = frame.page_id;
        let write_back = evicted.filter(|_| frame.dirty);
        frame.loading = true;
        // Both the old and the new page id now lead to the loading frame
        state.page_table.insert(page_id, victim);
        drop(table);

        let swap = self.swap_in(victim, page_id, write_back);

        let mut table = self.table.lock();
        let state = &mut *table;
        let frame = &mut state.frames[victim];
        frame.loading = false;
        if swap.wrote_back {
            frame.dirty = false;
            state.stats.pages_written += 1;
        }

        let result = match swap.result {
            Ok(()) => {
                if let Some(old) = evicted {
                    state.page_table.remove(&old);
                }
                frame.page_id = Some(page_id);
                frame.dirty = false;
                frame.pin_count = 1;
                state.policy.on_load(victim);
                state.stats.pages_read += 1;
                debug!(page_id, frame = victim, evicted = ?evicted, "buffer pool miss");
                Ok(PageHandle {
                    page_id,
                    frame: victim,
                })
            }
            Err(err) => {
                // The victim keeps its old page
                state.page_table.remove(&page_id);
                debug!(page_id, frame = victim, error = %err, "failed to load page");
                Err(err)
            }
        };
        drop(table);
        self.settled.notify_all();

        result
    }

    /// Write back the victim's old page if needed, then read `page_id` into the frame
    fn swap_in(&self, frame: FrameId, page_id: PageId, write_back: Option<PageId>) -> SwapIn {
        let mut io = self.io.lock();
        let io = &mut *io;

        let mut wrote_back = false;
        if let Some(old) = write_back {
            let data = self.buffers[frame].read();
            if let Err(err) = io.volume.write_page(old, &data) {
                return SwapIn {
                    wrote_back,
                    result: Err(err.into()),
                };
            }
            wrote_back = true;
            debug!(page_id = old, frame, "wrote back evicted page");
        }

        // Read into the spare so a failed read leaves the frame intact
        if let Err(err) = io.volume.read_page(page_id, &mut io.spare) {
            return SwapIn {
                wrote_back,
                result: Err(err.into()),
            };
        }
        mem::swap(&mut *self.buffers[frame].write(), &mut io.spare);

        SwapIn {
            wrote_back,
            result: Ok(()),
        }
    }

    /// Release one pin on the handle's page
    pub fn unpin(&self, handle: &PageHandle) -> BufferResult<()> {
        let mut table = self.table.lock();
        table.ensure_open()?;
        let idx = table.resident(handle.page_id)?;

        let frame = &mut table.frames[idx];
        if frame.pin_count == 0 {
            return Err(BufferError::InvalidHandle(handle.page_id));
        }
        frame.pin_count -= 1;
        Ok(())
    }

    /// Mark the handle's page as modified
    pub fn mark_dirty(&self, handle: &PageHandle) -> BufferResult<()> {
        let mut table = self.table.lock();
        table.ensure_open()?;
        let idx = table.resident(handle.page_id)?;
        table.frames[idx].dirty = true;
        Ok(())
    }

    /// Write the handle's page to the volume now, dirty or not
    ///
    /// A clean page is written too, and counts as one write.
    pub fn force_page(&self, handle: &PageHandle) -> BufferResult<()> {
        let entry = {
            let mut table = self.table.lock();
            table.ensure_open()?;
            let idx = table.resident(handle.page_id)?;
            table.begin_flush_frame(idx)
        };

        match entry {
            Some(entry) => self.write_claimed(&entry),
            None => Ok(()),
        }
    }

    /// Write every dirty page to the volume, pinned or not
    ///
    /// Frames are claimed one at a time, so a page evicted meanwhile is
    /// written back by its eviction instead.
    pub fn force_flush_pool(&self) -> BufferResult<()> {
        let dirty: Vec<PageId> = {
            let table = self.table.lock();
            table.ensure_open()?;
            table
                .frames
                .iter()
                .filter(|frame| frame.is_resident() && frame.dirty)
                .filter_map(|frame| frame.page_id)
                .collect()
        };
        if dirty.is_empty() {
            return Ok(());
        }

        let mut written = 0;
        for page_id in dirty {
            let entry = {
                let mut table = self.table.lock();
                match table.resident(page_id) {
                    Ok(idx) if table.frames[idx].dirty => table.begin_flush_frame(idx),
                    _ => None,
                }
            };
            if let Some(entry) = entry {
                self.write_claimed(&entry)?;
                written += 1;
            }
        }
        self.io.lock().volume.sync()?;

        debug!(pages = written, "flushed dirty pages");
        Ok(())
    }

    /// Write one claimed frame and release the claim
    fn write_claimed(&self, entry: &FlushEntry) -> BufferResult<()> {
        let (written, result) = self.write_frames(slice::from_ref(entry));
        self.table.lock().finish_flush(slice::from_ref(entry), written);
        self.settled.notify_all();
        result
    }

    /// Flush all dirty pages and close the pool
    ///
    /// Fails with `PoolBusy` while any page is pinned, leaving the pool usable.
    /// Every later operation fails with `PoolClosed`.
    pub fn shutdown(&self) -> BufferResult<()> {
        // Held throughout so nothing can be pinned during the final flush
        let mut table = self.table.lock();
        table.ensure_open()?;

        let pinned = table
            .frames
            .iter()
            .filter(|frame| frame.pin_count > 0 || frame.loading)
            .count();
        if pinned > 0 {
            return Err(BufferError::PoolBusy { pinned });
        }

        let batch = table.begin_flush_dirty();
        let (written, result) = self.write_frames(&batch);
        let result = result.and_then(|()| self.io.lock().volume.sync().map_err(Into::into));
        table.finish_flush(&batch, written);
        result?;

        table.closed = true;
        table.page_table.clear();
        info!(
            pages_read = table.stats.pages_read,
            pages_written = table.stats.pages_written,
            "buffer pool shut down"
        );
        Ok(())
    }

    /// Write the claimed frames in order, stopping at the first failure
    ///
    /// Returns how many were written.
    fn write_frames(&self, batch: &[FlushEntry]) -> (usize, BufferResult<()>) {
        for (written, entry) in batch.iter().enumerate() {
            // Frame lock before volume lock: a loader holds the volume while
            // touching its victim, and flushed frames are never victims
            let data = self.buffers[entry.frame].read();
            let result = self.io.lock().volume.write_page(entry.page_id, &data);
            if let Err(err) = result {
                return (written, Err(err.into()));
            }
        }
        (batch.len(), Ok(()))
    }

    /// Check that `handle` still refers to a pinned resident page
    fn check_pinned(&self, handle: &PageHandle) -> BufferResult<()> {
        let table = self.table.lock();
        table.ensure_open()?;
        let valid = table.frames.get(handle.frame).is_some_and(|frame| {
            frame.is_resident() && frame.page_id == Some(handle.page_id) && frame.pin_count > 0
        });
        if !valid {
            return Err(BufferError::InvalidHandle(handle.page_id));
        }
        Ok(())
    }

    /// Shared view of a pinned page's bytes
    ///
    /// Drop the guard before unpinning.
    pub fn page(&self, handle: &PageHandle) -> BufferResult<MappedRwLockReadGuard<'_, [u8]>> {
        self.check_pinned(handle)?;
        Ok(RwLockReadGuard::map(self.buffers[handle.frame].read(), |data| &**data))
    }

    /// Exclusive view of a pinned page's bytes
    ///
    /// Does not mark the page dirty; call [`BufferPool::mark_dirty`].
    pub fn page_mut(
        &self,
        handle: &PageHandle,
    ) -> BufferResult<MappedRwLockWriteGuard<'_, [u8]>> {
        self.check_pinned(handle)?;
        Ok(RwLockWriteGuard::map(
            self.buffers[handle.frame].write(),
            |data| &mut **data,
        ))
    }

    /// Number of pages in the backing volume
    pub fn page_count(&self) -> usize {
        self.table.lock().page_count
    }

    /// Grow the backing volume to at least `pages` pages
    pub fn ensure_capacity(&self, pages: usize) -> BufferResult<()> {
        self.table.lock().ensure_open()?;

        let page_count = {
            let mut io = self.io.lock();
            io.volume.ensure_capacity(pages)?;
            io.volume.page_count()
        };

        let mut table = self.table.lock();
        table.page_count = table.page_count.max(page_count);
        Ok(())
    }

    /// Number of frames
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// The built-in strategy, `None` for a caller-supplied policy
    pub fn strategy(&self) -> Option<ReplacementStrategy> {
        self.strategy
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.table.lock().resident(page_id).is_ok()
    }

    /// Snapshot of every frame's metadata, in frame order
    pub fn frames(&self) -> Vec<FrameMeta> {
        self.table.lock().frames.clone()
    }

    /// Page held by each frame
    pub fn frame_contents(&self) -> Vec<Option<PageId>> {
        self.table.lock().frames.iter().map(|f| f.page_id).collect()
    }

    /// Dirty flag of each frame
    pub fn dirty_flags(&self) -> Vec<bool> {
        self.table.lock().frames.iter().map(|f| f.dirty).collect()
    }

    /// Pin count of each frame
    pub fn fix_counts(&self) -> Vec<usize> {
        self.table.lock().frames.iter().map(|f| f.pin_count).collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.table.lock().stats
    }

    /// Pages read from the volume since creation
    pub fn num_read_io(&self) -> u64 {
        self.stats().pages_read
    }

    /// Pages written to the volume since creation
    pub fn num_write_io(&self) -> u64 {
        self.stats().pages_written
    }
}

impl<V: Volume> Drop for BufferPool<V> {
    fn drop(&mut self) {
        if self.table.get_mut().closed {
            return;
        }
        // Best effort, pins are ignored
        if let Err(err) = self.force_flush_pool() {
            warn!(error = %err, "failed to flush buffer pool on drop");
        }
    }
}

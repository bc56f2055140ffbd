use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::*;
use crate::file::{MemoryVolume, PAGE_SIZE, PageFile, PageId, Volume, VolumeError, VolumeResult};

fn memory_pool(
    capacity: usize,
    strategy: ReplacementStrategy,
    pages: usize,
) -> BufferPool<MemoryVolume> {
    BufferPool::with_capacity(MemoryVolume::with_pages(pages), capacity, strategy).unwrap()
}

fn pin_unpin<V: Volume>(pool: &BufferPool<V>, page_id: PageId) {
    let handle = pool.pin(page_id).unwrap();
    pool.unpin(&handle).unwrap();
}

fn resident_set<V: Volume>(pool: &BufferPool<V>) -> BTreeSet<PageId> {
    pool.frame_contents().into_iter().flatten().collect()
}

/// Volume whose reads or writes can be made to fail on demand
struct FailingVolume {
    inner: MemoryVolume,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FailingVolume {
    fn new(pages: usize) -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
        let fail_reads = Arc::new(AtomicBool::new(false));
        let fail_writes = Arc::new(AtomicBool::new(false));
        let volume = Self {
            inner: MemoryVolume::with_pages(pages),
            fail_reads: fail_reads.clone(),
            fail_writes: fail_writes.clone(),
        };
        (volume, fail_reads, fail_writes)
    }
}

impl Volume for FailingVolume {
    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> VolumeResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            buffer.fill(0xEE);
            return Err(VolumeError::Io(io::Error::other("injected read failure")));
        }
        self.inner.read_page(page_id, buffer)
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> VolumeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VolumeError::Io(io::Error::other("injected write failure")));
        }
        self.inner.write_page(page_id, buffer)
    }

    fn ensure_capacity(&mut self, pages: usize) -> VolumeResult<()> {
        self.inner.ensure_capacity(pages)
    }

    fn sync(&mut self) -> VolumeResult<()> {
        self.inner.sync()
    }
}

#[derive(Default)]
struct GateState {
    entered: bool,
    open: bool,
}

/// Blocks a volume call until the test opens it
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    fn pass(&self) {
        let mut state = self.state.lock();
        state.entered = true;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
    }

    fn wait_entered(&self) {
        let mut state = self.state.lock();
        while !state.entered {
            self.changed.wait(&mut state);
        }
    }

    fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }
}

/// Volume that holds reads or writes of one page at a gate
///
/// Byte 0 of every page starts out as `page_id + 1`.
struct GatedVolume {
    inner: MemoryVolume,
    gate: Arc<Gate>,
    gated_read: Option<PageId>,
    gated_write: Option<PageId>,
}

impl GatedVolume {
    fn new(
        pages: usize,
        gated_read: Option<PageId>,
        gated_write: Option<PageId>,
    ) -> (Self, Arc<Gate>) {
        let mut inner = MemoryVolume::with_pages(pages);
        let mut buffer = vec![0u8; PAGE_SIZE];
        for page_id in 0..pages {
            buffer[0] = page_id as u8 + 1;
            inner.write_page(page_id, &buffer).unwrap();
        }

        let gate = Arc::new(Gate::default());
        let volume = Self {
            inner,
            gate: gate.clone(),
            gated_read,
            gated_write,
        };
        (volume, gate)
    }
}

impl Volume for GatedVolume {
    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> VolumeResult<()> {
        if self.gated_read == Some(page_id) {
            self.gate.pass();
        }
        self.inner.read_page(page_id, buffer)
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> VolumeResult<()> {
        if self.gated_write == Some(page_id) {
            self.gate.pass();
        }
        self.inner.write_page(page_id, buffer)
    }

    fn ensure_capacity(&mut self, pages: usize) -> VolumeResult<()> {
        self.inner.ensure_capacity(pages)
    }

    fn sync(&mut self) -> VolumeResult<()> {
        self.inner.sync()
    }
}

/// Long enough for a spawned thread to reach its blocking point
const SETTLE: Duration = Duration::from_millis(50);

#[test]
fn test_zero_capacity_rejected() {
    let result = BufferPool::with_capacity(MemoryVolume::new(), 0, ReplacementStrategy::Lru);
    assert!(matches!(result, Err(BufferError::Config(_))));

    let result = BufferPool::with_policy(MemoryVolume::new(), 0, Box::new(LruReplacer::new()));
    assert!(matches!(result, Err(BufferError::Config(_))));
}

#[test]
fn test_new_pool_is_empty() {
    let pool = memory_pool(4, ReplacementStrategy::Clock, 1);
    assert_eq!(pool.capacity(), 4);
    assert_eq!(pool.strategy(), Some(ReplacementStrategy::Clock));
    assert_eq!(pool.frame_contents(), vec![None; 4]);
    assert_eq!(pool.dirty_flags(), vec![false; 4]);
    assert_eq!(pool.fix_counts(), vec![0; 4]);
    assert_eq!(pool.stats(), PoolStats::default());
}

#[test]
fn test_custom_policy() {
    let policy = Box::new(FifoReplacer::new(2));
    let pool = BufferPool::with_policy(MemoryVolume::with_pages(3), 2, policy).unwrap();
    assert_eq!(pool.strategy(), None);

    pin_unpin(&pool, 0);
    pin_unpin(&pool, 1);
    pin_unpin(&pool, 2);
    assert_eq!(pool.frame_contents(), vec![Some(2), Some(1)]);
}

#[test]
fn test_policy_smaller_than_pool() {
    let policy = Box::new(FifoReplacer::new(1));
    let pool = BufferPool::with_policy(MemoryVolume::with_pages(4), 3, policy).unwrap();

    for page_id in 0..4 {
        pin_unpin(&pool, page_id);
    }
    assert_eq!(pool.frame_contents(), vec![Some(3), Some(1), Some(2)]);
}

#[test]
fn test_fifo_scenario() {
    let pool = memory_pool(3, ReplacementStrategy::Fifo, 4);

    let handles: Vec<_> = (0..3).map(|page_id| pool.pin(page_id).unwrap()).collect();
    assert_eq!(pool.fix_counts(), vec![1, 1, 1]);
    for handle in &handles {
        pool.unpin(handle).unwrap();
    }

    let handle = pool.pin(3).unwrap();
    assert_eq!(pool.frame_contents(), vec![Some(3), Some(1), Some(2)]);
    assert_eq!(resident_set(&pool), BTreeSet::from([1, 2, 3]));
    assert_eq!(pool.fix_counts(), vec![1, 0, 0]);
    assert_eq!(pool.num_read_io(), 4);
    assert_eq!(pool.num_write_io(), 0);
    pool.unpin(&handle).unwrap();
}

#[test]
fn test_fifo_dirty_victim_written_back() {
    let pool = memory_pool(3, ReplacementStrategy::Fifo, 4);

    let handle = pool.pin(0).unwrap();
    pool.page_mut(&handle).unwrap()[0] = 42;
    pool.mark_dirty(&handle).unwrap();
    pool.unpin(&handle).unwrap();
    pin_unpin(&pool, 1);
    pin_unpin(&pool, 2);

    pin_unpin(&pool, 3);
    assert!(!pool.is_resident(0));
    assert_eq!(pool.num_write_io(), 1);
    assert_eq!(pool.dirty_flags(), vec![false; 3]);

    pin_unpin(&pool, 1);
    let handle = pool.pin(0).unwrap();
    assert_eq!(pool.page(&handle).unwrap()[0], 42);
}

#[test]
fn test_fifo_next_miss_evicts_first_load() {
    let capacity = 5;
    let pool = memory_pool(capacity, ReplacementStrategy::Fifo, capacity + 1);
    for page_id in 0..capacity {
        pin_unpin(&pool, page_id);
    }
    pin_unpin(&pool, capacity);
    assert!(!pool.is_resident(0));
    assert_eq!(pool.frame_contents()[0], Some(capacity));
}

#[test]
fn test_fifo_hits_do_not_reorder() {
    let pool = memory_pool(3, ReplacementStrategy::Fifo, 4);
    for page_id in 0..3 {
        pin_unpin(&pool, page_id);
    }
    pin_unpin(&pool, 0);
    pin_unpin(&pool, 0);

    pin_unpin(&pool, 3);
    assert_eq!(resident_set(&pool), BTreeSet::from([1, 2, 3]));
}

#[test]
fn test_lru_hit_protects_page() {
    let pool = memory_pool(3, ReplacementStrategy::Lru, 4);
    pin_unpin(&pool, 0);
    pin_unpin(&pool, 1);
    pin_unpin(&pool, 2);

    // Page 0 becomes most recently used, page 1 least
    pin_unpin(&pool, 0);

    pin_unpin(&pool, 3);
    assert_eq!(resident_set(&pool), BTreeSet::from([0, 2, 3]));
    assert_eq!(pool.frame_contents(), vec![Some(0), Some(3), Some(2)]);
}

#[test]
fn test_clock_second_chance() {
    let pool = memory_pool(3, ReplacementStrategy::Clock, 5);
    for page_id in 0..3 {
        pin_unpin(&pool, page_id);
    }

    // First sweep clears every bit and comes back to frame 0
    pin_unpin(&pool, 3);
    assert_eq!(pool.frame_contents(), vec![Some(3), Some(1), Some(2)]);

    // Page 1 is referenced again, so page 2 goes next
    pin_unpin(&pool, 1);
    pin_unpin(&pool, 4);
    assert_eq!(pool.frame_contents(), vec![Some(3), Some(1), Some(4)]);
}

#[test]
fn test_lfu_keeps_frequent_page() {
    let pool = memory_pool(2, ReplacementStrategy::Lfu, 3);
    for _ in 0..3 {
        pin_unpin(&pool, 0);
    }
    pin_unpin(&pool, 1);

    pin_unpin(&pool, 2);
    assert_eq!(pool.frame_contents(), vec![Some(0), Some(2)]);
}

#[test]
fn test_repeated_pin_is_a_hit() {
    let pool = memory_pool(2, ReplacementStrategy::Lru, 2);

    let first = pool.pin(0).unwrap();
    let second = pool.pin(0).unwrap();
    assert_eq!(first, second);
    assert_eq!(pool.fix_counts(), vec![2, 0]);
    assert_eq!(pool.num_read_io(), 1);

    pool.unpin(&first).unwrap();
    assert_eq!(pool.fix_counts(), vec![1, 0]);
    pool.unpin(&second).unwrap();
    assert_eq!(pool.fix_counts(), vec![0, 0]);
    assert_eq!(pool.num_read_io(), 1);
    assert_eq!(pool.num_write_io(), 0);

    let result = pool.unpin(&first);
    assert!(matches!(result, Err(BufferError::InvalidHandle(0))));
    assert_eq!(pool.fix_counts(), vec![0, 0]);
}

#[test]
fn test_stale_handle_rejected() {
    let pool = memory_pool(1, ReplacementStrategy::Fifo, 2);
    let stale = pool.pin(0).unwrap();
    pool.unpin(&stale).unwrap();

    assert!(matches!(pool.page(&stale), Err(BufferError::InvalidHandle(0))));

    let current = pool.pin(1).unwrap();
    assert!(matches!(pool.unpin(&stale), Err(BufferError::InvalidHandle(0))));
    assert!(matches!(pool.mark_dirty(&stale), Err(BufferError::InvalidHandle(0))));
    assert!(matches!(pool.force_page(&stale), Err(BufferError::InvalidHandle(0))));
    assert!(matches!(pool.page_mut(&stale), Err(BufferError::InvalidHandle(0))));
    assert_eq!(pool.fix_counts(), vec![1]);
    pool.unpin(&current).unwrap();
}

#[test]
fn test_mark_dirty_then_flush_pool() {
    let pool = memory_pool(3, ReplacementStrategy::Fifo, 3);
    let handles: Vec<_> = (0..3).map(|page_id| pool.pin(page_id).unwrap()).collect();

    pool.mark_dirty(&handles[1]).unwrap();
    assert_eq!(pool.dirty_flags(), vec![false, true, false]);

    pool.force_flush_pool().unwrap();
    assert_eq!(pool.num_write_io(), 1);
    assert_eq!(pool.dirty_flags(), vec![false; 3]);
    // Pins are untouched by flushing
    assert_eq!(pool.fix_counts(), vec![1, 1, 1]);

    pool.force_flush_pool().unwrap();
    assert_eq!(pool.num_write_io(), 1);
}

#[test]
fn test_force_page_while_pinned() {
    let pool = memory_pool(2, ReplacementStrategy::Lru, 2);
    let handle = pool.pin(1).unwrap();

    // Written even when clean
    pool.force_page(&handle).unwrap();
    assert_eq!(pool.num_write_io(), 1);

    pool.page_mut(&handle).unwrap().fill(7);
    pool.mark_dirty(&handle).unwrap();
    pool.force_page(&handle).unwrap();
    assert_eq!(pool.num_write_io(), 2);
    assert_eq!(pool.dirty_flags(), vec![false, false]);
    assert_eq!(pool.fix_counts(), vec![1, 0]);
    pool.unpin(&handle).unwrap();
}

#[test]
fn test_pool_full() {
    let pool = memory_pool(2, ReplacementStrategy::Lru, 3);
    let first = pool.pin(0).unwrap();
    let _second = pool.pin(1).unwrap();

    let result = pool.pin(2);
    assert!(matches!(result, Err(BufferError::PoolFull)));
    assert_eq!(pool.frame_contents(), vec![Some(0), Some(1)]);
    assert_eq!(pool.fix_counts(), vec![1, 1]);
    assert_eq!(pool.num_read_io(), 2);

    pool.unpin(&first).unwrap();
    pool.pin(2).unwrap();
    assert_eq!(pool.frame_contents(), vec![Some(2), Some(1)]);
}

#[test]
fn test_pin_out_of_range() {
    let pool = memory_pool(3, ReplacementStrategy::Fifo, 2);

    let result = pool.pin(2);
    assert!(matches!(
        result,
        Err(BufferError::Volume(VolumeError::OutOfRange {
            page_id: 2,
            page_count: 2
        }))
    ));
    assert_eq!(pool.frame_contents(), vec![None; 3]);
    assert_eq!(pool.num_read_io(), 0);

    pool.ensure_capacity(3).unwrap();
    assert_eq!(pool.page_count(), 3);
    pin_unpin(&pool, 2);
}

#[test]
fn test_failed_write_back_keeps_victim() {
    let (volume, _fail_reads, fail_writes) = FailingVolume::new(2);
    let pool = BufferPool::with_capacity(volume, 1, ReplacementStrategy::Fifo).unwrap();

    let handle = pool.pin(0).unwrap();
    pool.page_mut(&handle).unwrap()[0] = 9;
    pool.mark_dirty(&handle).unwrap();
    pool.unpin(&handle).unwrap();

    fail_writes.store(true, Ordering::SeqCst);
    assert!(matches!(pool.pin(1), Err(BufferError::Volume(VolumeError::Io(_)))));
    assert_eq!(pool.frame_contents(), vec![Some(0)]);
    assert_eq!(pool.dirty_flags(), vec![true]);
    assert!(!pool.is_resident(1));
    assert_eq!(pool.stats(), PoolStats { pages_read: 1, pages_written: 0 });

    fail_writes.store(false, Ordering::SeqCst);
    pin_unpin(&pool, 1);
    assert_eq!(pool.num_write_io(), 1);

    let handle = pool.pin(0).unwrap();
    assert_eq!(pool.page(&handle).unwrap()[0], 9);
}

#[test]
fn test_failed_read_installs_nothing() {
    let (volume, fail_reads, _fail_writes) = FailingVolume::new(2);
    let pool = BufferPool::with_capacity(volume, 1, ReplacementStrategy::Fifo).unwrap();

    let handle = pool.pin(0).unwrap();
    pool.page_mut(&handle).unwrap()[0] = 5;
    pool.mark_dirty(&handle).unwrap();
    pool.unpin(&handle).unwrap();

    fail_reads.store(true, Ordering::SeqCst);
    assert!(pool.pin(1).is_err());

    // The write-back happened, the read did not
    assert_eq!(pool.frame_contents(), vec![Some(0)]);
    assert_eq!(pool.dirty_flags(), vec![false]);
    assert_eq!(pool.stats(), PoolStats { pages_read: 1, pages_written: 1 });

    // Still a hit with its bytes intact
    let handle = pool.pin(0).unwrap();
    assert_eq!(pool.page(&handle).unwrap()[0], 5);
    assert_eq!(pool.num_read_io(), 1);
}

#[test]
fn test_failed_flush_keeps_dirty() {
    let (volume, _fail_reads, fail_writes) = FailingVolume::new(2);
    let pool = BufferPool::with_capacity(volume, 2, ReplacementStrategy::Lru).unwrap();
    for page_id in 0..2 {
        let handle = pool.pin(page_id).unwrap();
        pool.mark_dirty(&handle).unwrap();
        pool.unpin(&handle).unwrap();
    }

    fail_writes.store(true, Ordering::SeqCst);
    assert!(pool.force_flush_pool().is_err());
    assert_eq!(pool.dirty_flags(), vec![true, true]);
    assert_eq!(pool.num_write_io(), 0);

    fail_writes.store(false, Ordering::SeqCst);
    pool.force_flush_pool().unwrap();
    assert_eq!(pool.dirty_flags(), vec![false, false]);
    assert_eq!(pool.num_write_io(), 2);
}

#[test]
fn test_shutdown_busy_then_ok() {
    let pool = memory_pool(2, ReplacementStrategy::Lru, 2);
    let handle = pool.pin(0).unwrap();
    pool.mark_dirty(&handle).unwrap();

    assert!(matches!(pool.shutdown(), Err(BufferError::PoolBusy { pinned: 1 })));

    // Still fully usable
    assert_eq!(pool.fix_counts(), vec![1, 0]);
    pin_unpin(&pool, 1);
    pool.unpin(&handle).unwrap();

    pool.shutdown().unwrap();
    assert_eq!(pool.num_write_io(), 1);
    assert!(matches!(pool.pin(0), Err(BufferError::PoolClosed)));
    assert!(matches!(pool.shutdown(), Err(BufferError::PoolClosed)));
}

#[test]
fn test_force_page_round_trip_through_eviction() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("test.db");
    let mut file = PageFile::create(&path).unwrap();
    file.ensure_capacity(4).unwrap();
    let pool = BufferPool::with_capacity(file, 2, ReplacementStrategy::Fifo).unwrap();

    let handle = pool.pin(1).unwrap();
    pool.page_mut(&handle).unwrap()[..5].copy_from_slice(b"hello");
    pool.force_page(&handle).unwrap();
    pool.unpin(&handle).unwrap();

    pin_unpin(&pool, 2);
    pin_unpin(&pool, 3);
    assert!(!pool.is_resident(1));
    // Clean victim, nothing written back
    assert_eq!(pool.num_write_io(), 1);

    let handle = pool.pin(1).unwrap();
    assert_eq!(&pool.page(&handle).unwrap()[..5], b"hello");
    pool.unpin(&handle).unwrap();
}

#[test]
fn test_shutdown_persists_dirty_pages() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("test.db");
    let mut file = PageFile::create(&path).unwrap();
    file.ensure_capacity(3).unwrap();

    let pool = BufferPool::with_capacity(file, 3, ReplacementStrategy::Clock).unwrap();
    for page_id in 0..3 {
        let handle = pool.pin(page_id).unwrap();
        pool.page_mut(&handle).unwrap().fill(page_id as u8 + 1);
        pool.mark_dirty(&handle).unwrap();
        pool.unpin(&handle).unwrap();
    }
    pool.shutdown().unwrap();
    assert_eq!(pool.num_write_io(), 3);
    drop(pool);

    let mut file = PageFile::open(&path).unwrap();
    let mut buffer = vec![0u8; PAGE_SIZE];
    for page_id in 0..3 {
        file.read_page(page_id, &mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == page_id as u8 + 1));
    }
}

#[test]
fn test_drop_flushes_dirty_pages() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("test.db");

    {
        let pool =
            BufferPool::with_capacity(PageFile::create(&path).unwrap(), 2, ReplacementStrategy::Lru)
                .unwrap();
        let handle = pool.pin(0).unwrap();
        pool.page_mut(&handle).unwrap()[0] = 88;
        pool.mark_dirty(&handle).unwrap();
        pool.unpin(&handle).unwrap();
        // pool is dropped here, should flush
    }

    let mut file = PageFile::open(&path).unwrap();
    let mut buffer = vec![0u8; PAGE_SIZE];
    file.read_page(0, &mut buffer).unwrap();
    assert_eq!(buffer[0], 88);
}

#[test]
fn test_concurrent_misses_load_once() {
    let pool = Arc::new(memory_pool(2, ReplacementStrategy::Lru, 1));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    pin_unpin(&pool, 0);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(pool.num_read_io(), 1);
    assert_eq!(pool.fix_counts(), vec![0, 0]);
}

#[test]
fn test_pin_waits_for_page_being_loaded() {
    let (volume, gate) = GatedVolume::new(2, Some(1), None);
    let pool = Arc::new(BufferPool::with_capacity(volume, 2, ReplacementStrategy::Lru).unwrap());

    let loader = {
        let pool = pool.clone();
        thread::spawn(move || pool.pin(1).unwrap())
    };
    gate.wait_entered();
    assert!(pool.frames()[0].is_loading());
    assert!(!pool.is_resident(1));

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.pin(1).unwrap())
    };
    thread::sleep(SETTLE);
    assert!(!waiter.is_finished());

    gate.open();
    let first = loader.join().unwrap();
    let second = waiter.join().unwrap();

    assert_eq!(first, second);
    assert_eq!(pool.num_read_io(), 1);
    assert_eq!(pool.fix_counts(), vec![2, 0]);
    assert_eq!(pool.page(&first).unwrap()[0], 2);
    pool.unpin(&first).unwrap();
    pool.unpin(&second).unwrap();
}

#[test]
fn test_pin_of_page_being_evicted_waits_then_misses() {
    let (volume, gate) = GatedVolume::new(3, Some(1), None);
    let pool = Arc::new(BufferPool::with_capacity(volume, 2, ReplacementStrategy::Fifo).unwrap());
    pin_unpin(&pool, 0);
    pin_unpin(&pool, 2);

    // Page 1 replaces page 0, the oldest load
    let loader = {
        let pool = pool.clone();
        thread::spawn(move || pool.pin(1).unwrap())
    };
    gate.wait_entered();
    assert!(!pool.is_resident(0));

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.pin(0).unwrap())
    };
    thread::sleep(SETTLE);
    assert!(!waiter.is_finished());

    gate.open();
    let loaded = loader.join().unwrap();
    let reloaded = waiter.join().unwrap();

    assert_eq!(loaded.frame(), 0);
    assert_eq!(reloaded.frame(), 1);
    assert_eq!(pool.frame_contents(), vec![Some(1), Some(0)]);
    assert_eq!(pool.num_read_io(), 4);
    assert_eq!(pool.page(&reloaded).unwrap()[0], 1);
    pool.unpin(&loaded).unwrap();
    pool.unpin(&reloaded).unwrap();
}

#[test]
fn test_pin_waits_for_flush_instead_of_pool_full() {
    let (volume, gate) = GatedVolume::new(2, None, Some(0));
    let pool = Arc::new(BufferPool::with_capacity(volume, 1, ReplacementStrategy::Lru).unwrap());

    let handle = pool.pin(0).unwrap();
    pool.mark_dirty(&handle).unwrap();
    pool.unpin(&handle).unwrap();

    let flusher = {
        let pool = pool.clone();
        thread::spawn(move || pool.force_flush_pool())
    };
    gate.wait_entered();
    assert_eq!(pool.fix_counts(), vec![0]);

    let pinner = {
        let pool = pool.clone();
        thread::spawn(move || pool.pin(1))
    };
    thread::sleep(SETTLE);
    assert!(!pinner.is_finished());

    gate.open();
    flusher.join().unwrap().unwrap();
    let handle = pinner.join().unwrap().unwrap();

    assert_eq!(handle.frame(), 0);
    assert_eq!(pool.page(&handle).unwrap()[0], 2);
    // The flush already cleaned page 0, so evicting it writes nothing
    assert_eq!(pool.num_write_io(), 1);
    assert_eq!(pool.num_read_io(), 2);
    pool.unpin(&handle).unwrap();
}

#[test]
fn test_concurrent_updates_survive_eviction() {
    const THREADS: usize = 4;
    const PAGES_PER_THREAD: usize = 4;
    const ROUNDS: u8 = 50;

    let pool = Arc::new(memory_pool(
        THREADS,
        ReplacementStrategy::Clock,
        THREADS * PAGES_PER_THREAD,
    ));

    let mut workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    for page_id in t * PAGES_PER_THREAD..(t + 1) * PAGES_PER_THREAD {
                        let handle = loop {
                            match pool.pin(page_id) {
                                Ok(handle) => break handle,
                                Err(BufferError::PoolFull) => thread::yield_now(),
                                Err(err) => panic!("pin failed: {}", err),
                            }
                        };
                        pool.page_mut(&handle).unwrap()[0] += 1;
                        pool.mark_dirty(&handle).unwrap();
                        pool.unpin(&handle).unwrap();
                    }
                }
            })
        })
        .collect();

    let flusher = {
        let pool = pool.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                pool.force_flush_pool().unwrap();
                thread::yield_now();
            }
        })
    };
    workers.push(flusher);

    for worker in workers {
        worker.join().unwrap();
    }

    for page_id in 0..THREADS * PAGES_PER_THREAD {
        let handle = pool.pin(page_id).unwrap();
        assert_eq!(pool.page(&handle).unwrap()[0], ROUNDS, "page {}", page_id);
        pool.unpin(&handle).unwrap();
    }
    assert_eq!(pool.fix_counts(), vec![0; THREADS]);
}

use std::path::Path;

use tracing::{debug, info};

use super::error::{RecordError, RecordResult};
use super::record::{Record, RecordId};
use super::schema::Schema;
use crate::buffer::{BufferPool, PoolConfig};
use crate::file::{PAGE_SIZE, PageFile, PageId, Volume};

/// Page holding the table's counters
pub const METADATA_PAGE: PageId = 0;

const FIRST_DATA_PAGE: PageId = 1;

/// Counters persisted on the metadata page as two little-endian `u32`s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableMeta {
    tuple_count: usize,
    next_free_page: PageId,
}

impl TableMeta {
    fn empty() -> Self {
        Self {
            tuple_count: 0,
            next_free_page: FIRST_DATA_PAGE,
        }
    }

    fn read(page: &[u8]) -> RecordResult<Self> {
        let field = |offset: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&page[offset..offset + 4]);
            u32::from_le_bytes(buf) as usize
        };

        let meta = Self {
            tuple_count: field(0),
            next_free_page: field(4),
        };
        if meta.next_free_page < FIRST_DATA_PAGE {
            return Err(RecordError::CorruptMetadata(format!(
                "next free page {} precedes the first data page",
                meta.next_free_page
            )));
        }
        Ok(meta)
    }

    fn write(&self, page: &mut [u8]) -> RecordResult<()> {
        let encode = |value: usize| {
            u32::try_from(value)
                .map(u32::to_le_bytes)
                .map_err(|_| RecordError::Serialization(format!("{} does not fit in u32", value)))
        };

        page[0..4].copy_from_slice(&encode(self.tuple_count)?);
        page[4..8].copy_from_slice(&encode(self.next_free_page)?);
        Ok(())
    }
}

/// Fixed-width records stored through a buffer pool
///
/// Page 0 holds the counters. Records are packed back to back from page 1 on,
/// so record `n` lives at page `1 + n / per_page`, slot `n % per_page`.
pub struct Table<V: Volume> {
    pool: BufferPool<V>,
    schema: Schema,
    meta: TableMeta,
}

impl Table<PageFile> {
    /// Create an empty table file at `path`, replacing any existing file
    pub fn create<P: AsRef<Path>>(path: P, schema: &Schema) -> RecordResult<()> {
        let mut file = PageFile::create(path)?;
        Self::format(&mut file)?;
        debug!(
            path = %file.path().display(),
            record_size = schema.record_size(),
            "created table"
        );
        file.close()?;
        Ok(())
    }

    /// Open the table file at `path`
    pub fn open<P: AsRef<Path>>(
        path: P,
        schema: Schema,
        config: PoolConfig,
    ) -> RecordResult<Self> {
        let file = PageFile::open(path)?;
        Self::from_volume(file, schema, config)
    }

    pub fn destroy<P: AsRef<Path>>(path: P) -> RecordResult<()> {
        PageFile::destroy(path)?;
        Ok(())
    }
}

impl<V: Volume> Table<V> {
    /// Write empty-table counters to page 0 of `volume`
    pub fn format(volume: &mut V) -> RecordResult<()> {
        volume.ensure_capacity(FIRST_DATA_PAGE)?;
        let mut page = vec![0u8; PAGE_SIZE];
        TableMeta::empty().write(&mut page)?;
        volume.write_page(METADATA_PAGE, &page)?;
        Ok(())
    }

    /// Open a table stored on an already formatted volume
    pub fn from_volume(volume: V, schema: Schema, config: PoolConfig) -> RecordResult<Self> {
        let pool = BufferPool::new(volume, config)?;
        let meta = Self::read_with(&pool, METADATA_PAGE, TableMeta::read)?;

        info!(
            tuples = meta.tuple_count,
            next_free_page = meta.next_free_page,
            "opened table"
        );

        Ok(Self { pool, schema, meta })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The pool the table reads and writes through
    pub fn pool(&self) -> &BufferPool<V> {
        &self.pool
    }

    /// Number of inserted records, deleted ones included
    pub fn num_tuples(&self) -> usize {
        self.meta.tuple_count
    }

    /// Append `record` and stamp it with its new id
    pub fn insert_record(&mut self, record: &mut Record) -> RecordResult<RecordId> {
        record.check_layout(&self.schema)?;

        let rid = self.locate(self.meta.tuple_count);
        self.pool.ensure_capacity(rid.page_id + 1)?;

        let range = self.slot_range(rid);
        Self::write_with(&self.pool, rid.page_id, |page| {
            page[range].copy_from_slice(record.data());
            Ok(())
        })?;

        let mut meta = self.meta;
        meta.tuple_count += 1;
        meta.next_free_page = self.locate(meta.tuple_count).page_id;
        self.store_meta(meta)?;

        record.set_id(rid);
        Ok(rid)
    }

    /// Copy the record at `rid` out of the pool
    pub fn get_record(&self, rid: RecordId) -> RecordResult<Record> {
        self.check_rid(rid)?;
        let range = self.slot_range(rid);
        Self::read_with(&self.pool, rid.page_id, |page| {
            Ok(Record::from_bytes(rid, &page[range]))
        })
    }

    /// Overwrite the stored copy of `record`
    pub fn update_record(&mut self, record: &Record) -> RecordResult<()> {
        record.check_layout(&self.schema)?;
        let rid = record
            .id()
            .ok_or_else(|| RecordError::InvalidRecord("record was never inserted".to_string()))?;
        self.check_rid(rid)?;

        let range = self.slot_range(rid);
        Self::write_with(&self.pool, rid.page_id, |page| {
            page[range].copy_from_slice(record.data());
            Ok(())
        })
    }

    /// Zero-fill the slot at `rid`
    ///
    /// Slots are never reused and the tuple count is unchanged.
    pub fn delete_record(&mut self, rid: RecordId) -> RecordResult<()> {
        self.check_rid(rid)?;
        let range = self.slot_range(rid);
        Self::write_with(&self.pool, rid.page_id, |page| {
            page[range].fill(0);
            Ok(())
        })
    }

    /// Persist the counters and shut the pool down
    ///
    /// Fails with `PoolBusy` (wrapped) if any page is still pinned.
    pub fn close(self) -> RecordResult<()> {
        let handle = self.pool.pin(METADATA_PAGE)?;
        let written = self
            .pool
            .page_mut(&handle)
            .map_err(RecordError::from)
            .and_then(|mut page| self.meta.write(&mut page))
            .and_then(|()| self.pool.force_page(&handle).map_err(Into::into));
        self.pool.unpin(&handle)?;
        written?;

        self.pool.shutdown()?;
        info!(tuples = self.meta.tuple_count, "closed table");
        Ok(())
    }

    fn locate(&self, index: usize) -> RecordId {
        let per_page = self.schema.records_per_page();
        RecordId::new(FIRST_DATA_PAGE + index / per_page, index % per_page)
    }

    fn slot_range(&self, rid: RecordId) -> std::ops::Range<usize> {
        let size = self.schema.record_size();
        rid.slot_id * size..(rid.slot_id + 1) * size
    }

    fn check_rid(&self, rid: RecordId) -> RecordResult<()> {
        let per_page = self.schema.records_per_page();
        let in_bounds = rid.page_id >= FIRST_DATA_PAGE
            && rid.slot_id < per_page
            && (rid.page_id - FIRST_DATA_PAGE) * per_page + rid.slot_id < self.meta.tuple_count;
        if !in_bounds {
            return Err(RecordError::InvalidSlot(rid.page_id, rid.slot_id));
        }
        Ok(())
    }

    fn store_meta(&mut self, meta: TableMeta) -> RecordResult<()> {
        Self::write_with(&self.pool, METADATA_PAGE, |page| meta.write(page))?;
        self.meta = meta;
        Ok(())
    }

    /// Pin `page_id`, run `f` over its bytes, unpin
    fn read_with<R>(
        pool: &BufferPool<V>,
        page_id: PageId,
        f: impl FnOnce(&[u8]) -> RecordResult<R>,
    ) -> RecordResult<R> {
        let handle = pool.pin(page_id)?;
        let result = pool
            .page(&handle)
            .map_err(RecordError::from)
            .and_then(|page| f(&page));
        pool.unpin(&handle)?;
        result
    }

    /// Pin `page_id`, let `f` modify it, mark it dirty, unpin
    fn write_with<R>(
        pool: &BufferPool<V>,
        page_id: PageId,
        f: impl FnOnce(&mut [u8]) -> RecordResult<R>,
    ) -> RecordResult<R> {
        let handle = pool.pin(page_id)?;
        let result = pool
            .page_mut(&handle)
            .map_err(RecordError::from)
            .and_then(|mut page| f(&mut page))
            .and_then(|value| {
                pool.mark_dirty(&handle)?;
                Ok(value)
            });
        pool.unpin(&handle)?;
        result
    }
}

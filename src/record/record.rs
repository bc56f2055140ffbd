use super::error::{RecordError, RecordResult};
use super::schema::Schema;
use super::value::Value;
use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

/// A record's raw bytes, owned by the caller
///
/// Records read from a table are copies; changing one does nothing until it
/// is written back with `Table::update_record`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<RecordId>,
    data: Box<[u8]>,
}

impl Record {
    /// A zero-filled record laid out for `schema`
    pub fn new(schema: &Schema) -> Self {
        Self {
            id: None,
            data: vec![0u8; schema.record_size()].into_boxed_slice(),
        }
    }

    /// Build a record from one value per attribute
    pub fn from_values(schema: &Schema, values: &[Value]) -> RecordResult<Self> {
        if values.len() != schema.attribute_count() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} attributes, got {}",
                schema.attribute_count(),
                values.len()
            )));
        }

        let mut record = Self::new(schema);
        for (idx, value) in values.iter().enumerate() {
            record.set_attr(schema, idx, value)?;
        }
        Ok(record)
    }

    pub(crate) fn from_bytes(id: RecordId, bytes: &[u8]) -> Self {
        Self {
            id: Some(id),
            data: bytes.into(),
        }
    }

    /// Where the record is stored, `None` until it is inserted
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_attr(&self, schema: &Schema, idx: usize) -> RecordResult<Value> {
        self.check_layout(schema)?;
        let range = schema.attribute_range(idx)?;
        Value::decode(&self.data[range], &schema.attributes()[idx].data_type)
    }

    pub fn set_attr(&mut self, schema: &Schema, idx: usize, value: &Value) -> RecordResult<()> {
        self.check_layout(schema)?;
        let range = schema.attribute_range(idx)?;
        value.encode_into(&schema.attributes()[idx].data_type, &mut self.data[range])
    }

    /// Decode every attribute
    pub fn values(&self, schema: &Schema) -> RecordResult<Vec<Value>> {
        (0..schema.attribute_count())
            .map(|idx| self.get_attr(schema, idx))
            .collect()
    }

    pub(crate) fn check_layout(&self, schema: &Schema) -> RecordResult<()> {
        if self.data.len() != schema.record_size() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} bytes, got {}",
                schema.record_size(),
                self.data.len()
            )));
        }
        Ok(())
    }
}

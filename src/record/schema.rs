use std::collections::HashSet;

use super::error::{RecordError, RecordResult};
use super::value::DataType;
use crate::file::PAGE_SIZE;

/// A named, typed attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Layout of a fixed-width record
///
/// Attributes are packed back to back in declaration order, each taking the
/// width of its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<Attribute>,
    offsets: Vec<usize>,
    record_size: usize,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> RecordResult<Self> {
        if attributes.is_empty() {
            return Err(RecordError::InvalidSchema(
                "a schema needs at least one attribute".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut offsets = Vec::with_capacity(attributes.len());
        let mut record_size = 0;
        for attr in &attributes {
            if !names.insert(attr.name.as_str()) {
                return Err(RecordError::InvalidSchema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
            if attr.data_type.size() == 0 {
                return Err(RecordError::InvalidSchema(format!(
                    "attribute '{}' has zero width",
                    attr.name
                )));
            }
            offsets.push(record_size);
            record_size += attr.data_type.size();
        }

        if record_size > PAGE_SIZE {
            return Err(RecordError::InvalidSchema(format!(
                "record size {} exceeds page size {}",
                record_size, PAGE_SIZE
            )));
        }

        Ok(Self {
            attributes,
            offsets,
            record_size,
        })
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute(&self, idx: usize) -> Option<&Attribute> {
        self.attributes.get(idx)
    }

    /// Find attribute index by name
    pub fn find_attribute(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Byte range of attribute `idx` within a record
    pub fn attribute_range(&self, idx: usize) -> RecordResult<std::ops::Range<usize>> {
        let attr = self
            .attributes
            .get(idx)
            .ok_or(RecordError::InvalidAttribute(idx))?;
        let start = self.offsets[idx];
        Ok(start..start + attr.data_type.size())
    }

    /// Total record size in bytes
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of records that fit in one data page
    pub fn records_per_page(&self) -> usize {
        PAGE_SIZE / self.record_size
    }
}

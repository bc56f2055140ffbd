use super::error::{RecordError, RecordResult};

/// Declared type of an attribute, which fixes its width in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Bool,        // 1 byte
    Char(usize), // n bytes (fixed length)
}

impl DataType {
    /// Get the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 8,
            DataType::Bool => 1,
            DataType::Char(n) => *n,
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    String(String),
}

impl Value {
    /// Encode into `out`, which is exactly `data_type.size()` bytes
    ///
    /// Strings shorter than the column are zero-padded.
    pub fn encode_into(&self, data_type: &DataType, out: &mut [u8]) -> RecordResult<()> {
        if out.len() != data_type.size() {
            return Err(RecordError::Serialization(format!(
                "Expected {} bytes for {:?}, got {}",
                data_type.size(),
                data_type,
                out.len()
            )));
        }

        match (self, data_type) {
            (Value::Int(i), DataType::Int) => out.copy_from_slice(&i.to_le_bytes()),
            (Value::Float(f), DataType::Float) => out.copy_from_slice(&f.to_le_bytes()),
            (Value::Bool(b), DataType::Bool) => out[0] = u8::from(*b),
            (Value::String(s), DataType::Char(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                out[..bytes.len()].copy_from_slice(bytes);
                out[bytes.len()..].fill(0);
            }
            _ => {
                return Err(RecordError::TypeMismatch {
                    expected: format!("{:?}", data_type),
                    actual: format!("{:?}", self),
                });
            }
        }
        Ok(())
    }

    /// Decode a value of `data_type` from its fixed-width bytes
    pub fn decode(bytes: &[u8], data_type: &DataType) -> RecordResult<Self> {
        if bytes.len() != data_type.size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for {:?}, got {}",
                data_type.size(),
                data_type,
                bytes.len()
            )));
        }

        let value = match data_type {
            DataType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Value::Int(i32::from_le_bytes(buf))
            }
            DataType::Float => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Value::Float(f64::from_le_bytes(buf))
            }
            DataType::Bool => Value::Bool(bytes[0] != 0),
            DataType::Char(_) => {
                // Find the first null byte (string terminator)
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Value::String(s)
            }
        };
        Ok(value)
    }
}

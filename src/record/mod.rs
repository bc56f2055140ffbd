mod error;
mod record;
mod schema;
mod table;
mod value;

pub use error::{RecordError, RecordResult};
pub use record::{Record, RecordId, SlotId};
pub use schema::{Attribute, Schema};
pub use table::{METADATA_PAGE, Table};
pub use value::{DataType, Value};

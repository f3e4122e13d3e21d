pub mod error;
pub mod types;
pub mod value;

pub use error::{MigrationError, Result};
pub use types::{EntityRecord, EntityType};
pub use value::FieldValue;

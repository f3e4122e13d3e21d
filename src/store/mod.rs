pub mod backup;
pub mod entity;

pub use backup::{BackupStore, InMemoryBackupStore};
pub use entity::{EntityStore, EntityStores, InMemoryEntityStore};

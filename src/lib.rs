// ============================================================================
// vaultmigrate: encrypted-at-rest migration orchestration
// ============================================================================

//! Migrates plaintext business records (employees, invoices, payroll)
//! into an encrypted-at-rest representation, with backup/rollback,
//! validation, conflict resolution, and consistency checking around the
//! batch.
//!
//! The crate is a single-process orchestration over injected
//! collaborators: entity stores, a cipher primitive, and an audit sink.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vaultmigrate::{
//!     AesGcmCipher, EntityRecord, EntityType, MemoryAuditSink,
//!     MigrationConfig, MigrationService,
//! };
//! use vaultmigrate::store::{EntityStore, EntityStores};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! tokio_test::block_on(async {
//!     let stores = EntityStores::in_memory();
//!     stores.store(EntityType::Employee)?
//!         .save(
//!             EntityRecord::new("e-1")
//!                 .with_field("first_name", "Ana")
//!                 .with_field("last_name", "Ilic")
//!                 .with_field("email", "ana@corp.example")
//!                 .with_field("phone", "+381 64 123-4567")
//!                 .with_field("salary", 95_000.0),
//!         )
//!         .await?;
//!
//!     let service = MigrationService::new(
//!         MigrationConfig::default(),
//!         stores,
//!         Arc::new(AesGcmCipher::new(&AesGcmCipher::random_key())),
//!         Arc::new(MemoryAuditSink::new()),
//!     );
//!
//!     let outcome = service.migrate_with_backup().await?;
//!     assert!(outcome.migration.success);
//!     assert!(outcome.rollback.is_none());
//!     Ok(())
//! })
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod conflict;
pub mod consistency;
pub mod core;
pub mod crypto;
pub mod facade;
pub mod migrate;
pub mod model;
pub mod registry;
pub mod rollback;
pub mod store;
pub mod validate;

// Re-export the main types for convenience
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::MigrationConfig;
pub use conflict::ConflictResolver;
pub use consistency::ConsistencyChecker;
pub use crate::core::{EntityRecord, EntityType, FieldValue, MigrationError, Result};
pub use crypto::{AesGcmCipher, CipherPrimitive, EncryptionGateway, PassthroughCipher, ValueClass};
pub use facade::{MigrationOutcome, MigrationService};
pub use migrate::{CancelFlag, MigrationOrchestrator, TaskHandle};
pub use model::{
    ConflictResolution, ConflictStrategy, ConsistencyStatus, DataConsistencyReport,
    DataInconsistency, EntityRollbackResult, EntitySnapshot, InconsistencyType, MigrationBackup,
    MigrationResult, PersistenceOutcome, RollbackResult, Severity,
};
pub use registry::{EntityDescriptor, EntityRegistry};
pub use rollback::{RollbackEngine, RollbackPhase};
pub use store::{BackupStore, EntityStore, EntityStores, InMemoryBackupStore, InMemoryEntityStore};
pub use validate::{ValidationEngine, ValidationReport};

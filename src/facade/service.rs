use crate::audit::AuditSink;
use crate::config::MigrationConfig;
use crate::conflict::ConflictResolver;
use crate::consistency::ConsistencyChecker;
use crate::core::Result;
use crate::crypto::{CipherPrimitive, EncryptionGateway};
use crate::migrate::MigrationOrchestrator;
use crate::model::{MigrationResult, RollbackResult};
use crate::registry::EntityRegistry;
use crate::rollback::RollbackEngine;
use crate::store::{BackupStore, EntityStores, InMemoryBackupStore};
use crate::validate::ValidationEngine;
use serde_json::json;
use std::sync::Arc;

/// Outcome of the end-to-end `migrate_with_backup` flow.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub backup_id: String,
    pub migration: MigrationResult,
    /// Present when the migration had errors and a rollback ran.
    pub rollback: Option<RollbackResult>,
}

/// High-level entry point wiring the orchestration components against
/// one set of entity stores, one cipher primitive, and one audit sink.
pub struct MigrationService {
    config: MigrationConfig,
    stores: EntityStores,
    backup_store: Arc<dyn BackupStore>,
    gateway: EncryptionGateway,
    validation: Arc<ValidationEngine>,
    orchestrator: MigrationOrchestrator,
    rollback: RollbackEngine,
    resolver: ConflictResolver,
    checker: ConsistencyChecker,
    audit: Arc<dyn AuditSink>,
}

impl MigrationService {
    pub fn new(
        config: MigrationConfig,
        stores: EntityStores,
        primitive: Arc<dyn CipherPrimitive>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let backup_store: Arc<dyn BackupStore> =
            Arc::new(InMemoryBackupStore::new(stores.clone(), audit.clone()));
        Self::with_backup_store(config, stores, primitive, backup_store, audit)
    }

    /// Wire against an externally provided backup store implementation.
    pub fn with_backup_store(
        config: MigrationConfig,
        stores: EntityStores,
        primitive: Arc<dyn CipherPrimitive>,
        backup_store: Arc<dyn BackupStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let registry = Arc::new(EntityRegistry::new());
        let gateway = EncryptionGateway::new(primitive);
        let validation = Arc::new(ValidationEngine::new(registry.clone(), config.clone()));

        let orchestrator = MigrationOrchestrator::new(
            stores.clone(),
            registry.clone(),
            gateway.clone(),
            validation.clone(),
            audit.clone(),
        );
        let rollback = RollbackEngine::new(stores.clone(), backup_store.clone(), audit.clone());
        let resolver = ConflictResolver::new(stores.clone(), registry.clone(), audit.clone());
        let checker = ConsistencyChecker::new(
            stores.clone(),
            registry,
            config.clone(),
            audit.clone(),
        );

        Self {
            config,
            stores,
            backup_store,
            gateway,
            validation,
            orchestrator,
            rollback,
            resolver,
            checker,
            audit,
        }
    }

    /// Create a backup, migrate every tracked collection, and roll back
    /// from that backup if the migration reported any errors.
    pub async fn migrate_with_backup(&self) -> Result<MigrationOutcome> {
        let backup_id = self.backup_store.create_backup().await?;
        let migration = self.orchestrator.migrate_all().await?;

        let rollback = if migration.success {
            None
        } else {
            tracing::warn!(
                backup_id,
                errors = migration.total_errors,
                "migration reported errors; rolling back"
            );
            Some(self.rollback.perform_full_rollback(&backup_id).await?)
        };

        self.audit.log_event(
            "migration_flow_completed",
            &backup_id,
            json!({
                "migrated": migration.total_processed,
                "errors": migration.total_errors,
                "rolled_back": rollback.is_some(),
            }),
        );
        Ok(MigrationOutcome {
            backup_id,
            migration,
            rollback,
        })
    }

    /// Apply the configured retention policy to stored backups.
    pub async fn apply_backup_retention(&self) -> Result<Vec<String>> {
        self.backup_store
            .cleanup_old_backups(self.config.backup_retention)
            .await
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn stores(&self) -> &EntityStores {
        &self.stores
    }

    pub fn backup_store(&self) -> &Arc<dyn BackupStore> {
        &self.backup_store
    }

    pub fn gateway(&self) -> &EncryptionGateway {
        &self.gateway
    }

    pub fn validation(&self) -> &Arc<ValidationEngine> {
        &self.validation
    }

    pub fn orchestrator(&self) -> &MigrationOrchestrator {
        &self.orchestrator
    }

    pub fn rollback_engine(&self) -> &RollbackEngine {
        &self.rollback
    }

    pub fn conflict_resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn consistency_checker(&self) -> &ConsistencyChecker {
        &self.checker
    }
}

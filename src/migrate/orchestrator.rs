use crate::audit::AuditSink;
use crate::core::{EntityRecord, EntityType, FieldValue, MigrationError, Result};
use crate::crypto::{EncryptionGateway, ValueClass};
use crate::migrate::task::{CancelFlag, TaskHandle};
use crate::model::MigrationResult;
use crate::registry::EntityRegistry;
use crate::store::{EntityStore, EntityStores};
use crate::validate::ValidationEngine;
use serde_json::json;
use std::sync::Arc;

/// Drives batch encryption across entity collections.
///
/// One failed record never aborts the batch: the error is counted,
/// audited, and processing continues with the next record. Entity types
/// are processed in the declared order so partial results are
/// reproducible; records within a type follow collection-iteration
/// order.
#[derive(Clone)]
pub struct MigrationOrchestrator {
    stores: EntityStores,
    registry: Arc<EntityRegistry>,
    gateway: EncryptionGateway,
    validation: Arc<ValidationEngine>,
    audit: Arc<dyn AuditSink>,
}

impl MigrationOrchestrator {
    pub fn new(
        stores: EntityStores,
        registry: Arc<EntityRegistry>,
        gateway: EncryptionGateway,
        validation: Arc<ValidationEngine>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            stores,
            registry,
            gateway,
            validation,
            audit,
        }
    }

    /// Migrate a single entity collection.
    pub async fn migrate_collection(&self, entity_type: EntityType) -> Result<MigrationResult> {
        let result = self
            .migrate_collection_inner(entity_type, &CancelFlag::new())
            .await?;
        Ok(result.finalize())
    }

    /// Migrate all tracked collections in the declared order.
    pub async fn migrate_all(&self) -> Result<MigrationResult> {
        self.migrate_all_inner(CancelFlag::new()).await
    }

    /// Submit the full migration as a cancellable background task.
    pub fn spawn_migrate_all(&self) -> TaskHandle<MigrationResult> {
        let flag = CancelFlag::new();
        let orchestrator = self.clone();
        let task_flag = flag.clone();
        let join = tokio::spawn(async move { orchestrator.migrate_all_inner(task_flag).await });
        TaskHandle::new(flag, join)
    }

    async fn migrate_all_inner(&self, cancel: CancelFlag) -> Result<MigrationResult> {
        let mut aggregate = MigrationResult::default();
        for entity_type in self.stores.tracked_types() {
            if cancel.is_cancelled() {
                aggregate.cancelled = true;
                break;
            }
            let result = self.migrate_collection_inner(entity_type, &cancel).await?;
            aggregate.merge(result);
        }
        let aggregate = aggregate.finalize();

        self.audit.log_event(
            "migration_run_completed",
            "all",
            json!({
                "success": aggregate.success,
                "total_processed": aggregate.total_processed,
                "total_errors": aggregate.total_errors,
                "cancelled": aggregate.cancelled,
            }),
        );
        Ok(aggregate)
    }

    async fn migrate_collection_inner(
        &self,
        entity_type: EntityType,
        cancel: &CancelFlag,
    ) -> Result<MigrationResult> {
        let descriptor = self
            .registry
            .descriptor(entity_type)
            .map_err(|e| self.fatal(entity_type, e))?;
        let store = self
            .stores
            .store(entity_type)
            .map_err(|e| self.fatal(entity_type, e))?;
        let records = store
            .fetch_all()
            .await
            .map_err(|e| self.fatal(entity_type, e))?;

        let mut result = MigrationResult::default();
        for record in records {
            if cancel.is_cancelled() {
                result.cancelled = true;
                self.audit.log_event(
                    "migration_cancelled",
                    entity_type.name(),
                    json!({ "processed_so_far": result.total_processed }),
                );
                break;
            }

            match self.migrate_record(entity_type, descriptor, &record).await {
                Ok(encrypted_fields) => {
                    result.record_success(entity_type);
                    self.audit.log_event(
                        "record_migrated",
                        &record.id,
                        json!({
                            "entity_type": entity_type.name(),
                            "fields_encrypted": encrypted_fields,
                        }),
                    );
                }
                Err(err) => {
                    let message = err.to_string();
                    self.audit.log_event(
                        "record_migration_failed",
                        &record.id,
                        json!({
                            "entity_type": entity_type.name(),
                            "error": message,
                        }),
                    );
                    tracing::warn!(
                        entity_type = entity_type.name(),
                        record_id = %record.id,
                        error = %message,
                        "record migration failed"
                    );
                    result.record_error(entity_type, &record.id, message);
                }
            }
        }

        self.audit.log_event(
            "migration_batch_completed",
            entity_type.name(),
            json!({
                "processed": result.total_processed,
                "errors": result.total_errors,
            }),
        );
        Ok(result)
    }

    /// Fatal batch setup errors are audited before they propagate;
    /// per-record failures are audited where they are counted.
    fn fatal(&self, entity_type: EntityType, err: MigrationError) -> MigrationError {
        self.audit.log_event(
            "migration_fatal",
            entity_type.name(),
            json!({ "error": err.to_string() }),
        );
        tracing::error!(
            entity_type = entity_type.name(),
            error = %err,
            "migration batch aborted"
        );
        err
    }

    /// Encrypt the plaintext sensitive fields of one record. Returns
    /// the number of fields encrypted; zero means the record was
    /// already fully migrated and nothing was written.
    async fn migrate_record(
        &self,
        entity_type: EntityType,
        descriptor: &crate::registry::EntityDescriptor,
        record: &EntityRecord,
    ) -> Result<usize> {
        let mut pending = Vec::new();
        let mut sensitive_present = 0usize;
        for field in descriptor.sensitive_fields {
            let Some(text) = record.text(field) else {
                continue;
            };
            sensitive_present += 1;
            if self.gateway.classify(text) == ValueClass::Plaintext {
                pending.push((*field, text.to_string()));
            }
        }

        // Already fully ciphertext (or nothing sensitive): re-running
        // the migration is a no-op for this record.
        if pending.is_empty() {
            return Ok(0);
        }

        // A fully plaintext record has not been through migration yet;
        // validate it before writing ciphertext over its fields. A
        // partially encrypted record would fail format rules on its
        // ciphertext fields, so validation only applies to the former.
        if pending.len() == sensitive_present {
            let report = self.validation.validate(entity_type, record)?;
            if !report.valid {
                return Err(MigrationError::Validation(report.errors));
            }
        }

        let mut migrated = record.clone();
        for (field, plaintext) in &pending {
            let ciphertext = self.gateway.encrypt_field(plaintext)?;
            migrated.set(*field, FieldValue::Text(ciphertext));
        }

        if !self
            .validation
            .validate_integrity(entity_type, record, &migrated)?
        {
            return Err(MigrationError::Validation(vec![
                "identity fields changed during encryption".to_string(),
            ]));
        }

        let store = self.stores.store(entity_type)?;
        store.save(migrated).await?;
        Ok(pending.len())
    }
}

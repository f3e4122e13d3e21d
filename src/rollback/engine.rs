use crate::audit::AuditSink;
use crate::core::{EntityType, MigrationError, Result};
use crate::migrate::task::{CancelFlag, TaskHandle};
use crate::model::{EntityRollbackResult, MigrationBackup, RollbackResult};
use crate::store::{BackupStore, EntityStore, EntityStores};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Phase of one rollback attempt:
/// `Started -> Restoring(type)* -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackPhase {
    Started,
    Restoring(EntityType),
    Succeeded,
    Failed,
}

impl RollbackPhase {
    pub fn describe(&self) -> String {
        match self {
            Self::Started => "started".to_string(),
            Self::Restoring(ty) => format!("restoring:{}", ty),
            Self::Succeeded => "succeeded".to_string(),
            Self::Failed => "failed".to_string(),
        }
    }
}

/// Restores entity collections from a backup snapshot.
///
/// Restored records are re-inserted exactly as captured at backup time:
/// no decrypt pass and no fresh re-encryption. A pre-migration backup
/// therefore restores plaintext, a post-migration backup restores
/// ciphertext, and the restored state never depends on the active key.
///
/// Two rollbacks against different backup ids may run concurrently.
/// Two rollbacks against the same id are not safe to run concurrently:
/// the per-type delete-then-reinsert window is not transactionally
/// isolated, so a concurrent reader could observe an empty collection
/// mid-restore.
#[derive(Clone)]
pub struct RollbackEngine {
    stores: EntityStores,
    backup_store: Arc<dyn BackupStore>,
    audit: Arc<dyn AuditSink>,
}

impl RollbackEngine {
    pub fn new(
        stores: EntityStores,
        backup_store: Arc<dyn BackupStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            stores,
            backup_store,
            audit,
        }
    }

    /// Restore every entity type in the backup, in the declared order.
    /// A missing backup is fatal and reported before any write;
    /// per-record restore failures are counted but not fatal.
    pub async fn perform_full_rollback(&self, backup_id: &str) -> Result<RollbackResult> {
        let backup = self.load_backup(backup_id).await?;
        let types: Vec<EntityType> = backup.snapshots.iter().map(|s| s.entity_type).collect();
        Ok(self
            .restore_types(&backup, &types, &CancelFlag::new())
            .await)
    }

    /// Restore a single entity type from the backup.
    pub async fn perform_partial_rollback(
        &self,
        backup_id: &str,
        entity_type: EntityType,
    ) -> Result<RollbackResult> {
        let backup = self.load_backup(backup_id).await?;
        if backup.snapshot_for(entity_type).is_none() {
            let message = format!("backup has no snapshot for '{}'", entity_type);
            self.audit.log_event(
                "rollback_failed",
                backup_id,
                json!({ "error": message }),
            );
            return Err(MigrationError::RollbackFatalFailure(
                backup_id.to_string(),
                message,
            ));
        }
        Ok(self
            .restore_types(&backup, &[entity_type], &CancelFlag::new())
            .await)
    }

    /// Submit a full rollback as a cancellable background task.
    pub fn spawn_full_rollback(&self, backup_id: &str) -> TaskHandle<RollbackResult> {
        let flag = CancelFlag::new();
        let engine = self.clone();
        let backup_id = backup_id.to_string();
        let task_flag = flag.clone();
        let join = tokio::spawn(async move {
            let backup = engine.load_backup(&backup_id).await?;
            let types: Vec<EntityType> = backup.snapshots.iter().map(|s| s.entity_type).collect();
            Ok(engine.restore_types(&backup, &types, &task_flag).await)
        });
        TaskHandle::new(flag, join)
    }

    async fn load_backup(&self, backup_id: &str) -> Result<MigrationBackup> {
        self.audit
            .log_event("rollback_started", backup_id, json!({}));
        match self.backup_store.get_backup(backup_id).await {
            Ok(backup) => Ok(backup),
            Err(err) => {
                self.audit.log_event(
                    "rollback_failed",
                    backup_id,
                    json!({ "error": err.to_string() }),
                );
                tracing::error!(backup_id, error = %err, "rollback aborted before any write");
                Err(err)
            }
        }
    }

    async fn restore_types(
        &self,
        backup: &MigrationBackup,
        types: &[EntityType],
        cancel: &CancelFlag,
    ) -> RollbackResult {
        let start_time = Utc::now();
        let mut phase = RollbackPhase::Started;
        let mut per_type = BTreeMap::new();
        let mut cancelled = false;

        for snapshot in &backup.snapshots {
            if !types.contains(&snapshot.entity_type) {
                continue;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            phase = RollbackPhase::Restoring(snapshot.entity_type);
            tracing::debug!(
                backup_id = %backup.backup_id,
                entity_type = snapshot.entity_type.name(),
                "restoring entity type"
            );

            let mut entity_result = EntityRollbackResult::new(snapshot.records.len());
            match self.stores.store(snapshot.entity_type) {
                Ok(store) => {
                    if let Err(err) = store.delete_all().await {
                        entity_result.error_records = snapshot.records.len();
                        self.audit.log_event(
                            "rollback_type_failed",
                            &backup.backup_id,
                            json!({
                                "entity_type": snapshot.entity_type.name(),
                                "error": err.to_string(),
                            }),
                        );
                        per_type.insert(snapshot.entity_type, entity_result.finalize());
                        continue;
                    }

                    for record in &snapshot.records {
                        if cancel.is_cancelled() {
                            cancelled = true;
                            break;
                        }
                        match store.save(record.clone()).await {
                            Ok(()) => entity_result.restored_records += 1,
                            Err(err) => {
                                entity_result.error_records += 1;
                                tracing::warn!(
                                    backup_id = %backup.backup_id,
                                    entity_type = snapshot.entity_type.name(),
                                    record_id = %record.id,
                                    error = %err,
                                    "record restore failed"
                                );
                            }
                        }
                    }
                }
                Err(err) => {
                    entity_result.error_records = snapshot.records.len();
                    tracing::error!(
                        backup_id = %backup.backup_id,
                        entity_type = snapshot.entity_type.name(),
                        error = %err,
                        "no store for entity type"
                    );
                }
            }
            per_type.insert(snapshot.entity_type, entity_result.finalize());
        }

        let success = !cancelled && per_type.values().all(|r| r.success);
        if cancelled {
            tracing::info!(
                backup_id = %backup.backup_id,
                phase = %phase.describe(),
                "rollback cancelled"
            );
        }
        phase = if success {
            RollbackPhase::Succeeded
        } else {
            RollbackPhase::Failed
        };

        let result = RollbackResult {
            backup_id: backup.backup_id.clone(),
            start_time,
            end_time: Utc::now(),
            success,
            error_message: if cancelled {
                Some("rollback cancelled between records".to_string())
            } else if success {
                None
            } else {
                Some("one or more entity types restored with errors".to_string())
            },
            per_type,
        };

        self.audit.log_event(
            if result.success {
                "rollback_completed"
            } else {
                "rollback_completed_with_errors"
            },
            &backup.backup_id,
            json!({
                "phase": phase.describe(),
                "restored": result.total_restored(),
                "errors": result.total_errors(),
                "cancelled": cancelled,
            }),
        );
        result
    }
}

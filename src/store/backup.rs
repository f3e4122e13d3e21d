use crate::audit::AuditSink;
use crate::core::{MigrationError, Result};
use crate::model::{EntitySnapshot, MigrationBackup};
use crate::store::entity::{EntityStore, EntityStores};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Format version for exported backup envelopes. Bump on any change to
/// the `MigrationBackup` shape; import rejects unknown versions.
const BACKUP_FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct BackupEnvelope {
    version: u16,
    backup: MigrationBackup,
}

/// Keyed snapshot store. Backup identifiers are generated once, never
/// reused, and a stored backup is never mutated; deletion happens only
/// through `delete_backup` / `cleanup_old_backups`.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Snapshot the full current state of all tracked collections into
    /// one backup and return its identifier.
    async fn create_backup(&self) -> Result<String>;
    async fn get_backup(&self, backup_id: &str) -> Result<MigrationBackup>;
    /// Returns whether the backup existed.
    async fn delete_backup(&self, backup_id: &str) -> Result<bool>;
    /// Identifiers sorted oldest first (ids embed the creation stamp).
    async fn list_backups(&self) -> Vec<String>;
    /// Delete the oldest backups beyond `keep_count`; returns the ids
    /// that were removed.
    async fn cleanup_old_backups(&self, keep_count: usize) -> Result<Vec<String>>;
    /// Versioned binary export of one backup.
    async fn export_backup(&self, backup_id: &str) -> Result<Vec<u8>>;
    /// Import a previously exported backup; rejects unknown format
    /// versions and duplicate identifiers.
    async fn import_backup(&self, bytes: &[u8]) -> Result<String>;
}

/// In-memory implementation: a concurrency-safe map supporting
/// concurrent reads and independent-key writes.
pub struct InMemoryBackupStore {
    backups: RwLock<HashMap<String, MigrationBackup>>,
    stores: EntityStores,
    audit: Arc<dyn AuditSink>,
}

impl InMemoryBackupStore {
    pub fn new(stores: EntityStores, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            backups: RwLock::new(HashMap::new()),
            stores,
            audit,
        }
    }

    pub async fn backup_count(&self) -> usize {
        self.backups.read().await.len()
    }
}

#[async_trait]
impl BackupStore for InMemoryBackupStore {
    async fn create_backup(&self) -> Result<String> {
        let mut snapshots = Vec::new();
        for entity_type in self.stores.tracked_types() {
            let store = self.stores.store(entity_type)?;
            let records = store.fetch_all().await?;
            snapshots.push(EntitySnapshot {
                entity_type,
                records,
            });
        }

        let backup = MigrationBackup::new(snapshots);
        let backup_id = backup.backup_id.clone();
        let total = backup.total_records();

        self.backups
            .write()
            .await
            .insert(backup_id.clone(), backup);

        self.audit.log_event(
            "backup_created",
            &backup_id,
            json!({ "total_records": total }),
        );
        tracing::info!(backup_id, total_records = total, "backup created");
        Ok(backup_id)
    }

    async fn get_backup(&self, backup_id: &str) -> Result<MigrationBackup> {
        self.backups
            .read()
            .await
            .get(backup_id)
            .cloned()
            .ok_or_else(|| MigrationError::BackupNotFound(backup_id.to_string()))
    }

    async fn delete_backup(&self, backup_id: &str) -> Result<bool> {
        let removed = self.backups.write().await.remove(backup_id).is_some();
        if removed {
            self.audit
                .log_event("backup_deleted", backup_id, json!({}));
        }
        Ok(removed)
    }

    async fn list_backups(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backups.read().await.keys().cloned().collect();
        // The embedded timestamp makes lexicographic order chronological.
        ids.sort();
        ids
    }

    async fn cleanup_old_backups(&self, keep_count: usize) -> Result<Vec<String>> {
        let ids = self.list_backups().await;
        if ids.len() <= keep_count {
            return Ok(Vec::new());
        }

        let excess = ids.len() - keep_count;
        let mut removed = Vec::with_capacity(excess);
        for backup_id in ids.into_iter().take(excess) {
            if self.delete_backup(&backup_id).await? {
                removed.push(backup_id);
            }
        }
        Ok(removed)
    }

    async fn export_backup(&self, backup_id: &str) -> Result<Vec<u8>> {
        let backup = self.get_backup(backup_id).await?;
        let envelope = BackupEnvelope {
            version: BACKUP_FORMAT_VERSION,
            backup,
        };
        rmp_serde::to_vec(&envelope)
            .map_err(|e| MigrationError::Serialization(format!("backup export: {}", e)))
    }

    async fn import_backup(&self, bytes: &[u8]) -> Result<String> {
        let envelope: BackupEnvelope = rmp_serde::from_slice(bytes)
            .map_err(|e| MigrationError::Serialization(format!("backup import: {}", e)))?;

        if envelope.version != BACKUP_FORMAT_VERSION {
            return Err(MigrationError::Serialization(format!(
                "unsupported backup format version {}",
                envelope.version
            )));
        }

        let backup_id = envelope.backup.backup_id.clone();
        let mut backups = self.backups.write().await;
        if backups.contains_key(&backup_id) {
            return Err(MigrationError::Serialization(format!(
                "backup '{}' already present",
                backup_id
            )));
        }
        backups.insert(backup_id.clone(), envelope.backup);
        drop(backups);

        self.audit
            .log_event("backup_imported", &backup_id, json!({}));
        Ok(backup_id)
    }
}

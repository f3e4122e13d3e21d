use crate::core::{EntityRecord, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of one entity collection inside a backup, in
/// collection-iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_type: EntityType,
    pub records: Vec<EntityRecord>,
}

/// A full, point-in-time copy of all tracked entity collections.
///
/// The identifier embeds the creation timestamp, so lexicographic order
/// of ids is chronological order. Once created a backup is immutable;
/// rollback reads it, and only retention cleanup deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationBackup {
    pub backup_id: String,
    pub created_at: DateTime<Utc>,
    /// One snapshot per tracked type, in the declared processing order.
    pub snapshots: Vec<EntitySnapshot>,
}

impl MigrationBackup {
    pub fn new(snapshots: Vec<EntitySnapshot>) -> Self {
        let created_at = Utc::now();
        Self {
            backup_id: generate_backup_id(created_at),
            created_at,
            snapshots,
        }
    }

    pub fn snapshot_for(&self, entity_type: EntityType) -> Option<&EntitySnapshot> {
        self.snapshots.iter().find(|s| s.entity_type == entity_type)
    }

    pub fn total_records(&self) -> usize {
        self.snapshots.iter().map(|s| s.records.len()).sum()
    }
}

/// `backup_<UTC millis timestamp>_<uuid fragment>`; sortable by age.
fn generate_backup_id(created_at: DateTime<Utc>) -> String {
    let stamp = created_at.format("%Y%m%d%H%M%S%3f");
    let fragment = Uuid::new_v4().simple().to_string();
    format!("backup_{}_{}", stamp, &fragment[..8])
}

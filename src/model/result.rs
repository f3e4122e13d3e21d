use crate::core::{EntityType, MigrationError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate outcome of one migration batch. Partial success is always
/// explicit via the counters; expected per-record failures never
/// surface as errors alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    pub total_processed: usize,
    pub total_errors: usize,
    pub error_messages: Vec<String>,
    pub per_entity_counts: BTreeMap<EntityType, usize>,
    /// True when the run was cancelled between records; counters cover
    /// the records committed before the abort.
    pub cancelled: bool,
}

impl MigrationResult {
    pub fn record_success(&mut self, entity_type: EntityType) {
        self.total_processed += 1;
        *self.per_entity_counts.entry(entity_type).or_insert(0) += 1;
    }

    pub fn record_error(&mut self, entity_type: EntityType, record_id: &str, message: String) {
        self.total_processed += 1;
        self.total_errors += 1;
        *self.per_entity_counts.entry(entity_type).or_insert(0) += 1;
        self.error_messages
            .push(format!("{}/{}: {}", entity_type, record_id, message));
    }

    pub fn finalize(mut self) -> Self {
        self.success = self.total_errors == 0 && !self.cancelled;
        self
    }

    pub fn merge(&mut self, other: MigrationResult) {
        self.total_processed += other.total_processed;
        self.total_errors += other.total_errors;
        self.error_messages.extend(other.error_messages);
        for (ty, count) in other.per_entity_counts {
            *self.per_entity_counts.entry(ty).or_insert(0) += count;
        }
        self.cancelled |= other.cancelled;
    }
}

/// Outcome of restoring one entity type from a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRollbackResult {
    pub total_records: usize,
    pub restored_records: usize,
    pub error_records: usize,
    pub success: bool,
}

impl EntityRollbackResult {
    pub fn new(total_records: usize) -> Self {
        Self {
            total_records,
            restored_records: 0,
            error_records: 0,
            success: false,
        }
    }

    pub fn finalize(mut self) -> Self {
        self.success = self.error_records == 0;
        self
    }
}

/// Write-once outcome of one rollback attempt. Overall `success` is
/// true only when every entity type restored with zero errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub backup_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub per_type: BTreeMap<EntityType, EntityRollbackResult>,
}

impl RollbackResult {
    pub fn total_errors(&self) -> usize {
        self.per_type.values().map(|r| r.error_records).sum()
    }

    pub fn total_restored(&self) -> usize {
        self.per_type.values().map(|r| r.restored_records).sum()
    }

    /// Convert an unsuccessful result into the matching error variant
    /// for callers that prefer `?` over inspecting the counters.
    pub fn ok(self) -> Result<RollbackResult> {
        if self.success {
            Ok(self)
        } else {
            Err(MigrationError::RollbackPartialFailure {
                backup_id: self.backup_id.clone(),
                error_count: self.total_errors(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_result_counters() {
        let mut result = MigrationResult::default();
        result.record_success(EntityType::Employee);
        result.record_success(EntityType::Invoice);
        result.record_error(EntityType::Invoice, "i-9", "boom".to_string());
        let result = result.finalize();

        assert!(!result.success);
        assert_eq!(result.total_processed, 3);
        assert_eq!(result.total_errors, 1);
        assert_eq!(result.per_entity_counts[&EntityType::Invoice], 2);
        assert_eq!(result.error_messages, vec!["invoice/i-9: boom"]);
    }

    #[test]
    fn test_rollback_result_ok_maps_partial_failure() {
        let mut per_type = BTreeMap::new();
        per_type.insert(
            EntityType::Payroll,
            EntityRollbackResult {
                total_records: 2,
                restored_records: 1,
                error_records: 1,
                success: false,
            },
        );
        let result = RollbackResult {
            backup_id: "backup_x".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            success: false,
            error_message: None,
            per_type,
        };

        match result.ok() {
            Err(MigrationError::RollbackPartialFailure { error_count, .. }) => {
                assert_eq!(error_count, 1)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}

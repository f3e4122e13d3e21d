use crate::audit::AuditSink;
use crate::core::{EntityRecord, EntityType, FieldValue, MigrationError, Result};
use crate::model::{ConflictResolution, ConflictStrategy, PersistenceOutcome};
use crate::registry::EntityRegistry;
use crate::store::{EntityStore, EntityStores};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

type FieldMap = BTreeMap<String, FieldValue>;

/// Merges two divergent representations of one entity using a
/// selectable strategy, applies the outcome to the live record, and
/// records the resolution for audit whether or not persistence
/// succeeded.
#[derive(Clone)]
pub struct ConflictResolver {
    stores: EntityStores,
    registry: Arc<EntityRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl ConflictResolver {
    pub fn new(
        stores: EntityStores,
        registry: Arc<EntityRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            stores,
            registry,
            audit,
        }
    }

    pub async fn resolve(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        strategy: ConflictStrategy,
        frontend: FieldMap,
        backend: FieldMap,
        resolved_by: &str,
    ) -> Result<ConflictResolution> {
        let descriptor = self.registry.descriptor(entity_type)?;

        // Both snapshots must fit the declared schema before anything
        // is computed or applied.
        let mut schema_errors = Vec::new();
        for (side, snapshot) in [("frontend", &frontend), ("backend", &backend)] {
            for field in snapshot.keys() {
                if !descriptor.is_known(field) {
                    schema_errors.push(format!(
                        "{} snapshot has undeclared field '{}'",
                        side, field
                    ));
                }
            }
        }
        if !schema_errors.is_empty() {
            let err = MigrationError::Validation(schema_errors);
            self.audit.log_event(
                "conflict_rejected",
                entity_id,
                json!({
                    "entity_type": entity_type.name(),
                    "strategy": strategy.name(),
                    "error": err.to_string(),
                }),
            );
            return Err(err);
        }

        let (resolved_data, reason) =
            compute_resolution(descriptor, strategy, &frontend, &backend);

        let persistence = match self.apply(entity_type, entity_id, &resolved_data).await {
            Ok(()) => PersistenceOutcome::Applied,
            Err(err) => PersistenceOutcome::Failed(err.to_string()),
        };

        let resolution = ConflictResolution {
            conflict_id: ConflictResolution::generate_conflict_id(),
            entity_type,
            entity_id: entity_id.to_string(),
            strategy,
            resolved_data,
            resolved_by: resolved_by.to_string(),
            resolved_at: Utc::now(),
            original_frontend_data: frontend,
            original_backend_data: backend,
            reason,
            persistence,
        };

        // Audited regardless of whether the apply step succeeded; the
        // caller inspects `persistence` to decide what to do next.
        self.audit.log_event(
            "conflict_resolved",
            &resolution.conflict_id,
            json!({
                "entity_type": entity_type.name(),
                "entity_id": entity_id,
                "strategy": strategy.name(),
                "resolved_by": resolved_by,
                "persisted": resolution.persistence.is_applied(),
            }),
        );
        Ok(resolution)
    }

    async fn apply(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        resolved: &FieldMap,
    ) -> Result<()> {
        let store = self.stores.store(entity_type)?;
        let record = EntityRecord {
            id: entity_id.to_string(),
            fields: resolved.clone(),
        };
        store
            .save(record)
            .await
            .map_err(|e| MigrationError::ConflictApplication(e.to_string()))
    }
}

fn compute_resolution(
    descriptor: &crate::registry::EntityDescriptor,
    strategy: ConflictStrategy,
    frontend: &FieldMap,
    backend: &FieldMap,
) -> (FieldMap, String) {
    match strategy {
        ConflictStrategy::FrontendWins => (
            frontend.clone(),
            "frontend snapshot taken verbatim".to_string(),
        ),
        ConflictStrategy::BackendWins => (
            backend.clone(),
            "backend snapshot taken verbatim (financially authoritative)".to_string(),
        ),
        ConflictStrategy::Merge => {
            let mut resolved = backend.clone();
            let mut overlaid = 0usize;
            for (field, value) in frontend {
                if !value.is_null() {
                    resolved.insert(field.clone(), value.clone());
                    overlaid += 1;
                }
            }
            (
                resolved,
                format!("backend base with {} non-null frontend field(s) overlaid", overlaid),
            )
        }
        ConflictStrategy::LatestTimestampWins => {
            match (updated_at(frontend), updated_at(backend)) {
                (Some(f), Some(b)) if f > b => (
                    frontend.clone(),
                    "frontend updated_at is newer".to_string(),
                ),
                (Some(_), Some(_)) => (
                    backend.clone(),
                    "backend updated_at is newer or equal".to_string(),
                ),
                _ => (
                    backend.clone(),
                    "updated_at missing on at least one side; backend wins".to_string(),
                ),
            }
        }
        ConflictStrategy::CustomRule => {
            // Monetary totals stay backend; free-text fields take the
            // frontend copy when one is present.
            let mut resolved = backend.clone();
            let mut taken = Vec::new();
            for field in descriptor.freetext_fields {
                if let Some(value) = frontend.get(*field) {
                    if !value.is_null() {
                        resolved.insert((*field).to_string(), value.clone());
                        taken.push(*field);
                    }
                }
            }
            (
                resolved,
                format!(
                    "custom rule: monetary fields backend; frontend free-text taken for [{}]",
                    taken.join(", ")
                ),
            )
        }
        ConflictStrategy::Manual => (
            backend.clone(),
            "manual strategy defaults to backend pending human action".to_string(),
        ),
    }
}

fn updated_at(snapshot: &FieldMap) -> Option<DateTime<Utc>> {
    snapshot
        .get("updated_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> (FieldMap, FieldMap) {
        let mut frontend = FieldMap::new();
        frontend.insert("total_amount".into(), FieldValue::Float(100.0));
        frontend.insert("description".into(), FieldValue::Text("edited".into()));
        let mut backend = FieldMap::new();
        backend.insert("total_amount".into(), FieldValue::Float(118.0));
        backend.insert("description".into(), FieldValue::Null);
        (frontend, backend)
    }

    #[test]
    fn test_custom_rule_splits_by_field_class() {
        let registry = EntityRegistry::new();
        let descriptor = registry.descriptor(EntityType::Invoice).unwrap();
        let (frontend, backend) = maps();

        let (resolved, _) =
            compute_resolution(descriptor, ConflictStrategy::CustomRule, &frontend, &backend);
        assert_eq!(resolved["total_amount"], FieldValue::Float(118.0));
        assert_eq!(resolved["description"], FieldValue::Text("edited".into()));
    }

    #[test]
    fn test_merge_skips_null_frontend_fields() {
        let registry = EntityRegistry::new();
        let descriptor = registry.descriptor(EntityType::Invoice).unwrap();
        let mut frontend = FieldMap::new();
        frontend.insert("description".into(), FieldValue::Null);
        frontend.insert("customer_name".into(), FieldValue::Text("ACME".into()));
        let mut backend = FieldMap::new();
        backend.insert("description".into(), FieldValue::Text("kept".into()));

        let (resolved, _) =
            compute_resolution(descriptor, ConflictStrategy::Merge, &frontend, &backend);
        assert_eq!(resolved["description"], FieldValue::Text("kept".into()));
        assert_eq!(resolved["customer_name"], FieldValue::Text("ACME".into()));
    }

    #[test]
    fn test_latest_timestamp_falls_back_to_backend() {
        let registry = EntityRegistry::new();
        let descriptor = registry.descriptor(EntityType::Invoice).unwrap();
        let (frontend, backend) = maps();
        let (resolved, reason) = compute_resolution(
            descriptor,
            ConflictStrategy::LatestTimestampWins,
            &frontend,
            &backend,
        );
        assert_eq!(resolved["total_amount"], FieldValue::Float(118.0));
        assert!(reason.contains("missing"));
    }
}

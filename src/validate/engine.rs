use crate::config::MigrationConfig;
use crate::core::{EntityRecord, EntityType, Result};
use crate::registry::{EntityRegistry, ValidationRule};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of validating one record. All violations are collected, not
/// short-circuited, so one report lists every problem for the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Interprets the registry's per-type rule sets: field presence, field
/// formats, and domain rules such as monetary floors and cross-field
/// arithmetic within a fixed absolute tolerance.
pub struct ValidationEngine {
    registry: Arc<EntityRegistry>,
    config: MigrationConfig,
}

impl ValidationEngine {
    pub fn new(registry: Arc<EntityRegistry>, config: MigrationConfig) -> Self {
        Self { registry, config }
    }

    pub fn validate(&self, entity_type: EntityType, record: &EntityRecord) -> Result<ValidationReport> {
        let descriptor = self.registry.descriptor(entity_type)?;
        let mut errors = Vec::new();

        for rule in &descriptor.validation_rules {
            self.apply_rule(rule, record, &mut errors);
        }

        Ok(ValidationReport::from_errors(errors))
    }

    fn apply_rule(&self, rule: &ValidationRule, record: &EntityRecord, errors: &mut Vec<String>) {
        match rule {
            ValidationRule::Required(field) => {
                if !record.has(field) {
                    errors.push(format!("field '{}' is required", field));
                }
            }
            ValidationRule::Format { field, format } => {
                if let Some(value) = record.get(field) {
                    if value.is_null() {
                        return;
                    }
                    match value.as_str() {
                        Some(text) => {
                            if !format.matches(text) {
                                errors.push(format!(
                                    "field '{}' is not a valid {}",
                                    field,
                                    format.describe()
                                ));
                            }
                        }
                        None => errors.push(format!("field '{}' must be text", field)),
                    }
                }
            }
            ValidationRule::NonNegative(field) => {
                if let Some(value) = record.get(field) {
                    if value.is_null() {
                        return;
                    }
                    match value.as_f64() {
                        Some(amount) if amount < 0.0 => {
                            errors.push(format!("field '{}' must not be negative", field))
                        }
                        Some(_) => {}
                        None => errors.push(format!("field '{}' must be numeric", field)),
                    }
                }
            }
            ValidationRule::MonetaryFloor(field) => {
                if let Some(amount) = record.number(field) {
                    if amount < self.config.monetary_floor {
                        errors.push(format!(
                            "field '{}' is below the monetary floor of {}",
                            field, self.config.monetary_floor
                        ));
                    }
                }
            }
            ValidationRule::SumMatches { total, parts } => {
                let Some(total_value) = record.number(total) else {
                    return;
                };
                let mut sum = 0.0;
                for part in *parts {
                    match record.number(part) {
                        Some(v) => sum += v,
                        // Presence is the Required rules' concern.
                        None => return,
                    }
                }
                if (total_value - sum).abs() > self.config.arithmetic_tolerance {
                    errors.push(format!(
                        "field '{}' ({}) does not equal {} ({})",
                        total,
                        total_value,
                        parts.join(" + "),
                        sum
                    ));
                }
            }
        }
    }

    /// Compare the identity-bearing subset of fields between two
    /// snapshots of the same logical record, confirming a migration or
    /// rollback did not corrupt them. Sensitive fields are excluded by
    /// construction (the registry keeps the two sets disjoint).
    pub fn validate_integrity(
        &self,
        entity_type: EntityType,
        before: &EntityRecord,
        after: &EntityRecord,
    ) -> Result<bool> {
        let descriptor = self.registry.descriptor(entity_type)?;

        if before.id != after.id {
            return Ok(false);
        }
        for field in descriptor.identity_fields {
            if before.get(field) != after.get(field) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

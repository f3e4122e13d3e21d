use crate::audit::AuditSink;
use crate::config::MigrationConfig;
use crate::core::{EntityRecord, EntityType, MigrationError, Result};
use crate::model::{
    ConsistencyMetrics, ConsistencyStatus, DataConsistencyReport, DataInconsistency, EntityCheck,
    InconsistencyType, Severity,
};
use crate::registry::{ConsistencyRule, EntityRegistry};
use crate::store::{EntityStore, EntityStores};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Scans entity collections for invariant violations, classifies their
/// severity, and produces a scored report with remediation
/// recommendations. Finding inconsistencies is the expected outcome,
/// not an error; `ConsistencyCheck` errors mean the scan itself could
/// not complete.
#[derive(Clone)]
pub struct ConsistencyChecker {
    stores: EntityStores,
    registry: Arc<EntityRegistry>,
    config: MigrationConfig,
    audit: Arc<dyn AuditSink>,
}

impl ConsistencyChecker {
    pub fn new(
        stores: EntityStores,
        registry: Arc<EntityRegistry>,
        config: MigrationConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            stores,
            registry,
            config,
            audit,
        }
    }

    /// Check one entity collection, optionally restricted to specific
    /// record ids.
    pub async fn check(
        &self,
        entity_type: EntityType,
        ids: Option<&[String]>,
    ) -> Result<DataConsistencyReport> {
        self.run_check(&[entity_type], ids).await
    }

    /// Check every tracked collection in the declared order.
    pub async fn check_all(&self) -> Result<DataConsistencyReport> {
        let types = self.stores.tracked_types();
        self.run_check(&types, None).await
    }

    async fn run_check(
        &self,
        types: &[EntityType],
        ids: Option<&[String]>,
    ) -> Result<DataConsistencyReport> {
        let started = Instant::now();
        let mut entity_checks = Vec::new();
        let mut inconsistencies = Vec::new();
        let mut total_checked = 0usize;
        let mut total_inconsistent_records = 0usize;

        for &entity_type in types {
            let descriptor = self
                .registry
                .descriptor(entity_type)
                .map_err(|e| self.fatal(entity_type, e))?;
            let store = self
                .stores
                .store(entity_type)
                .map_err(|e| self.fatal(entity_type, e))?;
            let mut records = store.fetch_all().await.map_err(|e| {
                self.fatal(
                    entity_type,
                    MigrationError::ConsistencyCheck(e.to_string()),
                )
            })?;
            if let Some(wanted) = ids {
                records.retain(|r| wanted.contains(&r.id));
            }

            let mut inconsistent_here = 0usize;
            for record in &records {
                let before = inconsistencies.len();
                for rule in &descriptor.consistency_rules {
                    self.apply_rule(rule, entity_type, record, &mut inconsistencies);
                }
                if inconsistencies.len() > before {
                    inconsistent_here += 1;
                }
            }

            total_checked += records.len();
            total_inconsistent_records += inconsistent_here;
            entity_checks.push(EntityCheck {
                entity_type,
                records_checked: records.len(),
                records_inconsistent: inconsistent_here,
                consistent: inconsistent_here == 0,
            });
        }

        let percentage = consistency_percentage(total_checked, total_inconsistent_records);
        let overall_status = self.classify(&inconsistencies, percentage);
        let metrics = build_metrics(
            &inconsistencies,
            percentage,
            total_checked,
            started.elapsed().as_millis() as u64,
        );
        let recommendations = build_recommendations(&inconsistencies);

        let report = DataConsistencyReport {
            report_id: DataConsistencyReport::generate_report_id(),
            generated_at: Utc::now(),
            overall_status,
            entity_checks,
            inconsistencies,
            metrics,
            recommendations,
        };

        self.audit.log_event(
            "consistency_check_completed",
            &report.report_id,
            json!({
                "status": report.overall_status.name(),
                "entities_checked": report.metrics.total_entities_checked,
                "inconsistencies": report.metrics.total_inconsistencies,
            }),
        );
        tracing::info!(
            report_id = %report.report_id,
            status = report.overall_status.name(),
            inconsistencies = report.metrics.total_inconsistencies,
            "consistency check completed"
        );
        Ok(report)
    }

    /// A scan that cannot complete is audited before the error
    /// propagates.
    fn fatal(&self, entity_type: EntityType, err: MigrationError) -> MigrationError {
        self.audit.log_event(
            "consistency_check_failed",
            entity_type.name(),
            json!({ "error": err.to_string() }),
        );
        tracing::error!(
            entity_type = entity_type.name(),
            error = %err,
            "consistency check aborted"
        );
        err
    }

    fn apply_rule(
        &self,
        rule: &ConsistencyRule,
        entity_type: EntityType,
        record: &EntityRecord,
        findings: &mut Vec<DataInconsistency>,
    ) {
        match rule {
            ConsistencyRule::Format { field, format } => {
                let Some(text) = record.text(field) else {
                    return;
                };
                if !format.matches(text) {
                    findings.push(finding(
                        entity_type,
                        record,
                        field,
                        text.to_string(),
                        format!("valid {}", format.describe()),
                        InconsistencyType::InvalidFormat,
                        Severity::Medium,
                        format!("field '{}' is not a valid {}", field, format.describe()),
                    ));
                }
            }
            ConsistencyRule::PositiveAmount(field) => {
                match record.number(field) {
                    Some(amount) if amount <= 0.0 => findings.push(finding(
                        entity_type,
                        record,
                        field,
                        amount.to_string(),
                        "> 0".to_string(),
                        InconsistencyType::NonPositiveAmount,
                        Severity::High,
                        format!("field '{}' must be a positive amount", field),
                    )),
                    Some(_) => {}
                    None => findings.push(finding(
                        entity_type,
                        record,
                        field,
                        "absent".to_string(),
                        "a positive amount".to_string(),
                        InconsistencyType::MissingData,
                        Severity::Medium,
                        format!("field '{}' is missing or not numeric", field),
                    )),
                }
            }
            ConsistencyRule::VatCalculation {
                total_field,
                vat_field,
            } => {
                let (Some(total), Some(vat)) =
                    (record.number(total_field), record.number(vat_field))
                else {
                    findings.push(finding(
                        entity_type,
                        record,
                        vat_field,
                        "absent".to_string(),
                        "total and VAT amounts".to_string(),
                        InconsistencyType::MissingData,
                        Severity::Medium,
                        "VAT invariant needs both total and VAT amounts".to_string(),
                    ));
                    return;
                };
                let net = total - vat;
                let expected = net * self.config.vat_rate;
                if (vat - expected).abs() > self.config.arithmetic_tolerance {
                    findings.push(finding(
                        entity_type,
                        record,
                        vat_field,
                        vat.to_string(),
                        expected.to_string(),
                        InconsistencyType::CalculationError,
                        Severity::High,
                        format!(
                            "VAT {} does not match net {} at rate {}",
                            vat, net, self.config.vat_rate
                        ),
                    ));
                }
            }
            ConsistencyRule::NotGreaterThan { field, limit_field } => {
                let (Some(value), Some(limit)) =
                    (record.number(field), record.number(limit_field))
                else {
                    return;
                };
                if value > limit {
                    findings.push(finding(
                        entity_type,
                        record,
                        field,
                        value.to_string(),
                        format!("<= {} ({})", limit_field, limit),
                        InconsistencyType::OrderingViolation,
                        Severity::Critical,
                        format!(
                            "'{}' exceeds '{}'; corrupted financial data",
                            field, limit_field
                        ),
                    ));
                }
            }
        }
    }

    /// Deterministic, monotonic status: any CRITICAL wins; then the
    /// HIGH count and percentage bands.
    fn classify(&self, findings: &[DataInconsistency], percentage: f64) -> ConsistencyStatus {
        if findings.iter().any(|f| f.severity == Severity::Critical) {
            return ConsistencyStatus::CriticalInconsistencies;
        }
        let high_count = findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count();
        if high_count > self.config.high_count_threshold
            || percentage < self.config.major_percentage_floor
        {
            return ConsistencyStatus::MajorInconsistencies;
        }
        if percentage < self.config.minor_percentage_floor {
            return ConsistencyStatus::MinorInconsistencies;
        }
        ConsistencyStatus::Consistent
    }
}

/// `(total - inconsistent) / total * 100`, exact for `total = 0`.
fn consistency_percentage(total: usize, inconsistent: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (total - inconsistent) as f64 / total as f64 * 100.0
}

#[allow(clippy::too_many_arguments)]
fn finding(
    entity_type: EntityType,
    record: &EntityRecord,
    field: &str,
    observed: String,
    expected: String,
    inconsistency_type: InconsistencyType,
    severity: Severity,
    description: String,
) -> DataInconsistency {
    DataInconsistency {
        entity_type,
        entity_id: record.id.clone(),
        field: field.to_string(),
        frontend_value: observed,
        backend_value: expected,
        inconsistency_type,
        severity,
        detected_at: Utc::now(),
        description,
    }
}

fn build_metrics(
    findings: &[DataInconsistency],
    percentage: f64,
    total_checked: usize,
    duration_ms: u64,
) -> ConsistencyMetrics {
    let mut by_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    for finding in findings {
        *by_type
            .entry(finding.inconsistency_type.name().to_string())
            .or_insert(0) += 1;
        *by_severity
            .entry(finding.severity.name().to_string())
            .or_insert(0) += 1;
    }
    ConsistencyMetrics {
        overall_consistency_percentage: percentage,
        total_entities_checked: total_checked,
        total_inconsistencies: findings.len(),
        duration_ms,
        by_type,
        by_severity,
    }
}

fn build_recommendations(findings: &[DataInconsistency]) -> Vec<String> {
    if findings.is_empty() {
        return vec!["No remediation required.".to_string()];
    }

    let mut present: Vec<InconsistencyType> =
        findings.iter().map(|f| f.inconsistency_type).collect();
    present.sort();
    present.dedup();

    let mut recommendations: Vec<String> = present
        .into_iter()
        .map(|ty| remediation_hint(ty).to_string())
        .collect();
    recommendations.push(effort_estimate(findings.len()).to_string());
    recommendations
}

fn remediation_hint(inconsistency_type: InconsistencyType) -> &'static str {
    match inconsistency_type {
        InconsistencyType::InvalidFormat => {
            "Normalize field formats at the write path, then re-run the consistency check."
        }
        InconsistencyType::NonPositiveAmount => {
            "Review records with non-positive amounts against source documents and correct them."
        }
        InconsistencyType::CalculationError => {
            "Recompute derived totals from their base amounts and update the stored values."
        }
        InconsistencyType::OrderingViolation => {
            "Escalate to finance: ordering violations indicate corrupted payroll data and need manual review."
        }
        InconsistencyType::MissingData => {
            "Backfill missing fields from the system of record."
        }
    }
}

fn effort_estimate(total: usize) -> &'static str {
    if total <= 10 {
        "Estimated remediation effort: under one hour."
    } else if total <= 50 {
        "Estimated remediation effort: about half a day."
    } else {
        "Estimated remediation effort: one day or more."
    }
}

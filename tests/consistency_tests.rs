//! Integration tests for the consistency checker and its report scoring.

use std::sync::Arc;
use vaultmigrate::store::{EntityStore, EntityStores};
use vaultmigrate::{
    ConsistencyChecker, ConsistencyStatus, EntityRecord, EntityRegistry, EntityType,
    InconsistencyType, MemoryAuditSink, MigrationConfig, MigrationError, Severity,
};

fn checker(stores: &EntityStores, audit: &Arc<MemoryAuditSink>) -> ConsistencyChecker {
    ConsistencyChecker::new(
        stores.clone(),
        Arc::new(EntityRegistry::new()),
        MigrationConfig::default(),
        audit.clone(),
    )
}

fn invoice(id: &str, total: f64, vat: f64) -> EntityRecord {
    EntityRecord::new(id)
        .with_field("invoice_number", format!("INV-20240{}", id.len()))
        .with_field("subtotal", total - vat)
        .with_field("vat_amount", vat)
        .with_field("total_amount", total)
}

fn payroll(id: &str, gross: f64, net: f64) -> EntityRecord {
    EntityRecord::new(id)
        .with_field("employee_id", "e-1")
        .with_field("period", "2024-09")
        .with_field("gross_salary", gross)
        .with_field("net_salary", net)
        .with_field("tax_withheld", gross - net)
}

#[tokio::test]
async fn test_correct_vat_reports_no_inconsistency() {
    let stores = EntityStores::in_memory();
    stores
        .store(EntityType::Invoice)
        .unwrap()
        .save(invoice("i-1", 118_000.0, 18_000.0))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();

    assert_eq!(report.overall_status, ConsistencyStatus::Consistent);
    assert!(report.inconsistencies.is_empty());
    assert_eq!(report.metrics.overall_consistency_percentage, 100.0);
    assert_eq!(report.recommendations, vec!["No remediation required."]);
}

#[tokio::test]
async fn test_wrong_vat_is_a_high_calculation_error() {
    let stores = EntityStores::in_memory();
    // Expected VAT for net 98,000 at 18% is 17,640, not 20,000.
    stores
        .store(EntityType::Invoice)
        .unwrap()
        .save(invoice("i-1", 118_000.0, 20_000.0))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();

    assert_eq!(report.inconsistencies.len(), 1);
    let finding = &report.inconsistencies[0];
    assert_eq!(finding.inconsistency_type, InconsistencyType::CalculationError);
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(finding.field, "vat_amount");
    assert_eq!(finding.entity_id, "i-1");
}

#[tokio::test]
async fn test_net_above_gross_forces_critical_status() {
    let stores = EntityStores::in_memory();
    let payrolls = stores.store(EntityType::Payroll).unwrap();
    // Plenty of fully consistent records...
    for i in 0..20 {
        payrolls
            .save(payroll(&format!("p-{}", i), 100_000.0, 70_000.0))
            .await
            .unwrap();
    }
    // ...and one corrupted record.
    payrolls
        .save(payroll("p-bad", 100_000.0, 120_000.0))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit).check_all().await.unwrap();

    assert_eq!(
        report.overall_status,
        ConsistencyStatus::CriticalInconsistencies
    );
    let critical: Vec<_> = report
        .inconsistencies
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].entity_id, "p-bad");
    assert_eq!(
        critical[0].inconsistency_type,
        InconsistencyType::OrderingViolation
    );
}

#[tokio::test]
async fn test_many_high_findings_escalate_to_major() {
    let stores = EntityStores::in_memory();
    let invoices = stores.store(EntityType::Invoice).unwrap();
    for i in 0..6 {
        invoices
            .save(invoice(&format!("i-{}", i), 118_000.0, 20_000.0))
            .await
            .unwrap();
    }

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();

    // Six HIGH findings, no CRITICAL.
    assert_eq!(
        report.overall_status,
        ConsistencyStatus::MajorInconsistencies
    );
    assert_eq!(report.metrics.by_severity["HIGH"], 6);
    assert!(!report.metrics.by_severity.contains_key("CRITICAL"));
}

#[tokio::test]
async fn test_percentage_and_entity_checks() {
    let stores = EntityStores::in_memory();
    let invoices = stores.store(EntityType::Invoice).unwrap();
    for i in 0..9 {
        invoices
            .save(invoice(&format!("ok-{}", i), 118_000.0, 18_000.0))
            .await
            .unwrap();
    }
    invoices
        .save(invoice("bad", 118_000.0, 20_000.0))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();

    assert_eq!(report.metrics.total_entities_checked, 10);
    assert_eq!(report.metrics.overall_consistency_percentage, 90.0);
    assert_eq!(report.overall_status, ConsistencyStatus::MinorInconsistencies);

    let check = report
        .entity_checks
        .iter()
        .find(|c| c.entity_type == EntityType::Invoice)
        .unwrap();
    assert_eq!(check.records_checked, 10);
    assert_eq!(check.records_inconsistent, 1);
    assert!(!check.consistent);
}

#[tokio::test]
async fn test_empty_collections_are_fully_consistent() {
    let stores = EntityStores::in_memory();
    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit).check_all().await.unwrap();

    assert_eq!(report.metrics.total_entities_checked, 0);
    assert_eq!(report.metrics.overall_consistency_percentage, 100.0);
    assert_eq!(report.overall_status, ConsistencyStatus::Consistent);
}

#[tokio::test]
async fn test_id_filter_restricts_the_scan() {
    let stores = EntityStores::in_memory();
    let invoices = stores.store(EntityType::Invoice).unwrap();
    invoices
        .save(invoice("i-ok", 118_000.0, 18_000.0))
        .await
        .unwrap();
    invoices
        .save(invoice("i-bad", 118_000.0, 20_000.0))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, Some(&["i-ok".to_string()]))
        .await
        .unwrap();

    assert_eq!(report.metrics.total_entities_checked, 1);
    assert!(report.inconsistencies.is_empty());
}

#[tokio::test]
async fn test_failed_scan_is_audited_before_return() {
    // No store wired for any entity type.
    let stores = EntityStores::new(std::collections::HashMap::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let err = checker(&stores, &audit)
        .check(EntityType::Employee, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Store(_)));

    let failed = audit.events_of_type("consistency_check_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].subject_id, "employee");
    assert!(audit
        .events_of_type("consistency_check_completed")
        .is_empty());
}

#[tokio::test]
async fn test_recommendations_group_by_type_with_effort_estimate() {
    let stores = EntityStores::in_memory();
    let invoices = stores.store(EntityType::Invoice).unwrap();
    invoices
        .save(
            invoice("i-1", 118_000.0, 20_000.0)
                .with_field("invoice_number", "badformat"),
        )
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let report = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();

    // One format hint, one calculation hint, one effort line.
    assert_eq!(report.recommendations.len(), 3);
    assert!(report.recommendations[0].contains("Normalize field formats"));
    assert!(report.recommendations[1].contains("Recompute derived totals"));
    assert!(report
        .recommendations
        .last()
        .unwrap()
        .contains("under one hour"));

    // Reports are generated fresh each run with distinct identifiers.
    let second = checker(&stores, &audit)
        .check(EntityType::Invoice, None)
        .await
        .unwrap();
    assert_ne!(report.report_id, second.report_id);
}

use crate::core::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Severity of a single inconsistency. Ordered so the worst finding
/// drives the overall report status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of invariant a finding violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InconsistencyType {
    InvalidFormat,
    NonPositiveAmount,
    CalculationError,
    OrderingViolation,
    MissingData,
}

impl InconsistencyType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            Self::CalculationError => "CALCULATION_ERROR",
            Self::OrderingViolation => "ORDERING_VIOLATION",
            Self::MissingData => "MISSING_DATA",
        }
    }
}

impl fmt::Display for InconsistencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One invariant violation found on one record. `frontend_value` holds
/// the observed value, `backend_value` the expected one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInconsistency {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub field: String,
    pub frontend_value: String,
    pub backend_value: String,
    pub inconsistency_type: InconsistencyType,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}

/// Deterministic function of the worst severity present plus the
/// consistency percentage; monotonic CRITICAL > MAJOR > MINOR >
/// CONSISTENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyStatus {
    Consistent,
    MinorInconsistencies,
    MajorInconsistencies,
    CriticalInconsistencies,
}

impl ConsistencyStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Consistent => "CONSISTENT",
            Self::MinorInconsistencies => "MINOR_INCONSISTENCIES",
            Self::MajorInconsistencies => "MAJOR_INCONSISTENCIES",
            Self::CriticalInconsistencies => "CRITICAL_INCONSISTENCIES",
        }
    }
}

impl fmt::Display for ConsistencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-collection tally inside a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCheck {
    pub entity_type: EntityType,
    pub records_checked: usize,
    pub records_inconsistent: usize,
    pub consistent: bool,
}

/// Aggregate numbers for a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyMetrics {
    pub overall_consistency_percentage: f64,
    pub total_entities_checked: usize,
    pub total_inconsistencies: usize,
    pub duration_ms: u64,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

/// Write-once, severity-classified summary of invariant violations
/// found across one or more entity collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConsistencyReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub overall_status: ConsistencyStatus,
    pub entity_checks: Vec<EntityCheck>,
    pub inconsistencies: Vec<DataInconsistency>,
    pub metrics: ConsistencyMetrics,
    pub recommendations: Vec<String>,
}

impl DataConsistencyReport {
    pub fn generate_report_id() -> String {
        format!("report_{}", Uuid::new_v4().simple())
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.inconsistencies.iter().map(|i| i.severity).max()
    }
}

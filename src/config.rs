use serde::{Deserialize, Serialize};

/// Tunable knobs for the migration core.
///
/// Defaults match the business rules the consistency and validation
/// engines are specified against: 18% VAT, 0.01 absolute arithmetic
/// tolerance, and the 80/95 consistency-percentage bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Backups kept by retention cleanup (most recent first).
    pub backup_retention: usize,
    /// VAT rate applied to invoice net amounts.
    pub vat_rate: f64,
    /// Absolute tolerance for cross-field arithmetic checks.
    pub arithmetic_tolerance: f64,
    /// Lowest acceptable salary value for employee validation.
    pub monetary_floor: f64,
    /// More than this many HIGH inconsistencies escalates the report
    /// to MAJOR even when the percentage band would not.
    pub high_count_threshold: usize,
    /// Below this consistency percentage the report is MAJOR.
    pub major_percentage_floor: f64,
    /// Below this consistency percentage the report is MINOR.
    pub minor_percentage_floor: f64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            backup_retention: 5,
            vat_rate: 0.18,
            arithmetic_tolerance: 0.01,
            monetary_floor: 0.0,
            high_count_threshold: 5,
            major_percentage_floor: 80.0,
            minor_percentage_floor: 95.0,
        }
    }
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backup_retention(mut self, keep: usize) -> Self {
        self.backup_retention = keep;
        self
    }

    pub fn vat_rate(mut self, rate: f64) -> Self {
        self.vat_rate = rate;
        self
    }

    pub fn arithmetic_tolerance(mut self, tolerance: f64) -> Self {
        self.arithmetic_tolerance = tolerance;
        self
    }

    pub fn monetary_floor(mut self, floor: f64) -> Self {
        self.monetary_floor = floor;
        self
    }

    pub fn high_count_threshold(mut self, count: usize) -> Self {
        self.high_count_threshold = count;
        self
    }
}

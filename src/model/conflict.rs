use crate::core::{EntityType, FieldValue, MigrationError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Named policy for choosing or merging between two divergent copies of
/// the same logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// Take the frontend snapshot verbatim.
    FrontendWins,
    /// Take the backend snapshot verbatim; used for any financially
    /// authoritative field.
    BackendWins,
    /// Start from backend, overlay non-null frontend fields.
    Merge,
    /// Compare `updated_at` on each side; backend wins when either
    /// timestamp is absent.
    LatestTimestampWins,
    /// Field-specific policy: monetary totals always backend, free-text
    /// descriptions frontend when present.
    CustomRule,
    /// Defaults to backend pending human action.
    Manual,
}

impl ConflictStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrontendWins => "FRONTEND_WINS",
            Self::BackendWins => "BACKEND_WINS",
            Self::Merge => "MERGE",
            Self::LatestTimestampWins => "LATEST_TIMESTAMP_WINS",
            Self::CustomRule => "CUSTOM_RULE",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConflictStrategy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FRONTEND_WINS" => Ok(Self::FrontendWins),
            "BACKEND_WINS" => Ok(Self::BackendWins),
            "MERGE" => Ok(Self::Merge),
            "LATEST_TIMESTAMP_WINS" => Ok(Self::LatestTimestampWins),
            "CUSTOM_RULE" => Ok(Self::CustomRule),
            "MANUAL" => Ok(Self::Manual),
            other => Err(MigrationError::ConflictApplication(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

/// Whether the resolved data reached the live record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceOutcome {
    Applied,
    Failed(String),
}

impl PersistenceOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Record of one conflict resolution. Always carries `resolved_by` and
/// `resolved_at` for audit traceability, regardless of strategy; the
/// resolution is recorded whether or not persistence succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub conflict_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub strategy: ConflictStrategy,
    pub resolved_data: BTreeMap<String, FieldValue>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub original_frontend_data: BTreeMap<String, FieldValue>,
    pub original_backend_data: BTreeMap<String, FieldValue>,
    pub reason: String,
    pub persistence: PersistenceOutcome,
}

impl ConflictResolution {
    pub fn generate_conflict_id() -> String {
        format!("conflict_{}", Uuid::new_v4().simple())
    }
}

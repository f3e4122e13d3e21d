use crate::core::{FieldValue, MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The entity collections tracked by the migration core.
///
/// The variant order is the declared processing order for batch
/// migration and rollback: employees, then invoices, then payroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Employee,
    Invoice,
    Payroll,
}

impl EntityType {
    /// Fixed processing order so partial results are reproducible.
    pub const PROCESSING_ORDER: [EntityType; 3] =
        [EntityType::Employee, EntityType::Invoice, EntityType::Payroll];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Invoice => "invoice",
            Self::Payroll => "payroll",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "employee" => Ok(Self::Employee),
            "invoice" => Ok(Self::Invoice),
            "payroll" => Ok(Self::Payroll),
            other => Err(MigrationError::UnknownEntityType(other.to_string())),
        }
    }
}

/// One record of an entity collection: a stable identifier plus a
/// field map. BTreeMap keeps field iteration deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Text content of a field, if present and textual.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_str())
    }

    /// Numeric content of a field, if present and numeric.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.as_f64())
    }

    /// Whether a field is present and non-null.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_null())
    }
}

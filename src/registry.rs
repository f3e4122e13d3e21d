//! Per-entity-type rule registry.
//!
//! Replaces string-keyed dispatch: every entity type declares its field
//! schema, its sensitive (encrypted-at-rest) fields, the identity subset
//! used for integrity comparison, and the validation / consistency rule
//! sets the engines interpret. Adding an entity type means adding one
//! descriptor here, not another copy of the batch logic.

use crate::core::{EntityType, MigrationError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").unwrap();
    static ref TAX_ID_RE: Regex = Regex::new(r"^[A-Z0-9]{8,14}$").unwrap();
    static ref INVOICE_NUMBER_RE: Regex = Regex::new(r"^INV-[0-9]{4,10}$").unwrap();
    static ref PERIOD_RE: Regex = Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Named field formats checked by regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Phone,
    TaxId,
    InvoiceNumber,
    Period,
    Email,
}

impl FieldFormat {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Phone => PHONE_RE.is_match(value),
            Self::TaxId => TAX_ID_RE.is_match(value),
            Self::InvoiceNumber => INVOICE_NUMBER_RE.is_match(value),
            Self::Period => PERIOD_RE.is_match(value),
            Self::Email => EMAIL_RE.is_match(value),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Phone => "contact number",
            Self::TaxId => "tax identifier",
            Self::InvoiceNumber => "invoice number (INV-...)",
            Self::Period => "payroll period (YYYY-MM)",
            Self::Email => "email address",
        }
    }
}

/// One field-level or business validation rule.
#[derive(Debug, Clone)]
pub enum ValidationRule {
    /// Field must be present and non-null.
    Required(&'static str),
    /// Field, when present, must match the named format.
    Format {
        field: &'static str,
        format: FieldFormat,
    },
    /// Field, when present, must be numeric and >= 0.
    NonNegative(&'static str),
    /// Field, when present, must be numeric and >= the configured floor.
    MonetaryFloor(&'static str),
    /// `total` must equal the sum of `parts` within the configured
    /// absolute tolerance; skipped when any operand is absent.
    SumMatches {
        total: &'static str,
        parts: &'static [&'static str],
    },
}

/// One consistency invariant. Severity and inconsistency type are fixed
/// by rule class: formats are MEDIUM, positivity is HIGH, derived-amount
/// arithmetic is HIGH, and ordering violations that indicate corrupted
/// financial data are CRITICAL.
#[derive(Debug, Clone)]
pub enum ConsistencyRule {
    Format {
        field: &'static str,
        format: FieldFormat,
    },
    PositiveAmount(&'static str),
    /// VAT must equal `(total - vat) * vat_rate` within tolerance.
    VatCalculation {
        total_field: &'static str,
        vat_field: &'static str,
    },
    /// `field` must not exceed `limit_field` (e.g. net <= gross salary).
    NotGreaterThan {
        field: &'static str,
        limit_field: &'static str,
    },
}

/// Everything the engines need to know about one entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    /// Declared field schema; conflict snapshots are validated against it.
    pub known_fields: &'static [&'static str],
    /// Fields whose persisted form must be ciphertext.
    pub sensitive_fields: &'static [&'static str],
    /// Identity-bearing subset compared by `validate_integrity`.
    pub identity_fields: &'static [&'static str],
    /// Financially authoritative fields; backend always wins for these
    /// under the CUSTOM_RULE conflict strategy.
    pub monetary_fields: &'static [&'static str],
    /// Free-text fields; frontend wins when present under CUSTOM_RULE.
    pub freetext_fields: &'static [&'static str],
    pub validation_rules: Vec<ValidationRule>,
    pub consistency_rules: Vec<ConsistencyRule>,
}

impl EntityDescriptor {
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive_fields.contains(&field)
    }

    pub fn is_known(&self, field: &str) -> bool {
        self.known_fields.contains(&field)
    }
}

/// Registry mapping each entity type to its descriptor.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    descriptors: HashMap<EntityType, EntityDescriptor>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        let mut descriptors = HashMap::new();
        descriptors.insert(EntityType::Employee, employee_descriptor());
        descriptors.insert(EntityType::Invoice, invoice_descriptor());
        descriptors.insert(EntityType::Payroll, payroll_descriptor());
        Self { descriptors }
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(&self, entity_type: EntityType) -> Result<&EntityDescriptor> {
        self.descriptors
            .get(&entity_type)
            .ok_or_else(|| MigrationError::UnknownEntityType(entity_type.name().to_string()))
    }
}

fn employee_descriptor() -> EntityDescriptor {
    EntityDescriptor {
        entity_type: EntityType::Employee,
        known_fields: &[
            "first_name",
            "last_name",
            "email",
            "phone",
            "national_id",
            "bank_account",
            "salary",
            "notes",
            "created_at",
            "updated_at",
        ],
        sensitive_fields: &["phone", "national_id", "bank_account"],
        identity_fields: &["email", "created_at"],
        monetary_fields: &["salary"],
        freetext_fields: &["notes"],
        validation_rules: vec![
            ValidationRule::Required("first_name"),
            ValidationRule::Required("last_name"),
            ValidationRule::Required("email"),
            ValidationRule::Format {
                field: "email",
                format: FieldFormat::Email,
            },
            ValidationRule::Format {
                field: "phone",
                format: FieldFormat::Phone,
            },
            ValidationRule::Format {
                field: "national_id",
                format: FieldFormat::TaxId,
            },
            ValidationRule::NonNegative("salary"),
            ValidationRule::MonetaryFloor("salary"),
        ],
        consistency_rules: vec![
            ConsistencyRule::Format {
                field: "email",
                format: FieldFormat::Email,
            },
            ConsistencyRule::PositiveAmount("salary"),
        ],
    }
}

fn invoice_descriptor() -> EntityDescriptor {
    EntityDescriptor {
        entity_type: EntityType::Invoice,
        known_fields: &[
            "invoice_number",
            "customer_name",
            "customer_tax_id",
            "subtotal",
            "vat_amount",
            "total_amount",
            "description",
            "created_at",
            "updated_at",
        ],
        sensitive_fields: &["customer_tax_id"],
        identity_fields: &["invoice_number", "created_at"],
        monetary_fields: &["subtotal", "vat_amount", "total_amount"],
        freetext_fields: &["description"],
        validation_rules: vec![
            ValidationRule::Required("invoice_number"),
            ValidationRule::Format {
                field: "invoice_number",
                format: FieldFormat::InvoiceNumber,
            },
            ValidationRule::Format {
                field: "customer_tax_id",
                format: FieldFormat::TaxId,
            },
            ValidationRule::NonNegative("subtotal"),
            ValidationRule::NonNegative("vat_amount"),
            ValidationRule::NonNegative("total_amount"),
            ValidationRule::SumMatches {
                total: "total_amount",
                parts: &["subtotal", "vat_amount"],
            },
        ],
        consistency_rules: vec![
            ConsistencyRule::Format {
                field: "invoice_number",
                format: FieldFormat::InvoiceNumber,
            },
            ConsistencyRule::PositiveAmount("total_amount"),
            ConsistencyRule::VatCalculation {
                total_field: "total_amount",
                vat_field: "vat_amount",
            },
        ],
    }
}

fn payroll_descriptor() -> EntityDescriptor {
    EntityDescriptor {
        entity_type: EntityType::Payroll,
        known_fields: &[
            "employee_id",
            "period",
            "gross_salary",
            "net_salary",
            "tax_withheld",
            "bank_account",
            "created_at",
            "updated_at",
        ],
        sensitive_fields: &["bank_account"],
        identity_fields: &["employee_id", "period", "created_at"],
        monetary_fields: &["gross_salary", "net_salary", "tax_withheld"],
        freetext_fields: &[],
        validation_rules: vec![
            ValidationRule::Required("employee_id"),
            ValidationRule::Required("period"),
            ValidationRule::Format {
                field: "period",
                format: FieldFormat::Period,
            },
            ValidationRule::NonNegative("gross_salary"),
            ValidationRule::NonNegative("net_salary"),
            ValidationRule::NonNegative("tax_withheld"),
            ValidationRule::SumMatches {
                total: "gross_salary",
                parts: &["net_salary", "tax_withheld"],
            },
        ],
        consistency_rules: vec![
            ConsistencyRule::Format {
                field: "period",
                format: FieldFormat::Period,
            },
            ConsistencyRule::PositiveAmount("gross_salary"),
            ConsistencyRule::NotGreaterThan {
                field: "net_salary",
                limit_field: "gross_salary",
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_types() {
        let registry = EntityRegistry::new();
        for ty in EntityType::PROCESSING_ORDER {
            let descriptor = registry.descriptor(ty).unwrap();
            assert_eq!(descriptor.entity_type, ty);
            assert!(!descriptor.sensitive_fields.is_empty());
        }
    }

    #[test]
    fn test_sensitive_fields_never_identity_bearing() {
        // Encryption must not touch the identity subset, or integrity
        // comparison after migration would always fail.
        let registry = EntityRegistry::new();
        for ty in EntityType::PROCESSING_ORDER {
            let descriptor = registry.descriptor(ty).unwrap();
            for field in descriptor.identity_fields {
                assert!(!descriptor.is_sensitive(field), "{ty}: {field}");
            }
        }
    }

    #[test]
    fn test_formats() {
        assert!(FieldFormat::Phone.matches("+381 64 123-4567"));
        assert!(!FieldFormat::Phone.matches("abc"));
        assert!(FieldFormat::InvoiceNumber.matches("INV-202401"));
        assert!(!FieldFormat::InvoiceNumber.matches("2024-01"));
        assert!(FieldFormat::Period.matches("2024-09"));
        assert!(!FieldFormat::Period.matches("2024-13"));
        assert!(FieldFormat::TaxId.matches("RS123456789"));
        assert!(FieldFormat::Email.matches("pay@corp.example"));
    }
}

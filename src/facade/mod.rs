pub mod service;

pub use service::{MigrationOutcome, MigrationService};

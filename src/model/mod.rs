pub mod backup;
pub mod conflict;
pub mod report;
pub mod result;

pub use backup::{EntitySnapshot, MigrationBackup};
pub use conflict::{ConflictResolution, ConflictStrategy, PersistenceOutcome};
pub use report::{
    ConsistencyMetrics, ConsistencyStatus, DataConsistencyReport, DataInconsistency, EntityCheck,
    InconsistencyType, Severity,
};
pub use result::{EntityRollbackResult, MigrationResult, RollbackResult};

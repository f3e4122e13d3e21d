pub mod orchestrator;
pub mod task;

pub use orchestrator::MigrationOrchestrator;
pub use task::{CancelFlag, TaskHandle};

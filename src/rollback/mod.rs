pub mod engine;

pub use engine::{RollbackEngine, RollbackPhase};

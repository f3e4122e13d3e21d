pub mod engine;

pub use engine::{ValidationEngine, ValidationReport};

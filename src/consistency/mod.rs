pub mod checker;

pub use checker::ConsistencyChecker;

pub mod resolver;

pub use resolver::ConflictResolver;

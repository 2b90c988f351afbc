// Read-side queries over indexed repositories

pub mod engine;

pub use engine::{ImporterMatch, QueryEngine};

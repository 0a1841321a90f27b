pub mod adapters;
pub mod cli;
pub mod core;
pub mod error;
pub mod services;
pub mod types;
pub mod utils;


// Re-export commonly used item
pub use error::{NodeError, NodeResult};

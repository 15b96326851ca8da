pub mod analysis;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod reports;
pub mod types;

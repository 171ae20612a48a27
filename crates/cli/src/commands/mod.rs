//! Subcommand implementations

pub mod agent;
pub mod confidence;
pub mod scenario;

//! Side-effecting collaborators: config, profile file, model server, lead sinks.

pub mod config;
pub mod csv_log;
pub mod error;
pub mod init;
pub mod model;
pub mod profile_store;
pub mod prompt;
pub mod sheets;
pub mod sink;

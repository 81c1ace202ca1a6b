//! Port traits for hexagonal architecture.

pub mod chart_port;
pub mod config_port;
pub mod data_port;

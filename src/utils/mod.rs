//! Utilities shared across the crate

pub mod logging;
pub mod network_config;

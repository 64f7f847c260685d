//! CLI command implementations.

pub mod config;
pub mod exchange;
pub mod faces;

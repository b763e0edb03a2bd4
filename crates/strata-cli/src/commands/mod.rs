//! CLI command implementations

pub mod connect;

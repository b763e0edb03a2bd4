//! Strata CLI library
//!
//! Command implementations and the supporting pieces: configuration,
//! target resolution, prompting and terminal output.

pub mod commands;
pub mod config;
pub mod output;
pub mod prompt;
pub mod resolver;

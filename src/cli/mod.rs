//! Command-line interface for music-features.
//!
//! This module provides CLI commands for fetching, showing and checking
//! acoustic attributes of music files.

mod commands;

pub use commands::{Cli, Commands, run_command};

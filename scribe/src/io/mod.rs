//! I/O helpers for scribe commands.

pub mod approval;
pub mod artifacts;
pub mod config;
pub mod continuity;
pub mod executor;
pub mod knowledge;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod run_log;

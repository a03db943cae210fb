//! Stable exit codes for scribe CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments, workflow failure or user cancellation.
pub const FAILURE: i32 = 1;

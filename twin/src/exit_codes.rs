//! Stable exit codes for `twin` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config/profile or other errors.
pub const INVALID: i32 = 1;
/// `twin ask` ended with the fallback reply.
pub const ABORTED: i32 = 2;

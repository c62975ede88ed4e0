//! Stable exit codes for guard CLI commands.

/// Passage allowed, or the command succeeded.
pub const ALLOWED: i32 = 0;
/// Invalid input: unknown stone, bad guard or config, unknown mechanism.
pub const INVALID: i32 = 1;
/// Passage blocked, or a `guard judge` mechanism failed.
pub const BLOCKED: i32 = 2;

//! Stable exit codes for siliconai-setup CLI commands.

/// Command succeeded; every executed step was applied or already satisfied.
pub const OK: i32 = 0;
/// Command failed due to invalid config/usage or other errors.
pub const INVALID: i32 = 1;
/// A pipeline halted on a failed step.
pub const STEP_FAILED: i32 = 2;

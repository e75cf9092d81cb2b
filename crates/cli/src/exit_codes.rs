//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Run completed, every scored validation passed            |
//! | 1    | Run completed, at least one validation failed            |
//! | 2    | Usage error (bad args, unreadable file)                  |
//! | 3    | Rules or connections config is invalid                   |
//! | 4    | Runtime failure (sources unreachable, output not written) |
//! | 5    | Run completed and passed, but some rules errored         |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one scored validation failed.
pub const EXIT_VALIDATION_FAILED: u8 = 1;

/// Usage error - bad arguments, missing input files.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Nothing could be verified: both sources unreachable, or IO failed.
pub const EXIT_RUNTIME: u8 = 4;

/// Every scored validation passed but one or more rules could not run.
/// A failed validation takes precedence (exit 1).
pub const EXIT_RULE_ERRORS: u8 = 5;

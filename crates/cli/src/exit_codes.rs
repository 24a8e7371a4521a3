//! CLI Exit Code Registry
//!
//! Single source of truth for `altas` exit codes. Scripts that schedule the
//! monthly run branch on these, so treat them as part of the shell contract.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments, bad window)              |
//! | 60   | Config could not be parsed or failed validation      |
//! | 61   | Runtime failure (unreadable source, missing column)  |
//! | 62   | Duplicates were set aside and `--strict` was passed  |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments or an unusable date window.
/// clap exits with the same code for its own parse errors.
pub const EXIT_USAGE: u8 = 2;

/// Config file is not valid TOML or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 60;

/// Reading sources, running the engine or writing outputs failed.
pub const EXIT_RUNTIME: u8 = 61;

/// `--strict` run found rows set aside as duplicates.
pub const EXIT_DUPLICATES: u8 = 62;

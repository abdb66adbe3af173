//! Switch for parser error reporting.
//!
//! When reporting is on (the default), every parse failure is emitted as a
//! `tracing` warning. Callers that turn parse failures into their own error
//! type switch it off around the parse with [`SuppressReporting`], which
//! puts the previous setting back when it is dropped, including during a
//! panic unwind.
//!
//! The switch is held per thread, so a guard on one thread never silences
//! another.
//!
//! ```
//! use xmlbridge::parser::reporting::{reporting_enabled, SuppressReporting};
//!
//! {
//!     let _guard = SuppressReporting::new();
//!     assert!(!reporting_enabled());
//! }
//! assert!(reporting_enabled());
//! ```

use std::cell::Cell;

use crate::error::ParseError;

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(true) };
}

/// Returns whether parse failures are currently logged.
#[must_use]
pub fn reporting_enabled() -> bool {
    REPORTING.with(Cell::get)
}

/// Turns reporting on or off and returns the previous setting.
pub fn set_reporting(enabled: bool) -> bool {
    REPORTING.with(|flag| flag.replace(enabled))
}

/// Logs a parse failure if reporting is enabled.
pub(crate) fn report(err: &ParseError) {
    if reporting_enabled() {
        tracing::warn!(
            line = err.location.line,
            column = err.location.column,
            "{}",
            err.message
        );
    }
}

/// Scoped guard that disables reporting for its lifetime.
#[must_use = "reporting is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuppressReporting {
    previous: bool,
}

impl SuppressReporting {
    /// Disables reporting, remembering the current setting.
    pub fn new() -> Self {
        Self {
            previous: set_reporting(false),
        }
    }
}

impl Default for SuppressReporting {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SuppressReporting {
    fn drop(&mut self) {
        set_reporting(self.previous);
    }
}

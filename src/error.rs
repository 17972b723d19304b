//! Error taxonomy for the time integrators
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias over
//! [`PfasstError`]. The variants follow the way failures are meant to be
//! handled by callers:
//!
//! | Variant            | Meaning                                              | Recoverable |
//! |--------------------|------------------------------------------------------|-------------|
//! | `Configuration`    | Invalid setup (time domain, levels, quadrature, ...) | no          |
//! | `SizeMismatch`     | Two containers of different length were combined    | no          |
//! | `NotImplemented`   | A scheme hook was not provided by the scheme in use  | no          |
//! | `Communication`    | A message could not be delivered or decoded          | no          |
//! | `Numerical`        | NaN or Inf appeared in a state                       | no          |
//! | `InvalidOption`    | An option value could not be parsed                  | no          |
//! | `Export`           | Empty or non-finite data handed to an exporter       | no          |
//! | `Io`               | Export to disk failed                                | no          |
//!
//! Rejected advances (`advance_time` / `advance_iteration` returning `false`)
//! are not errors: they are plain booleans consumed by the controller loops.

use thiserror::Error;

/// Errors raised by controllers, sweepers, transfers and communicators
#[derive(Debug, Error)]
pub enum PfasstError {
    /// Invalid or incomplete configuration, surfaced before anything runs
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Containers of different lengths were combined
    #[error("size mismatch in {context}: expected {expected}, found {found}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// A scheme-specific hook has no implementation for the configured scheme
    ///
    /// This signals an incomplete configuration rather than a data error.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Message passing between ranks failed
    #[error("communication error: {0}")]
    Communication(String),

    /// A state contains NaN or Inf values
    #[error("numerical error: {0}")]
    Numerical(String),

    /// An option was present but could not be parsed into the requested type
    #[error("invalid value '{value}' for option '{key}'")]
    InvalidOption { key: String, value: String },

    /// Data handed to an exporter can not be written
    #[error("export error: {0}")]
    Export(String),

    /// I/O failure while exporting results
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PfasstError {
    /// Shorthand for a [`PfasstError::NotImplemented`] error
    pub fn not_implemented(what: impl Into<String>) -> Self {
        PfasstError::NotImplemented(what.into())
    }

    /// Shorthand for a [`PfasstError::Configuration`] error
    pub fn configuration(message: impl Into<String>) -> Self {
        PfasstError::Configuration(message.into())
    }

    /// Whether this error marks a missing scheme hook
    ///
    /// Controllers use this to tell an unconfigured scheme apart from a
    /// genuine runtime failure.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, PfasstError::NotImplemented(_))
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, PfasstError>;

/// Fail with [`PfasstError::SizeMismatch`] unless `found == expected`
pub(crate) fn ensure_size(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(PfasstError::SizeMismatch { context, expected, found });
    }
    Ok(())
}

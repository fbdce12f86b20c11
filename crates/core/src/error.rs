//! Error types for the treepack engine.

use thiserror::Error;

/// Result alias used across the treepack crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised before or around an optimization run.
///
/// Nothing in the annealing hot loop returns these: rejected moves, inapplicable
/// kernels and degenerate intersections are ordinary outcomes, not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The annealing configuration is malformed (detected before the run starts).
    #[error("invalid annealing configuration: {0}")]
    InvalidConfig(String),

    /// The initial configuration of placements cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfig`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("n_steps must be positive");
        assert_eq!(
            err.to_string(),
            "invalid annealing configuration: n_steps must be positive"
        );

        let err = Error::InvalidConfiguration("empty".into());
        assert!(err.to_string().contains("empty"));
    }
}

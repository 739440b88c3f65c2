//! Error types for configuration parsing and field registration.

use thiserror::Error;

/// Result type alias for jig-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building conditions or registering fields.
///
/// Query evaluation itself is total: a block that fails to match is
/// ordinary control flow, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A condition clause referenced a field that was never registered.
    #[error("unknown field `{name}`")]
    UnknownField {
        /// Name as it appeared in the clause
        name: String,
    },

    /// A condition clause could not be parsed.
    #[error("bad condition: {detail}")]
    BadCondition {
        /// What went wrong, with the offending clause text
        detail: String,
    },

    /// A field was re-registered with a different kind or scope flag.
    #[error("conflicting registration for field `{name}`")]
    ConflictingField {
        /// Name of the field being redefined
        name: String,
    },
}

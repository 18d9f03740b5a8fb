//! Error types for rule validation and compilation

use thiserror::Error;

/// Reasons a topic filter is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter is the empty string
    #[error("topic filter is empty")]
    Empty,

    /// `#` appears somewhere other than the final level
    #[error("'#' must be the last level of a topic filter (found at level {level})")]
    MultiLevelNotLast { level: usize },

    /// A level mixes a wildcard with literal characters, e.g. `a+` or `b#`
    #[error("wildcard must occupy a whole level, found {segment:?} at level {level}")]
    MixedWildcard { level: usize, segment: String },

    /// MQTT forbids U+0000 anywhere in a topic or filter
    #[error("topic filter contains a null character")]
    NullCharacter,
}

/// Configuration errors raised while compiling a rule table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// A rule row carries a malformed topic filter
    #[error("invalid rule #{index} (role '{role}', pattern {topic_pattern:?}): {reason}")]
    InvalidRule {
        index: usize,
        topic_pattern: String,
        role: String,
        #[source]
        reason: FilterError,
    },

    /// A rule row names no role
    #[error("invalid rule #{index} (pattern {topic_pattern:?}): role must not be empty")]
    EmptyRole { index: usize, topic_pattern: String },
}

impl AuthzError {
    /// Index of the offending row in the input table
    pub fn row_index(&self) -> usize {
        match self {
            AuthzError::InvalidRule { index, .. } | AuthzError::EmptyRole { index, .. } => *index,
        }
    }
}

/// Result type for rule compilation
pub type Result<T> = std::result::Result<T, AuthzError>;

//! Error types for template rendering and path overrides.

use thiserror::Error;

/// Errors raised while rendering templates or applying overrides.
///
/// Both variants are configuration errors: they point at a malformed value
/// in a job description, never at a runtime condition on a host.
#[derive(Debug, Error)]
pub enum Error {
    /// An embedded expression or template block failed to compile or evaluate
    #[error("invalid template {template:?}: {message}")]
    Template {
        /// The offending template source
        template: String,
        /// Description from the expression engine
        message: String,
    },

    /// An override path could not be parsed
    #[error("invalid override path {path:?}: {message}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// What is wrong with it
        message: String,
    },

    /// The evaluated value could not be represented as a configuration value
    #[error("cannot convert rendered value: {0}")]
    Convert(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn template(template: &str, err: &minijinja::Error) -> Self {
        Self::Template {
            template: template.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn path(path: &str, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for templating operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the lifecycle engine.
//!
//! Errors are categorized so callers can decide policy: configuration errors
//! are fatal for the declaration they come from, timeouts are operational
//! failures owned by whichever collaborator was waiting.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::registry::PluginKind;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed declaration, unknown plugin, bad or missing argument
    Configuration,
    /// Template failed to compile or evaluate
    Template,
    /// A bounded wait exhausted its budget
    Timeout,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this category is a configuration problem in the job description.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration | Self::Template)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Template => "Template error",
            Self::Timeout => "Timed out",
            Self::Other => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors raised by the lifecycle engine and its registries.
#[derive(Debug, Error)]
pub enum Error {
    /// A plugin declaration is neither a name nor a single-key mapping
    #[error("entry {entry} has bad format: expected a name or a single-key mapping")]
    BadDeclaration {
        /// The offending entry, rendered as JSON
        entry: String,
    },

    /// No plugin registered under this name
    #[error("unknown {kind} \"{name}\"")]
    UnknownPlugin {
        /// Registry that was searched
        kind: PluginKind,
        /// Name that was looked up
        name: String,
    },

    /// A required plugin argument is absent
    #[error("{kind} \"{name}\": missing required argument \"{argument}\"")]
    MissingArgument {
        /// Kind of plugin being constructed
        kind: PluginKind,
        /// Plugin name
        name: String,
        /// Name of the missing argument
        argument: String,
    },

    /// A plugin argument has an unusable value
    #[error("{kind} \"{name}\": invalid argument \"{argument}\": {message}")]
    InvalidArgument {
        /// Kind of plugin being constructed
        kind: PluginKind,
        /// Plugin name
        name: String,
        /// Name of the invalid argument
        argument: String,
        /// What is wrong with it
        message: String,
    },

    /// A host overrides `services` or `updates` with something other than a list
    #[error("host \"{host}\": \"{key}\" must be a list")]
    InvalidHostList {
        /// Host identifier
        host: String,
        /// The overridden key
        key: String,
    },

    /// Template rendering failed
    #[error(transparent)]
    Template(#[from] templating::Error),

    /// A bounded wait exhausted its budget
    #[error("timed out after {}s waiting for {what}", elapsed.as_secs())]
    Timeout {
        /// What was being waited for
        what: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// A collaborator panicked while being constructed
    #[error("fault: {0}")]
    Fault(String),

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    Pool(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::BadDeclaration { .. }
            | Error::UnknownPlugin { .. }
            | Error::MissingArgument { .. }
            | Error::InvalidArgument { .. }
            | Error::InvalidHostList { .. } => ErrorCategory::Configuration,
            Error::Template(_) => ErrorCategory::Template,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Fault(_) | Error::Pool(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is a configuration problem.
    pub fn is_configuration(&self) -> bool {
        self.category().is_configuration()
    }
}

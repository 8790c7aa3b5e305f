//! Error types for the `rulesync` driver.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the driver around the reconciler.
#[derive(Error, Debug)]
pub enum Error {
    /// A file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The desired rules file is malformed.
    #[error("invalid rules file {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// Two desired rules share an instance name.
    #[error("duplicate rule name '{name}' in rules file")]
    DuplicateName { name: String },

    /// The state file is malformed.
    #[error("invalid state file {path}: {reason}")]
    InvalidState { path: PathBuf, reason: String },

    /// The state file was written by an unknown format version.
    #[error("unsupported state version {found} (expected {expected})")]
    UnsupportedStateVersion { found: u32, expected: u32 },

    /// An import target is missing remotely.
    #[error("cannot import '{name}': rule for metric '{metric}' does not exist")]
    ImportNotFound { name: String, metric: String },

    /// An import would overwrite a managed instance.
    #[error("'{name}' is already managed")]
    AlreadyManaged { name: String },

    /// A lifecycle call failed.
    #[error("{name}: {source}")]
    Reconcile {
        name: String,
        #[source]
        source: rulesync_reconciler::Error,
    },
}

impl Error {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a reconciler error with the instance it happened on.
    pub fn reconcile(name: impl Into<String>, source: rulesync_reconciler::Error) -> Self {
        Self::Reconcile {
            name: name.into(),
            source,
        }
    }

    /// True when the remote side was left half changed: a replace deleted
    /// the old rule but failed to create the new one.
    pub const fn is_partial(&self) -> bool {
        match self {
            Self::Reconcile { source, .. } => source.is_partial(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rulesync_core::StoreError;
    use rulesync_reconciler::ReplaceStage;

    use super::*;

    #[test]
    fn test_partial_only_for_replace_create_stage() {
        let partial = Error::reconcile(
            "web",
            rulesync_reconciler::Error::replace_failed(
                "a",
                "b",
                ReplaceStage::Create,
                StoreError::unavailable("down"),
            ),
        );
        let whole = Error::reconcile(
            "web",
            rulesync_reconciler::Error::delete_failed("a", StoreError::unavailable("down")),
        );

        assert!(partial.is_partial());
        assert!(!whole.is_partial());
        assert!(!Error::DuplicateName { name: "x".into() }.is_partial());
    }

    #[test]
    fn test_reconcile_error_names_instance() {
        let err = Error::reconcile(
            "web",
            rulesync_reconciler::Error::create_failed("up", StoreError::already_exists("up")),
        );

        assert!(err.to_string().starts_with("web: "));
    }
}

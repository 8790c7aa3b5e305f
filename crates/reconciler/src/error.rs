//! Error types for the reconciler crate.

use std::fmt;

use rulesync_core::StoreError;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a replace failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceStage {
    /// Deleting the rule under the previous metric. Nothing changed remotely.
    Delete,
    /// Creating the rule under the new metric. The previous rule is already gone.
    Create,
}

impl fmt::Display for ReplaceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "deleting the previous rule"),
            Self::Create => write!(
                f,
                "creating the new rule (the previous rule was already deleted; \
                 create it again or reconcile manually)"
            ),
        }
    }
}

/// Reconciler error types.
///
/// Every fatal kind leaves local state as it was before the call.
#[derive(Debug, Error)]
pub enum Error {
    /// The store refused or failed a create.
    #[error("unable to create aggregation rule '{metric}': {source}")]
    CreateFailed { metric: String, source: StoreError },

    /// The store refused or failed an update, including an auto-import adoption.
    #[error("unable to update aggregation rule '{metric}': {source}")]
    UpdateFailed { metric: String, source: StoreError },

    /// The store refused or failed a delete.
    #[error("unable to delete aggregation rule '{metric}': {source}")]
    DeleteFailed { metric: String, source: StoreError },

    /// A metric rename could not be carried out as delete then create.
    #[error("unable to replace aggregation rule '{from}' with '{to}' while {stage}: {source}")]
    ReplaceFailed {
        from: String,
        to: String,
        stage: ReplaceStage,
        source: StoreError,
    },

    /// The record cannot be expressed as a rule.
    #[error("invalid aggregation rule '{metric}': {reason}")]
    InvalidRecord { metric: String, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a create failed error.
    pub fn create_failed(metric: impl Into<String>, source: StoreError) -> Self {
        Self::CreateFailed {
            metric: metric.into(),
            source,
        }
    }

    /// Create an update failed error.
    pub fn update_failed(metric: impl Into<String>, source: StoreError) -> Self {
        Self::UpdateFailed {
            metric: metric.into(),
            source,
        }
    }

    /// Create a delete failed error.
    pub fn delete_failed(metric: impl Into<String>, source: StoreError) -> Self {
        Self::DeleteFailed {
            metric: metric.into(),
            source,
        }
    }

    /// Create a replace failed error.
    pub fn replace_failed(
        from: impl Into<String>,
        to: impl Into<String>,
        stage: ReplaceStage,
        source: StoreError,
    ) -> Self {
        Self::ReplaceFailed {
            from: from.into(),
            to: to.into(),
            stage,
            source,
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the remote side was left half-changed.
    ///
    /// Only a replace that deleted the old rule and then failed to create the
    /// new one qualifies. Retrying it as an update is wrong: the next read
    /// reports the old rule as drifted.
    pub const fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::ReplaceFailed {
                stage: ReplaceStage::Create,
                ..
            }
        )
    }

    /// The store error behind this failure, if any.
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::CreateFailed { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::ReplaceFailed { source, .. } => Some(source),
            Self::InvalidRecord { .. } | Self::InvalidConfig { .. } => None,
        }
    }
}

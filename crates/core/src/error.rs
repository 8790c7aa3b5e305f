//! Error types shared by every rule store backend.

use thiserror::Error;

/// Result type for rule store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a [`crate::RuleStore`].
///
/// Callers are not required to tell "not found" apart from transport
/// failures; the variants exist so logs and strict policies can.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No rule exists for the metric.
    #[error("aggregation rule for metric '{metric}' not found")]
    NotFound { metric: String },

    /// A rule already exists for the metric.
    #[error("aggregation rule for metric '{metric}' already exists")]
    AlreadyExists { metric: String },

    /// The backend could not be reached or failed server-side.
    #[error("rule service unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend refused the request.
    #[error("rule service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The backend answered with something that is not a rule.
    #[error("invalid response from rule service: {reason}")]
    InvalidResponse { reason: String },
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(metric: impl Into<String>) -> Self {
        Self::NotFound {
            metric: metric.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(metric: impl Into<String>) -> Self {
        Self::AlreadyExists {
            metric: metric.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a rejected error.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Check if the rule is known not to exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the call may succeed when repeated.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// A `match_type` string outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown match type '{0}', expected one of \"\", \"prefix\", \"suffix\", \"exact\"")]
pub struct UnknownMatchType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("http_requests_total");
        assert!(err.to_string().contains("http_requests_total"));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let err = StoreError::unavailable("connection reset");
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_rejected_display() {
        let err = StoreError::rejected(400, "bad aggregation");
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("bad aggregation"));
    }
}

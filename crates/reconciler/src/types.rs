//! Outcomes and warnings returned by lifecycle operations.

use std::fmt;

use crate::record::RuleRecord;

/// Non-fatal condition attached to a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The rule could not be read back; local state for it should be dropped.
    Drift { metric: String, reason: String },
    /// Create found an existing rule and updated it in place.
    AutoImportAdopted { metric: String },
}

impl Warning {
    /// Create a drift warning.
    pub fn drift(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Drift {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Create an auto-import adoption warning.
    pub fn auto_import_adopted(metric: impl Into<String>) -> Self {
        Self::AutoImportAdopted {
            metric: metric.into(),
        }
    }

    /// Metric the warning is about.
    pub fn metric(&self) -> &str {
        match self {
            Self::Drift { metric, .. } | Self::AutoImportAdopted { metric } => metric,
        }
    }

    /// One-line headline.
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::Drift { .. } => "Unable to read aggregation rule",
            Self::AutoImportAdopted { .. } => "Existing aggregation rule for metric found",
        }
    }

    /// Longer explanation for the operator.
    pub fn detail(&self) -> String {
        match self {
            Self::Drift { metric, reason } => format!(
                "{reason}; the rule for metric '{metric}' was removed from local state"
            ),
            Self::AutoImportAdopted { metric } => format!(
                "The existing rule for metric '{metric}' has been updated and imported \
                 into local state; no aggregation rule has been created."
            ),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.summary(), self.detail())
    }
}

/// Result of a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// New local state.
    pub record: RuleRecord,
    /// Warnings raised on the way.
    pub warnings: Vec<Warning>,
}

impl Applied {
    /// Create an outcome without warnings.
    pub const fn new(record: RuleRecord) -> Self {
        Self {
            record,
            warnings: Vec::new(),
        }
    }

    /// Attach warnings.
    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = Warning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// New local state, or `None` when the local record should be dropped.
    pub state: Option<RuleRecord>,
    /// Warnings raised on the way.
    pub warnings: Vec<Warning>,
}

impl ReadOutcome {
    /// The rule exists remotely.
    pub const fn present(record: RuleRecord) -> Self {
        Self {
            state: Some(record),
            warnings: Vec::new(),
        }
    }

    /// The rule is gone remotely.
    pub fn absent(warning: Warning) -> Self {
        Self {
            state: None,
            warnings: vec![warning],
        }
    }

    /// Whether the local record should be dropped.
    pub const fn is_absent(&self) -> bool {
        self.state.is_none()
    }
}

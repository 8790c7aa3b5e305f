//! Local rule records and their conversion to and from the store's rule shape.

use chrono::{DateTime, Utc};
use rulesync_core::{MatchType, Rule};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Record fields the rule service never sees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalFields {
    /// Adopt an existing remote rule on create instead of failing.
    #[serde(default)]
    pub auto_import: bool,

    /// When the rule was last written by a create or update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl LocalFields {
    /// Merge local fields after reading a rule back from the store.
    ///
    /// `observed` comes from the store conversion and holds defaults. Every
    /// local-only field picks its source here and nowhere else.
    pub fn merged_on_read(prior: &Self, observed: &Self) -> Self {
        Self {
            auto_import: prior.auto_import,
            last_updated: observed.last_updated,
        }
    }
}

/// The locally persisted mirror of one aggregation rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleRecord {
    pub metric: String,

    #[serde(default)]
    pub match_type: String,

    #[serde(default)]
    pub drop: bool,

    #[serde(default)]
    pub keep_labels: Vec<String>,

    #[serde(default)]
    pub drop_labels: Vec<String>,

    #[serde(default)]
    pub aggregations: Vec<String>,

    #[serde(default)]
    pub aggregation_interval: String,

    #[serde(default)]
    pub aggregation_delay: String,

    #[serde(flatten)]
    pub local: LocalFields,
}

impl RuleRecord {
    /// A record that only knows its metric; the seed of an import.
    pub fn seed(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_match_type(mut self, match_type: impl Into<String>) -> Self {
        self.match_type = match_type.into();
        self
    }

    #[must_use]
    pub const fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    #[must_use]
    pub fn with_keep_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_drop_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_aggregations<I, S>(mut self, aggregations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregations = aggregations.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_aggregation_interval(mut self, interval: impl Into<String>) -> Self {
        self.aggregation_interval = interval.into();
        self
    }

    #[must_use]
    pub fn with_aggregation_delay(mut self, delay: impl Into<String>) -> Self {
        self.aggregation_delay = delay.into();
        self
    }

    #[must_use]
    pub const fn with_auto_import(mut self, auto_import: bool) -> Self {
        self.local.auto_import = auto_import;
        self
    }

    #[must_use]
    pub fn with_local(mut self, local: LocalFields) -> Self {
        self.local = local;
        self
    }

    /// Set `last_updated`.
    #[must_use]
    pub const fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.local.last_updated = Some(at);
        self
    }

    /// Build the store request for this record, dropping local-only fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] when `match_type` is not one of
    /// `""`, `prefix`, `suffix` or `exact`.
    pub fn to_rule(&self) -> Result<Rule> {
        let match_type = self
            .match_type
            .parse::<MatchType>()
            .map_err(|e| Error::invalid_record(&self.metric, e.to_string()))?;

        Ok(Rule {
            metric: self.metric.clone(),
            match_type,
            drop: self.drop,
            keep_labels: self.keep_labels.clone(),
            drop_labels: self.drop_labels.clone(),
            aggregations: self.aggregations.clone(),
            aggregation_interval: self.aggregation_interval.clone(),
            aggregation_delay: self.aggregation_delay.clone(),
        })
    }

    /// Build a record from a store response. Local-only fields are left at
    /// their defaults.
    pub fn from_rule(rule: Rule) -> Self {
        Self {
            metric: rule.metric,
            match_type: rule.match_type.as_str().to_string(),
            drop: rule.drop,
            keep_labels: rule.keep_labels,
            drop_labels: rule.drop_labels,
            aggregations: rule.aggregations,
            aggregation_interval: rule.aggregation_interval,
            aggregation_delay: rule.aggregation_delay,
            local: LocalFields::default(),
        }
    }

    /// Compare the fields the store knows about, ignoring local-only ones.
    pub fn same_remote_shape(&self, other: &Self) -> bool {
        self.metric == other.metric
            && self.match_type == other.match_type
            && self.drop == other.drop
            && self.keep_labels == other.keep_labels
            && self.drop_labels == other.drop_labels
            && self.aggregations == other.aggregations
            && self.aggregation_interval == other.aggregation_interval
            && self.aggregation_delay == other.aggregation_delay
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self::from_rule(rule)
    }
}

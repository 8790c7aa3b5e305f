//! The aggregation rule as the remote service knows it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnknownMatchType;

/// How a rule's `metric` is matched against incoming metric names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchType {
    /// Not set; the service applies exact matching.
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "prefix")]
    Prefix,
    #[serde(rename = "suffix")]
    Suffix,
    #[serde(rename = "exact")]
    Exact,
}

impl MatchType {
    /// Wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Exact => "exact",
        }
    }

    /// Whether this behaves as an exact match.
    pub const fn is_exact(self) -> bool {
        matches!(self, Self::Unspecified | Self::Exact)
    }
}

impl FromStr for MatchType {
    type Err = UnknownMatchType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Unspecified),
            "prefix" => Ok(Self::Prefix),
            "suffix" => Ok(Self::Suffix),
            "exact" => Ok(Self::Exact),
            other => Err(UnknownMatchType(other.to_string())),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An aggregation rule, identified by `metric`.
///
/// List fields always serialize, as an empty array when they have no entries.
/// The service may omit or null any field but `metric`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rule {
    pub metric: String,

    #[serde(default)]
    pub match_type: MatchType,

    #[serde(default)]
    pub drop: bool,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub keep_labels: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub drop_labels: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub aggregations: Vec<String>,

    #[serde(default)]
    pub aggregation_interval: String,

    #[serde(default)]
    pub aggregation_delay: String,
}

impl Rule {
    /// Create a rule for a metric with every other field at its default.
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
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
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

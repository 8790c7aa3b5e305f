//! Desired rules, loaded from `rules.toml`.
//!
//! ```toml
//! [[rules]]
//! name = "requests"            # optional, defaults to the metric
//! metric = "http_requests_total"
//! match_type = "exact"
//! drop_labels = ["pod"]
//! aggregations = ["sum"]
//! auto_import = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rulesync_core::{MatchType, Rule};
use rulesync_reconciler::RuleRecord;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<DesiredRule>,
}

/// One `[[rules]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RuleEntry")]
pub struct DesiredRule {
    /// Instance name; the metric when absent.
    pub name: Option<String>,
    pub auto_import: bool,
    pub rule: Rule,
}

/// Wire shape of a `[[rules]]` entry. Spelled out field by field since
/// unknown keys must be rejected and `flatten` would swallow them.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    auto_import: bool,
    metric: String,
    #[serde(default)]
    match_type: MatchType,
    #[serde(default)]
    drop: bool,
    #[serde(default)]
    keep_labels: Vec<String>,
    #[serde(default)]
    drop_labels: Vec<String>,
    #[serde(default)]
    aggregations: Vec<String>,
    #[serde(default)]
    aggregation_interval: String,
    #[serde(default)]
    aggregation_delay: String,
}

impl From<RuleEntry> for DesiredRule {
    fn from(entry: RuleEntry) -> Self {
        Self {
            name: entry.name,
            auto_import: entry.auto_import,
            rule: Rule {
                metric: entry.metric,
                match_type: entry.match_type,
                drop: entry.drop,
                keep_labels: entry.keep_labels,
                drop_labels: entry.drop_labels,
                aggregations: entry.aggregations,
                aggregation_interval: entry.aggregation_interval,
                aggregation_delay: entry.aggregation_delay,
            },
        }
    }
}

impl DesiredRule {
    /// Instance name this entry is tracked under.
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.rule.metric)
    }

    /// The record to hand to the reconciler.
    pub fn to_record(&self) -> RuleRecord {
        RuleRecord::from_rule(self.rule.clone()).with_auto_import(self.auto_import)
    }
}

/// Desired records keyed by instance name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    rules: BTreeMap<String, RuleRecord>,
}

impl DesiredState {
    /// Load the rules file at `path`.
    ///
    /// # Errors
    ///
    /// I/O failures, TOML errors and duplicate instance names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content).map_err(|e| match e {
            Error::InvalidConfig { reason, .. } => Error::invalid_config(path, reason),
            other => other,
        })
    }

    /// Parse rules file content.
    ///
    /// # Errors
    ///
    /// TOML errors and duplicate instance names.
    pub fn parse(content: &str) -> Result<Self> {
        let file: RulesFile =
            toml::from_str(content).map_err(|e| Error::invalid_config("<rules>", e.to_string()))?;
        Self::from_rules(file.rules)
    }

    /// Build from parsed entries.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateName`] when two entries resolve to the same name.
    pub fn from_rules(entries: impl IntoIterator<Item = DesiredRule>) -> Result<Self> {
        entries
            .into_iter()
            .try_fold(BTreeMap::new(), |mut rules, entry| {
                let name = entry.instance_name().to_string();
                if rules.contains_key(&name) {
                    return Err(Error::DuplicateName { name });
                }
                rules.insert(name, entry.to_record());
                Ok(rules)
            })
            .map(|rules| Self { rules })
    }

    pub fn get(&self, name: &str) -> Option<&RuleRecord> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RuleRecord)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_defaults_name_to_metric() -> TestResult {
        let desired = DesiredState::parse(
            r#"
            [[rules]]
            metric = "up"
            aggregations = ["sum"]

            [[rules]]
            name = "requests"
            metric = "http_requests_total"
            match_type = "exact"
            auto_import = true
            "#,
        )?;

        assert_eq!(desired.len(), 2);
        let up = desired.get("up").ok_or("missing up")?;
        assert_eq!(up.aggregations, vec!["sum"]);
        assert!(!up.local.auto_import);

        let requests = desired.get("requests").ok_or("missing requests")?;
        assert_eq!(requests.metric, "http_requests_total");
        assert_eq!(requests.match_type, "exact");
        assert!(requests.local.auto_import);
        assert_eq!(requests.local.last_updated, None);
        Ok(())
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = DesiredState::parse(
            r#"
            [[rules]]
            metric = "up"

            [[rules]]
            name = "up"
            metric = "other"
            "#,
        );

        assert!(matches!(result, Err(Error::DuplicateName { name }) if name == "up"));
    }

    #[test]
    fn test_unknown_match_type_rejected() {
        let result = DesiredState::parse(
            r#"
            [[rules]]
            metric = "up"
            match_type = "glob"
            "#,
        );

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_misspelled_key_rejected() {
        let result = DesiredState::parse(
            r#"
            [[rules]]
            metric = "up"
            aggregation = ["sum"]
            "#,
        );

        assert!(
            matches!(result, Err(Error::InvalidConfig { ref reason, .. }) if reason.contains("aggregation"))
        );
    }

    #[test]
    fn test_empty_file_is_empty_state() -> TestResult {
        assert!(DesiredState::parse("")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_reports_path() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "[[rules]]\nname = 3")?;

        let result = DesiredState::load(file.path());

        assert!(
            matches!(result, Err(Error::InvalidConfig { ref path, .. }) if path == file.path())
        );
        Ok(())
    }
}

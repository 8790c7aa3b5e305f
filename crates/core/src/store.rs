//! Rule store trait and implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::rule::Rule;

/// Remote capability that holds aggregation rules, keyed by metric.
///
/// Retry, backoff and rate limiting belong to implementations; callers see
/// one terminal result per call.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Create a rule. Fails if one already exists for the metric.
    async fn create(&self, rule: &Rule) -> StoreResult<()>;

    /// Fetch the rule for a metric.
    async fn read(&self, metric: &str) -> StoreResult<Rule>;

    /// Replace the rule stored under `rule.metric`.
    async fn update(&self, rule: &Rule) -> StoreResult<()>;

    /// Remove the rule stored under `rule.metric`.
    async fn delete(&self, rule: &Rule) -> StoreResult<()>;
}

/// Store operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One call observed by [`InMemoryRuleStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub metric: String,
}

impl StoreCall {
    /// Create a call record.
    pub fn new(op: StoreOp, metric: impl Into<String>) -> Self {
        Self {
            op,
            metric: metric.into(),
        }
    }
}

/// In-memory rule store for testing.
///
/// Behaves like the remote service (conflict on duplicate create, not found
/// on missing metric), logs every call in order, and can be told to fail the
/// next call of a given kind.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<String, Rule>>,
    calls: RwLock<Vec<StoreCall>>,
    failures: RwLock<HashMap<StoreOp, StoreError>>,
}

impl InMemoryRuleStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty in-memory store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a store that already holds the given rules.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| (rule.metric.clone(), rule))
            .collect();
        Self {
            rules: RwLock::new(rules),
            ..Self::default()
        }
    }

    /// Put a rule in place without recording a call.
    pub async fn insert(&self, rule: Rule) {
        self.rules.write().await.insert(rule.metric.clone(), rule);
    }

    /// Get the stored rule for a metric, without recording a call.
    pub async fn get(&self, metric: &str) -> Option<Rule> {
        self.rules.read().await.get(metric).cloned()
    }

    /// Number of stored rules.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    /// Whether the store holds no rules.
    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }

    /// Every call made so far, oldest first.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    /// Kinds of every call made so far, oldest first.
    pub async fn ops(&self) -> Vec<StoreOp> {
        self.calls.read().await.iter().map(|c| c.op).collect()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Make the next call of kind `op` fail with `error`.
    pub async fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.failures.write().await.insert(op, error);
    }

    async fn record(&self, op: StoreOp, metric: &str) -> StoreResult<()> {
        self.calls.write().await.push(StoreCall::new(op, metric));
        match self.failures.write().await.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn create(&self, rule: &Rule) -> StoreResult<()> {
        self.record(StoreOp::Create, &rule.metric).await?;

        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.metric) {
            return Err(StoreError::already_exists(&rule.metric));
        }
        rules.insert(rule.metric.clone(), rule.clone());
        Ok(())
    }

    async fn read(&self, metric: &str) -> StoreResult<Rule> {
        self.record(StoreOp::Read, metric).await?;

        self.rules
            .read()
            .await
            .get(metric)
            .cloned()
            .ok_or_else(|| StoreError::not_found(metric))
    }

    async fn update(&self, rule: &Rule) -> StoreResult<()> {
        self.record(StoreOp::Update, &rule.metric).await?;

        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.metric) {
            Some(existing) => {
                *existing = rule.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(&rule.metric)),
        }
    }

    async fn delete(&self, rule: &Rule) -> StoreResult<()> {
        self.record(StoreOp::Delete, &rule.metric).await?;

        self.rules
            .write()
            .await
            .remove(&rule.metric)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(&rule.metric))
    }
}

/// A wrapper that adds tracing to a rule store.
pub struct TracingRuleStore<S: RuleStore> {
    inner: S,
}

impl<S: RuleStore> TracingRuleStore<S> {
    /// Create a new tracing rule store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Get the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RuleStore> RuleStore for TracingRuleStore<S> {
    async fn create(&self, rule: &Rule) -> StoreResult<()> {
        tracing::debug!(metric = %rule.metric, "Creating aggregation rule");
        let result = self.inner.create(rule).await;
        if let Err(ref e) = result {
            tracing::debug!(metric = %rule.metric, error = %e, "Create call failed");
        }
        result
    }

    async fn read(&self, metric: &str) -> StoreResult<Rule> {
        tracing::debug!(metric = %metric, "Reading aggregation rule");
        let result = self.inner.read(metric).await;
        if let Err(ref e) = result {
            tracing::debug!(metric = %metric, error = %e, "Read call failed");
        }
        result
    }

    async fn update(&self, rule: &Rule) -> StoreResult<()> {
        tracing::debug!(metric = %rule.metric, "Updating aggregation rule");
        let result = self.inner.update(rule).await;
        if let Err(ref e) = result {
            tracing::debug!(metric = %rule.metric, error = %e, "Update call failed");
        }
        result
    }

    async fn delete(&self, rule: &Rule) -> StoreResult<()> {
        tracing::debug!(metric = %rule.metric, "Deleting aggregation rule");
        let result = self.inner.delete(rule).await;
        if let Err(ref e) = result {
            tracing::debug!(metric = %rule.metric, error = %e, "Delete call failed");
        }
        result
    }
}

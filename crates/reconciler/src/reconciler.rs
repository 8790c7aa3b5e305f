//! Reconciler implementation.

use std::sync::Arc;

use rulesync_core::{Rule, RuleStore};
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, ReplaceStage, Result};
use crate::record::{LocalFields, RuleRecord};
use crate::types::{Applied, ReadOutcome, Warning};

/// Configuration for the reconciler.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Only a definite "not found" from the auto-import probe leads to a
    /// create. Any other read failure fails the create instead of being
    /// folded into "does not exist yet".
    pub strict_import_probe: bool,
}

/// Drives one aggregation rule through create, read, update, delete and import.
///
/// Holds no per-rule state: every call works only from the records it is
/// given and what the store reports.
pub struct Reconciler {
    /// Remote rule store.
    store: Arc<dyn RuleStore>,
    /// Source of `last_updated` stamps.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        store: Arc<dyn RuleStore>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create a reconciler stamping records with the wall clock.
    pub fn with_system_clock(store: Arc<dyn RuleStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), ReconcilerConfig::default())
    }

    /// Start a builder.
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Create the rule described by `desired`.
    ///
    /// With `auto_import` set, an existing rule for the metric is updated in
    /// place and a [`Warning::AutoImportAdopted`] is returned.
    ///
    /// # Errors
    ///
    /// [`Error::CreateFailed`] or, on the adoption path,
    /// [`Error::UpdateFailed`]. [`Error::InvalidRecord`] before any store
    /// call when the record does not convert.
    #[instrument(skip_all, fields(metric = %desired.metric))]
    pub async fn create(&self, desired: RuleRecord) -> Result<Applied> {
        let rule = desired.to_rule()?;

        let warnings = if desired.local.auto_import {
            self.create_or_adopt(&rule).await?
        } else {
            debug!(metric = %rule.metric, "Creating aggregation rule");
            self.create_rule(&rule).await?;
            None
        };

        info!(metric = %rule.metric, adopted = warnings.is_some(), "Aggregation rule created");
        Ok(Applied::new(desired.stamped(self.clock.now())).with_warnings(warnings))
    }

    async fn create_or_adopt(&self, rule: &Rule) -> Result<Option<Warning>> {
        match self.store.read(&rule.metric).await {
            Ok(_) => {
                debug!(metric = %rule.metric, "Existing rule found, adopting it");
                self.store
                    .update(rule)
                    .await
                    .map_err(|e| log_failure(Error::update_failed(&rule.metric, e)))?;

                let warning = Warning::auto_import_adopted(&rule.metric);
                warn!(metric = %rule.metric, "{}", warning.summary());
                Ok(Some(warning))
            }
            Err(e) if self.config.strict_import_probe && !e.is_not_found() => {
                Err(log_failure(Error::create_failed(&rule.metric, e)))
            }
            Err(e) => {
                debug!(metric = %rule.metric, probe = %e, "No existing rule, creating");
                self.create_rule(rule).await?;
                Ok(None)
            }
        }
    }

    async fn create_rule(&self, rule: &Rule) -> Result<()> {
        self.store
            .create(rule)
            .await
            .map_err(|e| log_failure(Error::create_failed(&rule.metric, e)))
    }

    /// Refresh `prior` from the store.
    ///
    /// A failed read is drift, not an error: the outcome carries no state and
    /// a [`Warning::Drift`]. On success the fetched rule is merged with the
    /// local-only fields of `prior`.
    #[instrument(skip_all, fields(metric = %prior.metric))]
    pub async fn read(&self, prior: &RuleRecord) -> ReadOutcome {
        match self.store.read(&prior.metric).await {
            Ok(rule) => {
                let observed = RuleRecord::from_rule(rule);
                let local = LocalFields::merged_on_read(&prior.local, &observed.local);
                debug!(metric = %prior.metric, "Aggregation rule refreshed");
                ReadOutcome::present(observed.with_local(local))
            }
            Err(e) => {
                let warning = Warning::drift(&prior.metric, e.to_string());
                warn!(metric = %prior.metric, error = %e, "{}", warning.summary());
                ReadOutcome::absent(warning)
            }
        }
    }

    /// Move the rule from `prior` to `plan`.
    ///
    /// Same metric updates in place. A different metric is a replace: delete
    /// the prior rule, then create the planned one.
    ///
    /// # Errors
    ///
    /// [`Error::UpdateFailed`] for an in-place update, [`Error::ReplaceFailed`]
    /// for either half of a replace. A failure on the create half is partial,
    /// see [`Error::is_partial`].
    #[instrument(skip_all, fields(metric = %plan.metric, prior = %prior.metric))]
    pub async fn update(&self, plan: RuleRecord, prior: &RuleRecord) -> Result<Applied> {
        let rule = plan.to_rule()?;

        if plan.metric == prior.metric {
            debug!(metric = %rule.metric, "Updating aggregation rule in place");
            self.store
                .update(&rule)
                .await
                .map_err(|e| log_failure(Error::update_failed(&rule.metric, e)))?;
            info!(metric = %rule.metric, "Aggregation rule updated");
        } else {
            self.replace(&prior.to_rule()?, &rule).await?;
            info!(from = %prior.metric, to = %rule.metric, "Aggregation rule replaced");
        }

        Ok(Applied::new(plan.stamped(self.clock.now())))
    }

    async fn replace(&self, old: &Rule, new: &Rule) -> Result<()> {
        debug!(from = %old.metric, to = %new.metric, "Metric changed, replacing rule");

        self.store.delete(old).await.map_err(|e| {
            log_failure(Error::replace_failed(
                &old.metric,
                &new.metric,
                ReplaceStage::Delete,
                e,
            ))
        })?;

        self.store.create(new).await.map_err(|e| {
            log_failure(Error::replace_failed(
                &old.metric,
                &new.metric,
                ReplaceStage::Create,
                e,
            ))
        })
    }

    /// Delete the rule behind `state`. The caller drops the record on success.
    ///
    /// # Errors
    ///
    /// [`Error::DeleteFailed`] when the store call fails.
    #[instrument(skip_all, fields(metric = %state.metric))]
    pub async fn delete(&self, state: &RuleRecord) -> Result<()> {
        let rule = state.to_rule()?;

        self.store
            .delete(&rule)
            .await
            .map_err(|e| log_failure(Error::delete_failed(&rule.metric, e)))?;

        info!(metric = %rule.metric, "Aggregation rule deleted");
        Ok(())
    }

    /// Seed a record for importing an existing rule. Follow with [`Self::read`].
    pub fn import(&self, id: &str) -> RuleRecord {
        debug!(metric = %id, "Importing aggregation rule");
        RuleRecord::seed(id)
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

fn log_failure(err: Error) -> Error {
    if err.is_partial() {
        error!(error = %err, "Replace left no rule behind");
    } else {
        error!(error = %err, "Aggregation rule operation failed");
    }
    err
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn RuleStore>>,
    clock: Option<Arc<dyn Clock>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the rule store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RuleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable the strict auto-import probe.
    #[must_use]
    pub const fn strict_import_probe(mut self, enabled: bool) -> Self {
        self.config.strict_import_probe = enabled;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when no store was set.
    pub fn build(self) -> Result<Reconciler> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("Rule store is required"))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Reconciler::new(store, clock, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

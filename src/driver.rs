//! Sequences reconciler calls over every managed instance and keeps the
//! state file current.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rulesync_reconciler::{Reconciler, Warning};
use tracing::{info, warn};

use crate::desired::DesiredState;
use crate::error::{Error, Result};
use crate::plan::{Action, Plan};
use crate::state::StateFile;

/// Result of a run that may stop part way through.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Store-changing actions that completed.
    pub applied: usize,
    pub warnings: Vec<Warning>,
    /// The error that stopped the run, if any. State saved before it stands.
    pub failure: Option<Error>,
}

impl Outcome {
    /// Turn the outcome into a result, dropping the warnings.
    ///
    /// # Errors
    ///
    /// The stored failure, if any.
    pub fn into_result(self) -> Result<usize> {
        self.failure.map_or(Ok(self.applied), Err)
    }
}

/// Drives one [`Reconciler`] against a state file. Calls run one at a time.
pub struct Driver {
    reconciler: Reconciler,
    state_path: PathBuf,
}

impl Driver {
    pub fn new(reconciler: Reconciler, state_path: impl Into<PathBuf>) -> Self {
        Self {
            reconciler,
            state_path: state_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Load the state file.
    ///
    /// # Errors
    ///
    /// See [`StateFile::load`].
    pub fn load_state(&self) -> Result<StateFile> {
        StateFile::load(&self.state_path)
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        state.save(&self.state_path)
    }

    /// Read every instance back from the store. Drifted instances are
    /// dropped from the returned state.
    pub async fn refresh_state(&self, state: StateFile) -> (StateFile, Vec<Warning>) {
        let mut refreshed = StateFile {
            version: state.version,
            rules: BTreeMap::new(),
        };
        let mut warnings = Vec::new();

        for (name, prior) in &state.rules {
            let outcome = self.reconciler.read(prior).await;
            warnings.extend(outcome.warnings);
            match outcome.state {
                Some(record) => refreshed.insert(name.clone(), record),
                None => warn!(instance = %name, "Dropping drifted instance from state"),
            }
        }

        (refreshed, warnings)
    }

    /// Refresh and persist state.
    ///
    /// # Errors
    ///
    /// State load or save failures.
    pub async fn refresh(&self) -> Result<(StateFile, Vec<Warning>)> {
        let (state, warnings) = self.refresh_state(self.load_state()?).await;
        self.save(&state)?;
        Ok((state, warnings))
    }

    /// Compute the plan without changing the store or the state file.
    ///
    /// # Errors
    ///
    /// State load failures.
    pub async fn plan(&self, desired: &DesiredState) -> Result<(Plan, Vec<Warning>)> {
        let (state, warnings) = self.refresh_state(self.load_state()?).await;
        Ok((Plan::build(desired, &state), warnings))
    }

    /// Refresh, plan, and execute until done or the first failure.
    ///
    /// # Errors
    ///
    /// State load or save failures before any action runs. Action failures
    /// are reported in [`Outcome::failure`].
    pub async fn apply(&self, desired: &DesiredState) -> Result<Outcome> {
        let (mut state, warnings) = self.refresh().await?;
        let plan = Plan::build(desired, &state);
        let mut outcome = Outcome {
            warnings,
            ..Outcome::default()
        };

        for action in plan.changes() {
            if let Err(e) = self.execute(action, &mut state, &mut outcome).await {
                warn!(instance = %action.name(), error = %e, "Apply stopped");
                outcome.failure = Some(e);
                break;
            }
            outcome.applied = outcome.applied.saturating_add(1);
        }

        info!(applied = outcome.applied, failed = outcome.failure.is_some(), "Apply finished");
        Ok(outcome)
    }

    async fn execute(
        &self,
        action: &Action,
        state: &mut StateFile,
        outcome: &mut Outcome,
    ) -> Result<()> {
        match action {
            Action::Create { name, desired } => {
                let applied = self
                    .reconciler
                    .create(desired.clone())
                    .await
                    .map_err(|e| Error::reconcile(name, e))?;
                outcome.warnings.extend(applied.warnings);
                state.insert(name.clone(), applied.record);
            }
            Action::Update {
                name,
                prior,
                desired,
            } => {
                // a partial replace leaves the prior record in place; the next
                // refresh sees it as drift and the next apply recreates it
                let applied = self
                    .reconciler
                    .update(desired.clone(), prior)
                    .await
                    .map_err(|e| Error::reconcile(name, e))?;
                outcome.warnings.extend(applied.warnings);
                state.insert(name.clone(), applied.record);
            }
            Action::Delete { name, prior } => {
                self.reconciler
                    .delete(prior)
                    .await
                    .map_err(|e| Error::reconcile(name, e))?;
                state.remove(name);
            }
            Action::NoOp { .. } => return Ok(()),
        }

        self.save(state)
    }

    /// Adopt the existing rule for `metric` as instance `name`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyManaged`] when `name` is in state,
    /// [`Error::ImportNotFound`] when the rule cannot be read, and state
    /// load or save failures.
    pub async fn import(&self, name: &str, metric: &str) -> Result<()> {
        let mut state = self.load_state()?;
        if state.get(name).is_some() {
            return Err(Error::AlreadyManaged {
                name: name.to_string(),
            });
        }

        let seed = self.reconciler.import(metric);
        let record = self
            .reconciler
            .read(&seed)
            .await
            .state
            .ok_or_else(|| Error::ImportNotFound {
                name: name.to_string(),
                metric: metric.to_string(),
            })?;

        state.insert(name, record);
        self.save(&state)?;
        info!(instance = %name, metric = %metric, "Rule imported");
        Ok(())
    }

    /// Delete every managed instance.
    ///
    /// # Errors
    ///
    /// State load or save failures before any delete runs. Delete failures
    /// are reported in [`Outcome::failure`].
    pub async fn destroy(&self) -> Result<Outcome> {
        let (mut state, warnings) = self.refresh().await?;
        let mut outcome = Outcome {
            warnings,
            ..Outcome::default()
        };

        let doomed: Vec<_> = state.rules.clone().into_iter().collect();
        for (name, prior) in doomed {
            let result = match self.reconciler.delete(&prior).await {
                Ok(()) => {
                    state.remove(&name);
                    self.save(&state)
                }
                Err(e) => Err(Error::reconcile(&name, e)),
            };
            if let Err(e) = result {
                outcome.failure = Some(e);
                break;
            }
            outcome.applied = outcome.applied.saturating_add(1);
        }

        Ok(outcome)
    }
}

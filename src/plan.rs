//! Diff desired rules against refreshed state.

use std::fmt;

use rulesync_reconciler::RuleRecord;

use crate::desired::DesiredState;
use crate::state::StateFile;

/// What to do with one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create {
        name: String,
        desired: RuleRecord,
    },
    /// Update in place, or replace when the metric changed.
    Update {
        name: String,
        prior: RuleRecord,
        desired: RuleRecord,
    },
    Delete {
        name: String,
        prior: RuleRecord,
    },
    NoOp {
        name: String,
    },
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name, .. }
            | Self::Update { name, .. }
            | Self::Delete { name, .. }
            | Self::NoOp { name } => name,
        }
    }

    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }

    /// True for an update that must delete and recreate the rule.
    pub fn is_replace(&self) -> bool {
        matches!(self, Self::Update { prior, desired, .. } if prior.metric != desired.metric)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { name, desired } => write!(f, "+ {name} ({})", desired.metric),
            Self::Update {
                name,
                prior,
                desired,
            } if prior.metric != desired.metric => {
                write!(f, "-/+ {name} ({} -> {})", prior.metric, desired.metric)
            }
            Self::Update { name, desired, .. } => write!(f, "~ {name} ({})", desired.metric),
            Self::Delete { name, prior } => write!(f, "- {name} ({})", prior.metric),
            Self::NoOp { name } => write!(f, "  {name}"),
        }
    }
}

/// Ordered actions: desired instances by name, then deletes by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    /// Build the plan for `desired` against already refreshed `state`.
    pub fn build(desired: &DesiredState, state: &StateFile) -> Self {
        let upserts = desired.iter().map(|(name, wanted)| match state.get(name) {
            None => Action::Create {
                name: name.clone(),
                desired: wanted.clone(),
            },
            Some(prior)
                if prior.same_remote_shape(wanted)
                    && prior.local.auto_import == wanted.local.auto_import =>
            {
                Action::NoOp { name: name.clone() }
            }
            Some(prior) => Action::Update {
                name: name.clone(),
                prior: prior.clone(),
                desired: wanted.clone(),
            },
        });

        let deletes = state
            .rules
            .iter()
            .filter(|(name, _)| !desired.contains(name))
            .map(|(name, prior)| Action::Delete {
                name: name.clone(),
                prior: prior.clone(),
            });

        Self {
            actions: upserts.chain(deletes).collect(),
        }
    }

    /// Actions that touch the store.
    pub fn changes(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| !a.is_noop())
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    /// Counts as `(create, update, delete)`; a replace counts as an update.
    pub fn summary(&self) -> (usize, usize, usize) {
        self.actions
            .iter()
            .fold((0, 0, 0), |(c, u, d), action| match action {
                Action::Create { .. } => (c.saturating_add(1), u, d),
                Action::Update { .. } => (c, u.saturating_add(1), d),
                Action::Delete { .. } => (c, u, d.saturating_add(1)),
                Action::NoOp { .. } => (c, u, d),
            })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return writeln!(f, "No changes. Rules match the configuration.");
        }
        for action in self.changes() {
            writeln!(f, "{action}")?;
        }
        let (create, update, delete) = self.summary();
        writeln!(
            f,
            "Plan: {create} to create, {update} to update, {delete} to delete."
        )
    }
}

//! # rulesync-core
//!
//! Aggregation rule model and the storage capability the reconciler drives.
//!
//! - [`Rule`]: the remote entity, keyed by its metric name
//! - [`RuleStore`]: create/read/update/delete by metric against some backend
//! - [`InMemoryRuleStore`]: deterministic fake that records every call
//! - [`TracingRuleStore`]: logging decorator for any store

pub mod error;
pub mod rule;
pub mod store;

pub use error::{StoreError, StoreResult, UnknownMatchType};
pub use rule::{MatchType, Rule};
pub use store::{InMemoryRuleStore, RuleStore, StoreCall, StoreOp, TracingRuleStore};

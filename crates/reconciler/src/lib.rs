//! Lifecycle reconciliation for aggregation rules.
//!
//! A [`Reconciler`] takes a desired [`RuleRecord`] and/or the record last
//! persisted locally, talks to a [`rulesync_core::RuleStore`], and returns the
//! record to persist next.
//!
//! # Operations
//!
//! - `create` - create the rule, or adopt an existing one when `auto_import` is set
//! - `read` - refresh from the store; a missing rule is drift, not an error
//! - `update` - update in place, or delete then create when the metric changed
//! - `delete` - remove the rule
//! - `import` - seed a record from a metric name for a following `read`
//!
//! # Local-only fields
//!
//! `auto_import` and `last_updated` never reach the store. They live in
//! [`LocalFields`] and are merged back on every read by
//! [`LocalFields::merged_on_read`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rulesync_core::InMemoryRuleStore;
//! use rulesync_reconciler::{Reconciler, RuleRecord};
//!
//! let reconciler = Reconciler::with_system_clock(Arc::new(InMemoryRuleStore::new()));
//!
//! let applied = reconciler
//!     .create(RuleRecord::seed("http_requests_total").with_aggregations(["sum"]))
//!     .await?;
//! let refreshed = reconciler.read(&applied.record).await;
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod clock;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod types;

// Re-export main types
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, ReplaceStage, Result};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use record::{LocalFields, RuleRecord};
pub use types::{Applied, ReadOutcome, Warning};

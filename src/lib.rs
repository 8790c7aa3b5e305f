#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # rulesync
//!
//! Command-line driver for the aggregation rule reconciler. It loads desired
//! rules from a TOML file, keeps a JSON state file, and runs one lifecycle
//! call at a time against the rule service.

pub mod cli;
pub mod commands;
pub mod desired;
pub mod driver;
pub mod error;
pub mod plan;
pub mod state;

pub use desired::{DesiredRule, DesiredState};
pub use driver::{Driver, Outcome};
pub use error::{Error, Result};
pub use plan::{Action, Plan};
pub use state::{STATE_VERSION, StateFile};

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # rulesync-client
//!
//! HTTP-backed [`rulesync_core::RuleStore`] for the adaptive metrics
//! aggregation rules API.
//!
//! ## Features
//!
//! - Optimistic concurrency through the ruleset `ETag` and `If-Match`
//! - Basic or bearer authentication
//! - Exponential backoff on unavailable responses
//! - Configuration from TOML/JSON files and `RULESYNC_*` environment variables
//!
//! ## Example
//!
//! ```ignore
//! use rulesync_client::{ClientConfig, HttpRuleStore};
//! use rulesync_core::RuleStore;
//!
//! let config = ClientConfig::with_url("https://metrics.example.com/".parse()?)
//!     .instance_id("123")
//!     .api_key("secret");
//! let store = HttpRuleStore::new(config)?;
//!
//! let rule = store.read("http_requests_total").await?;
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::HttpRuleStore;
pub use config::ClientConfig;
pub use error::{Error, Result};

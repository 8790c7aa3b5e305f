//! HTTP-backed rule store.
//!
//! Talks to the adaptive metrics aggregation rules API:
//!
//! - `GET /aggregations/rules` lists every rule and returns the ruleset `ETag`
//! - `POST|PUT|DELETE /aggregations/rule/{metric}` mutate one rule and must
//!   carry that `ETag` in `If-Match`

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use rulesync_core::{Rule, RuleStore, StoreError, StoreResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Rule store backed by the remote aggregation rules API.
#[derive(Debug, Clone)]
pub struct HttpRuleStore {
    /// Configuration for the client.
    config: Arc<ClientConfig>,
    /// API base URL, validated at construction.
    base_url: Url,
    /// HTTP client.
    http_client: reqwest::Client,
    /// Last ruleset `ETag` seen, shared between clones.
    etag: Arc<Mutex<Option<String>>>,
}

impl HttpRuleStore {
    /// Create a store from configuration.
    ///
    /// # Errors
    ///
    /// Fails when no URL is configured, the URL cannot hold a path, or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| Error::config_error("No base URL configured for the rule service"))?;

        if base_url.cannot_be_a_base() {
            return Err(Error::config_error(format!(
                "URL '{base_url}' cannot be used as an API base"
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http_client,
            etag: Arc::new(Mutex::new(None)),
        })
    }

    /// Create a store for a base URL with default settings.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_url(base_url: Url) -> Result<Self> {
        Self::new(ClientConfig::with_url(base_url))
    }

    /// List every rule the service holds. Entries that do not decode as a
    /// rule are logged and skipped.
    pub async fn list(&self) -> StoreResult<Vec<Rule>> {
        let entries = self.with_retry("list", true, || self.list_once()).await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                serde_json::from_value::<Rule>(entry)
                    .map_err(|e| warn!(error = %e, "Skipping undecodable rule entry"))
                    .ok()
            })
            .collect())
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::unavailable("rule service URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match (&self.config.instance_id, &self.config.api_key) {
            (Some(user), key) => builder.basic_auth(user, key.as_ref()),
            (None, Some(key)) => builder.bearer_auth(key),
            (None, None) => builder,
        }
    }

    /// Fetch the ruleset as raw entries so one odd rule cannot spoil reads
    /// of the others.
    async fn list_once(&self) -> StoreResult<Vec<serde_json::Value>> {
        let url = self.endpoint(["aggregations", "rules"])?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, None).await?;

        self.remember_etag(&response).await;

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| StoreError::invalid_response(e.to_string()))
    }

    /// Ruleset `ETag`, fetching the rule list when none is cached.
    async fn current_etag(&self) -> StoreResult<Option<String>> {
        if let Some(tag) = self.etag.lock().await.clone() {
            return Ok(Some(tag));
        }
        self.list_once().await?;
        Ok(self.etag.lock().await.clone())
    }

    async fn remember_etag(&self, response: &Response) {
        let tag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(tag) = tag {
            *self.etag.lock().await = Some(tag);
        }
    }

    async fn mutate(&self, method: Method, rule: &Rule) -> StoreResult<()> {
        let op = method.to_string();
        // a create the service committed before failing would conflict on retry
        let retry_unavailable = method != Method::POST;
        self.with_retry(&op, retry_unavailable, || {
            self.mutate_once(method.clone(), rule)
        })
        .await
    }

    async fn mutate_once(&self, method: Method, rule: &Rule) -> StoreResult<()> {
        let url = self.endpoint(["aggregations", "rule", rule.metric.as_str()])?;
        let etag = self.current_etag().await?;

        let mut builder = self.request(method.clone(), url);
        if method != Method::DELETE {
            builder = builder.json(rule);
        }
        if let Some(tag) = etag {
            builder = builder.header(IF_MATCH, tag);
        }

        let response = builder.send().await.map_err(transport_error)?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            debug!(metric = %rule.metric, "Ruleset ETag is stale, dropping it");
            self.etag.lock().await.take();
        }

        let response = check_status(response, Some(&rule.metric)).await?;
        self.remember_etag(&response).await;
        Ok(())
    }

    /// Run `call` until it succeeds, fails for good, or attempts run out.
    ///
    /// Unavailable errors back off exponentially when `retry_unavailable` is
    /// set; a stale `ETag` always retries at once since the cached tag has
    /// already been dropped.
    async fn with_retry<T, F, Fut>(
        &self,
        op: &str,
        retry_unavailable: bool,
        call: F,
    ) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let stale = is_stale_etag(&e);
                    let retryable = stale || (retry_unavailable && e.is_retryable());
                    if attempt >= max_attempts || !retryable {
                        return Err(e);
                    }

                    let delay = if stale {
                        std::time::Duration::ZERO
                    } else {
                        self.config
                            .retry_base_delay
                            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
                    };
                    info!(
                        op,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying rule service call"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl RuleStore for HttpRuleStore {
    async fn create(&self, rule: &Rule) -> StoreResult<()> {
        self.mutate(Method::POST, rule).await
    }

    async fn read(&self, metric: &str) -> StoreResult<Rule> {
        let entry = self
            .with_retry("list", true, || self.list_once())
            .await?
            .into_iter()
            .find(|entry| entry.get("metric").and_then(serde_json::Value::as_str) == Some(metric))
            .ok_or_else(|| StoreError::not_found(metric))?;

        serde_json::from_value(entry)
            .map_err(|e| StoreError::invalid_response(format!("rule '{metric}': {e}")))
    }

    async fn update(&self, rule: &Rule) -> StoreResult<()> {
        self.mutate(Method::PUT, rule).await
    }

    async fn delete(&self, rule: &Rule) -> StoreResult<()> {
        self.mutate(Method::DELETE, rule).await
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::invalid_response(e.to_string())
    } else {
        StoreError::unavailable(e.to_string())
    }
}

const fn is_stale_etag(e: &StoreError) -> bool {
    matches!(e, StoreError::Rejected { status: 412, .. })
}

/// Map a non-success response onto a store error.
async fn check_status(response: Response, metric: Option<&str>) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), metric = ?metric, "Rule service returned an error");

    match (status, metric) {
        (StatusCode::NOT_FOUND, Some(metric)) => Err(StoreError::not_found(metric)),
        (StatusCode::CONFLICT, Some(metric)) => Err(StoreError::already_exists(metric)),
        (s, _) if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => Err(
            StoreError::unavailable(format!("rule service returned {status}: {body}")),
        ),
        _ => Err(StoreError::rejected(status.as_u16(), body)),
    }
}

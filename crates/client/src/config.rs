//! Configuration for the rule service client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for [`crate::HttpRuleStore`].
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the adaptive metrics API.
    #[serde(default)]
    pub url: Option<Url>,

    /// API key, sent as the basic auth password (or bearer token when no
    /// instance ID is set).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Instance ID, sent as the basic auth user.
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Timeout for each request.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum attempts per store call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further attempt.
    #[serde(with = "duration_millis", default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            instance_id: None,
            timeout: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay: default_retry_base_delay(),
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("instance_id", &self.instance_id)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new config for the given API URL.
    pub fn with_url(url: Url) -> Self {
        Self {
            url: Some(url),
            ..Default::default()
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the instance ID.
    #[must_use]
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum attempts per call.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first retry delay.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay any `RULESYNC_*` environment variables onto this config.
    pub fn apply_env(&mut self) {
        if let Some(url) = env_var("RULESYNC_URL").and_then(|u| u.parse().ok()) {
            self.url = Some(url);
        }

        if let Some(key) = env_var("RULESYNC_API_KEY") {
            self.api_key = Some(key);
        }

        if let Some(id) = env_var("RULESYNC_INSTANCE_ID") {
            self.instance_id = Some(id);
        }

        if let Some(secs) = env_var("RULESYNC_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = env_var("RULESYNC_MAX_ATTEMPTS").and_then(|s| s.parse().ok()) {
            self.max_attempts = attempts;
        }
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;

        // JSON by extension, TOML otherwise
        if path.extension().is_some_and(|e| e == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            toml::from_str(&content).map_err(|e| {
                crate::error::Error::config_error(format!("Failed to parse config: {e}"))
            })
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_user_agent() -> String {
    format!("rulesync/{}", env!("CARGO_PKG_VERSION"))
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serialization helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

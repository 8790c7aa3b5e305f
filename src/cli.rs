//! CLI command definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rulesync_client::ClientConfig;
use url::Url;

/// rulesync - reconcile adaptive metrics aggregation rules
#[derive(Parser, Debug)]
#[command(name = "rulesync")]
#[command(version)]
#[command(about = "Keep adaptive metrics aggregation rules in sync with a rules file")]
#[command(
    long_about = "rulesync reads desired aggregation rules from a TOML file, compares them with the rule service, and creates, updates, replaces or deletes rules to match. Connection settings fall back to RULESYNC_* environment variables."
)]
pub struct Cli {
    /// Desired rules file
    #[arg(long, global = true, default_value = "rules.toml")]
    pub config: PathBuf,

    /// State file
    #[arg(long, global = true, default_value = ".rulesync/state.json")]
    pub state: PathBuf,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Only create on a not-found probe when auto-importing; other probe
    /// failures abort the create
    #[arg(long, global = true, default_value_t = false)]
    pub strict_import_probe: bool,

    /// Log at debug level unless RULESYNC_LOG or RUST_LOG is set
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection flags. Each one overrides its `RULESYNC_*` variable, which in
/// turn overrides the client config file.
#[derive(Args, Debug, Default)]
pub struct ClientArgs {
    /// Client config file (JSON by extension, TOML otherwise)
    #[arg(long, global = true)]
    pub client_config: Option<PathBuf>,

    /// Rule service base URL
    #[arg(long, global = true)]
    pub url: Option<Url>,

    /// API key
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Instance ID (basic auth user)
    #[arg(long, global = true)]
    pub instance_id: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

impl ClientArgs {
    /// Build the client config: file, then environment, then flags.
    ///
    /// # Errors
    ///
    /// The client config file cannot be read or parsed.
    pub fn resolve(&self) -> rulesync_client::Result<ClientConfig> {
        let mut config = match &self.client_config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        config.apply_env();
        self.apply(&mut config);
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(id) = &self.instance_id {
            config.instance_id = Some(id.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what apply would change
    Plan,

    /// Create, update, replace and delete rules to match the rules file
    Apply,

    /// Re-read every managed rule and rewrite the state file
    Refresh,

    /// Start managing an existing rule
    Import {
        /// Instance name to track the rule under
        name: String,

        /// Metric of the existing rule
        metric: String,
    },

    /// Delete every managed rule
    Destroy,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_import_with_flags() -> TestResult {
        let cli = Cli::try_parse_from([
            "rulesync",
            "import",
            "web",
            "http_requests_total",
            "--url",
            "https://metrics.example.com/",
            "--timeout-secs",
            "5",
        ])?;

        assert!(matches!(
            cli.command,
            Commands::Import { ref name, ref metric } if name == "web" && metric == "http_requests_total"
        ));
        assert_eq!(cli.config, PathBuf::from("rules.toml"));
        assert_eq!(cli.client.timeout_secs, Some(5));
        Ok(())
    }

    #[test]
    fn test_flags_override_config() -> TestResult {
        let mut config = ClientConfig::with_url("https://old.example.com/".parse()?).api_key("old");
        let args = ClientArgs {
            url: Some("https://new.example.com/".parse()?),
            timeout_secs: Some(7),
            ..ClientArgs::default()
        };

        args.apply(&mut config);

        assert_eq!(config.url.as_ref().map(Url::as_str), Some("https://new.example.com/"));
        assert_eq!(config.api_key.as_deref(), Some("old"));
        assert_eq!(config.timeout, Duration::from_secs(7));
        Ok(())
    }

    #[test]
    fn test_resolve_layers_file_under_flags() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "url = \"https://file.example.com/\"\nmax_attempts = 5\ntimeout = 9"
        )?;
        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "rulesync",
            "plan",
            "--client-config",
            path.as_str(),
            "--url",
            "https://flag.example.com/",
        ])?;

        let config = cli.client.resolve()?;

        assert_eq!(config.url.as_ref().map(Url::as_str), Some("https://flag.example.com/"));
        assert_eq!(config.max_attempts, 5);
        Ok(())
    }

    #[test]
    fn test_resolve_missing_file_fails() {
        let args = ClientArgs {
            client_config: Some(PathBuf::from("/nonexistent/rulesync-client.toml")),
            ..ClientArgs::default()
        };

        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

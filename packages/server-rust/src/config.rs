//! Router configuration, sourced from command-line flags or the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use evrouter_core::CommandFilter;

use crate::error::ConfigError;

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Top-level configuration of the router process.
#[derive(Debug, Clone, Parser)]
#[command(name = "evrouter", about = "Route store change notifications to compute functions")]
pub struct RouterConfig {
    /// Store host.
    #[arg(long, env = "REDIS_MASTER_HOST", default_value = "127.0.0.1")]
    pub store_host: String,

    /// Store port.
    #[arg(long, env = "REDIS_MASTER_PORT", default_value_t = 6379)]
    pub store_port: u16,

    /// Channel pattern to subscribe to.
    #[arg(long, env = "REDIS_SUB_CHANNEL", default_value = "__keyevent@0__:*")]
    pub channel_pattern: String,

    /// Key prefix of route-definition records; payloads starting with it are
    /// map-update signals.
    #[arg(long, env = "META_MAP_SUFFIX", default_value = "map:")]
    pub map_prefix: String,

    /// Comma-separated list of actionable store commands.
    #[arg(long, env = "SUPPORTED_COMMANDS", default_value = "")]
    pub supported_commands: String,

    /// Compute region of the invoked functions.
    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Invoke endpoint. Requests are sent unsigned, so this must be a signing
    /// proxy or a local runtime; startup fails without it.
    #[arg(long, env = "LAMBDA_ENDPOINT")]
    pub invoke_endpoint: Option<String>,

    /// Static function-config file seeded into the store at startup.
    #[arg(long, env = "FUNCTION_CONFIG", default_value = "functionCfg")]
    pub function_config: PathBuf,

    /// Maximum concurrent dispatches; 0 means unbounded.
    #[arg(long, env = "MAX_CONCURRENT_DISPATCHES", default_value_t = 0)]
    pub max_concurrent_dispatches: usize,

    /// Seconds between full routing-table rebuilds; 0 disables them.
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value_t = 0)]
    pub reconcile_interval_secs: u64,

    /// Connect timeout for invoke requests, in milliseconds.
    #[arg(long, env = "INVOKE_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub invoke_connect_timeout_ms: u64,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            store_host: "127.0.0.1".to_string(),
            store_port: 6379,
            channel_pattern: "__keyevent@0__:*".to_string(),
            map_prefix: "map:".to_string(),
            supported_commands: String::new(),
            region: "us-east-1".to_string(),
            invoke_endpoint: None,
            function_config: PathBuf::from("functionCfg"),
            max_concurrent_dispatches: 0,
            reconcile_interval_secs: 0,
            invoke_connect_timeout_ms: 5_000,
            log_format: LogFormat::Text,
        }
    }
}

impl RouterConfig {
    /// Checks values clap cannot validate on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyMapPrefix`] for an empty map prefix, which
    /// would classify every payload as a map update,
    /// [`ConfigError::InvalidPort`] for port 0, and
    /// [`ConfigError::MissingInvokeEndpoint`] when no endpoint is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_prefix.is_empty() {
            return Err(ConfigError::EmptyMapPrefix);
        }
        if self.store_port == 0 {
            return Err(ConfigError::InvalidPort(self.store_port));
        }
        self.endpoint()?;
        Ok(())
    }

    /// Builds the command allow-list.
    #[must_use]
    pub fn command_filter(&self) -> CommandFilter {
        CommandFilter::from_csv(&self.supported_commands)
    }

    /// The configured invoke endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingInvokeEndpoint`] if none is set or it is
    /// blank. There is no regional fallback: the public endpoint rejects
    /// unsigned requests.
    pub fn endpoint(&self) -> Result<&str, ConfigError> {
        self.invoke_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .ok_or_else(|| ConfigError::MissingInvokeEndpoint {
                region: self.region.clone(),
            })
    }

    #[must_use]
    pub fn invoke_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_connect_timeout_ms)
    }

    /// Reconcile interval, or `None` when periodic rebuilds are disabled.
    #[must_use]
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let parsed = RouterConfig::parse_from(["evrouter"]);
        let default = RouterConfig::default();

        assert_eq!(parsed.store_host, default.store_host);
        assert_eq!(parsed.store_port, default.store_port);
        assert_eq!(parsed.channel_pattern, default.channel_pattern);
        assert_eq!(parsed.map_prefix, default.map_prefix);
        assert_eq!(parsed.max_concurrent_dispatches, 0);
        assert_eq!(parsed.reconcile_interval(), None);
        assert_eq!(parsed.log_format, LogFormat::Text);
    }

    #[test]
    fn flags_override_defaults() {
        let config = RouterConfig::parse_from([
            "evrouter",
            "--store-host",
            "redis.internal",
            "--store-port",
            "6380",
            "--supported-commands",
            "set,hset",
            "--invoke-endpoint",
            "http://localhost:4566",
            "--reconcile-interval-secs",
            "30",
            "--log-format",
            "json",
        ]);

        assert_eq!(config.store_host, "redis.internal");
        assert_eq!(config.store_port, 6380);
        assert!(config.command_filter().is_supported("hset"));
        assert_eq!(config.endpoint().unwrap(), "http://localhost:4566");
        assert_eq!(config.reconcile_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    fn with_endpoint() -> RouterConfig {
        RouterConfig {
            invoke_endpoint: Some("http://localhost:4566".to_string()),
            ..RouterConfig::default()
        }
    }

    #[test]
    fn missing_endpoint_is_rejected_without_regional_fallback() {
        let config = RouterConfig {
            region: "eu-central-1".to_string(),
            ..RouterConfig::default()
        };

        let err = config.validate().unwrap_err();

        assert!(
            matches!(err, ConfigError::MissingInvokeEndpoint { ref region } if region == "eu-central-1")
        );
        assert!(err.to_string().contains("https://lambda.eu-central-1.amazonaws.com"));
    }

    #[test]
    fn blank_endpoint_is_rejected() {
        let config = RouterConfig {
            invoke_endpoint: Some("  ".to_string()),
            ..RouterConfig::default()
        };
        assert!(matches!(
            config.endpoint(),
            Err(ConfigError::MissingInvokeEndpoint { .. })
        ));
    }

    #[test]
    fn empty_map_prefix_is_rejected() {
        let config = RouterConfig {
            map_prefix: String::new(),
            ..with_endpoint()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyMapPrefix)));
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = RouterConfig {
            store_port: 0,
            ..with_endpoint()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));
    }

    #[test]
    fn defaults_with_endpoint_are_valid() {
        assert!(with_endpoint().validate().is_ok());
    }
}

//! Connection configuration
//!
//! Loaded from TOML or YAML (picked by file extension), or assembled from
//! `ELASTICSEARCH_*` / `AWS_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration: named connections plus the default name
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_connection_name")]
    pub default: String,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

fn default_connection_name() -> String {
    "default".to_string()
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        let mut connections = HashMap::new();
        connections.insert(default_connection_name(), ConnectionConfig::default());
        Self {
            default: default_connection_name(),
            connections,
        }
    }
}

impl ElasticsearchConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            other => Err(Error::Config(format!(
                "Unsupported config format [{}] for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Single connection built from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("ELASTICSEARCH_CONNECTION").unwrap_or_else(default_connection_name);

        let defaults = HostConfig::default();
        let host = HostConfig {
            host: lookup("ELASTICSEARCH_HOST").unwrap_or(defaults.host),
            port: lookup("ELASTICSEARCH_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            scheme: lookup("ELASTICSEARCH_SCHEME").unwrap_or(defaults.scheme),
            user: lookup("ELASTICSEARCH_USER"),
            pass: lookup("ELASTICSEARCH_PASS"),
            aws: lookup("AWS_ELASTICSEARCH_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            aws_region: lookup("AWS_DEFAULT_REGION").unwrap_or(defaults.aws_region),
            aws_key: lookup("AWS_ACCESS_KEY_ID"),
            aws_secret: lookup("AWS_SECRET_ACCESS_KEY"),
        };

        let mut logging = LoggingConfig {
            driver: lookup("ELASTICSEARCH_LOG_DRIVER"),
            ..LoggingConfig::default()
        };
        if let Some(channel) = lookup("ELASTICSEARCH_LOG_CHANNEL") {
            logging.drivers.logger.channel = channel;
        }

        let connection = ConnectionConfig {
            hosts: vec![host],
            logging,
            ..ConnectionConfig::default()
        };

        let mut connections = HashMap::new();
        connections.insert(name.clone(), connection);
        Self {
            default: name,
            connections,
        }
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// One named connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_hosts")]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// `false` disables certificate checks, a path adds a CA bundle
    #[serde(default)]
    pub ssl_verification: Option<SslVerification>,
    /// Retries on connection failure; defaults to the number of hosts
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub sniff_on_start: bool,
    #[serde(default)]
    pub connection_selector: SelectorKind,
    /// Per-request timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_hosts() -> Vec<HostConfig> {
    vec![HostConfig::default()]
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            logging: LoggingConfig::default(),
            ssl_verification: None,
            retries: None,
            sniff_on_start: false,
            connection_selector: SelectorKind::default(),
            timeout_ms: None,
        }
    }
}

impl ConnectionConfig {
    /// Configured retries, or one per host
    pub fn effective_retries(&self) -> u32 {
        self.retries.unwrap_or(self.hosts.len() as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SslVerification {
    Enabled(bool),
    CaBundle(PathBuf),
}

/// How the transport picks a host per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    RoundRobin,
    /// Stay on one host until it fails
    Sticky,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    /// Sign requests with AWS SigV4
    #[serde(default)]
    pub aws: bool,
    #[serde(default = "default_aws_region")]
    pub aws_region: String,
    #[serde(default)]
    pub aws_key: Option<String>,
    #[serde(default)]
    pub aws_secret: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9200
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            user: None,
            pass: None,
            aws: false,
            aws_region: default_aws_region(),
            aws_key: None,
            aws_secret: None,
        }
    }
}

impl HostConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `default`, `logger`, or unset to leave logging alone
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub drivers: LogDrivers,
    /// Log request and response bodies at trace level
    #[serde(default)]
    pub tracer: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogDrivers {
    #[serde(default)]
    pub default: FileDriverConfig,
    #[serde(default)]
    pub logger: ChannelDriverConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileDriverConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs/elasticsearch.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FileDriverConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelDriverConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "daily".to_string()
}

impl Default for ChannelDriverConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are loaded from the GITHUB_TOKENS env var (comma-separated) or
//! tokens_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Deployment environment name, reported by /metrics/clean only.
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Upstream GitHub API settings
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// GitHub credential settings
#[derive(Debug, Default, Deserialize)]
pub struct GithubConfig {
    /// Path to a file containing tokens (alternative to GITHUB_TOKENS env var)
    #[serde(default)]
    pub tokens_file: Option<PathBuf>,
    #[serde(skip)]
    pub tokens: Vec<Secret<String>>,
}

fn default_environment() -> String {
    "development".into()
}

fn default_base_url() -> String {
    "https://api.github.com".into()
}

fn default_timeout() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Split a comma- or newline-separated token list, dropping empty entries.
fn parse_token_list(raw: &str) -> Vec<Secret<String>> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| Secret::new(t.to_owned()))
        .collect()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Token resolution order:
    /// 1. GITHUB_TOKENS env var (comma-separated)
    /// 2. tokens_file path from config (comma- or newline-separated)
    ///
    /// An empty resulting pool is permitted: the service starts and every
    /// proxied call fails with a no-credentials error until tokens appear.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Validate base_url is a valid URL with http(s) scheme
        if !config.upstream.base_url.starts_with("http://")
            && !config.upstream.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.upstream.base_url
            )));
        }

        // Validate timeout_secs is non-zero
        if config.upstream.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        // Resolve tokens: env var takes precedence over file
        if let Ok(raw) = std::env::var("GITHUB_TOKENS") {
            config.github.tokens = parse_token_list(&raw);
        } else if let Some(ref tokens_file) = config.github.tokens_file {
            let raw = std::fs::read_to_string(tokens_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read tokens_file {}: {e}",
                    tokens_file.display()
                ))
            })?;
            config.github.tokens = parse_token_list(&raw);
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("gitport-proxy.toml")
    }
}

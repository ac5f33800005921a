//! Benchmark configuration
//!
//! Settings come from `lagbench.toml`, then environment variables, then
//! command-line flags, each layer overriding the previous one.
//!
//! ## Environment Variables
//!
//! - `LAGBENCH_TARGETS` - Comma separated target list
//! - `LAGBENCH_AUTH_TOKEN` - Bearer token for server targets
//! - `LAGBENCH_RECORD_COUNT` - Rows inserted per run
//! - `LAGBENCH_TABLE` - Working table name
//!
//! These can also be set in a `.env` file in the working directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lagbench_client::client::DEFAULT_MAX_CONNECTIONS;
use lagbench_client::{ClientBuilder, Transport};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::poller::PollPolicy;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "lagbench.toml";

pub const ENV_TARGETS: &str = "LAGBENCH_TARGETS";
pub const ENV_AUTH_TOKEN: &str = "LAGBENCH_AUTH_TOKEN";
pub const ENV_RECORD_COUNT: &str = "LAGBENCH_RECORD_COUNT";
pub const ENV_TABLE: &str = "LAGBENCH_TABLE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Targets benchmarked in order
    pub targets: Vec<String>,
    /// Rows inserted concurrently per run
    pub record_count: usize,
    /// Working table, dropped and recreated by every run
    pub table: String,
    /// Optional bearer token for server targets
    pub auth_token: String,
    /// Per-request timeout for server targets
    pub request_timeout_ms: u64,
    /// Requests in flight at once against a server target
    pub max_connections: usize,
    pub polling: PollingConfig,
    pub probe: ProbeConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            targets: vec!["http://localhost:8080".to_string(), "file:local.db".to_string()],
            record_count: 5000,
            table: "pony".to_string(),
            auth_token: String::new(),
            request_timeout_ms: 30_000,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            polling: PollingConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub schema_interval_ms: u64,
    pub read_interval_ms: u64,
    /// Give up waiting after this long. Unset polls forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            schema_interval_ms: 1000,
            read_interval_ms: 2000,
            timeout_ms: None,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub iterations: usize,
    pub table: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            table: "insert_test".to_string(),
        }
    }
}

impl BenchConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `lagbench.toml` in the
    /// working directory is used when present and defaults otherwise. A
    /// `.env` file is loaded first so its variables take part in the
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> BenchResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(BenchError::Config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Empty or unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(targets) = lookup(ENV_TARGETS) {
            let targets: Vec<String> = targets
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if !targets.is_empty() {
                self.targets = targets;
            }
        }

        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            if !token.is_empty() {
                self.auth_token = token;
            }
        }

        if let Some(count) = lookup(ENV_RECORD_COUNT) {
            if let Ok(count) = count.trim().parse::<usize>() {
                self.record_count = count;
            }
        }

        if let Some(table) = lookup(ENV_TABLE) {
            if !table.is_empty() {
                self.table = table;
            }
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.targets.is_empty() {
            return Err(BenchError::Config("no targets configured".to_string()));
        }
        for target in &self.targets {
            Target::parse(target)?;
        }
        if self.polling.schema_interval_ms == 0 || self.polling.read_interval_ms == 0 {
            return Err(BenchError::Config(
                "poll intervals must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(BenchError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.polling.max_attempts == Some(0) {
            return Err(BenchError::Config(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        validate_table_name(&self.table)?;
        validate_table_name(&self.probe.table)?;
        Ok(())
    }

    pub fn schema_policy(&self) -> PollPolicy {
        self.policy(self.polling.schema_interval_ms)
    }

    pub fn read_policy(&self) -> PollPolicy {
        self.policy(self.polling.read_interval_ms)
    }

    fn policy(&self, interval_ms: u64) -> PollPolicy {
        let mut policy = PollPolicy::every(Duration::from_millis(interval_ms));
        if let Some(timeout) = self.polling.timeout_ms {
            policy = policy.with_timeout(Duration::from_millis(timeout));
        }
        if let Some(max) = self.polling.max_attempts {
            policy = policy.with_max_attempts(max);
        }
        policy
    }

    /// Client builder for `target` carrying the configured token and timeout.
    pub fn client_builder(&self, target: &str) -> ClientBuilder {
        ClientBuilder::new(target)
            .auth_token(&self.auth_token)
            .timeout_ms(self.request_timeout_ms)
            .max_connections(self.max_connections)
    }
}

/// Table names are spliced into statements, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> BenchResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(BenchError::Config(format!(
            "'{}' is not a valid table name",
            name
        )))
    }
}

/// A parsed target descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Remote { url: String },
    Local { path: PathBuf },
}

impl Target {
    pub fn parse(descriptor: &str) -> BenchResult<Self> {
        let builder = ClientBuilder::new(descriptor);
        match builder.transport() {
            Some(Transport::Http) => {
                let descriptor = descriptor.trim();
                let url = match descriptor.strip_prefix("libsql://") {
                    Some(rest) => format!("https://{}", rest),
                    None => descriptor.to_string(),
                };
                Ok(Target::Remote { url })
            }
            Some(Transport::Local) => builder
                .local_path()
                .map(|path| Target::Local { path })
                .ok_or_else(|| {
                    BenchError::Config(format!("'{}' does not name a file", descriptor))
                }),
            None => Err(BenchError::Config(format!(
                "unsupported target '{}'; use http://, https://, libsql:// or file:",
                descriptor
            ))),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local { .. })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Remote { url } => write!(f, "{}", url),
            Target::Local { path } => write!(f, "file:{}", path.display()),
        }
    }
}

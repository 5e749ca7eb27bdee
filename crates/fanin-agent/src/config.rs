//! Agent configuration: command-line flags with environment overrides.
//!
//! Flags are parsed first; environment variables are applied on top and
//! win when both are set (the agent is usually configured through its
//! pod environment, with flags as the local-development path). Values
//! that fail to parse are ignored and the flag value kept.
//!
//! The effective configuration is logged at startup and, in debug mode,
//! served at `/debug/config` with secrets redacted.

use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use fanin_backend::{KvConfig, ObjectStoreConfig};
use fanin_batch::BatcherConfig;
use serde::Serialize;
use tracing::info;

/// Which backend family this agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    S3,
    Redis,
}

impl FromStr for BackendFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown backend family: {other}")),
        }
    }
}

impl std::fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 => f.write_str("s3"),
            Self::Redis => f.write_str("redis"),
        }
    }
}

/// Command-line flags.
#[derive(Parser, Debug)]
#[command(name = "fanin-agent")]
#[command(version, about = "Node-local batching proxy for serverless backend calls")]
pub struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Backend family served by this agent
    #[arg(long, value_enum, default_value_t = BackendFamily::Redis)]
    pub backend: BackendFamily,

    /// Enable request batching
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub batching: bool,

    /// Batch window in milliseconds
    #[arg(long, default_value_t = 100)]
    pub batch_window: u64,

    /// Maximum requests per batch
    #[arg(long, default_value_t = 10)]
    pub max_batch_size: usize,

    /// Expose the effective configuration at /debug/config
    #[arg(long)]
    pub debug: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Object-store region
    #[arg(long, default_value = "us-east-1")]
    pub aws_region: String,

    /// Bucket used when a request does not name one
    #[arg(long)]
    pub default_bucket: Option<String>,

    /// Key-value backend host
    #[arg(long, default_value = "localhost")]
    pub redis_host: String,

    /// Key-value backend port
    #[arg(long, default_value_t = 6379)]
    pub redis_port: u16,

    /// Key-value backend password
    #[arg(long)]
    pub redis_password: Option<String>,

    /// Key-value connection pool size
    #[arg(long, default_value_t = 10)]
    pub redis_pool_size: usize,
}

/// Effective agent configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub port: u16,
    pub backend: BackendFamily,
    pub batching_enabled: bool,
    pub batch_window_ms: u64,
    pub max_batch_size: usize,
    pub debug_mode: bool,
    pub log_level: String,
    pub log_json: bool,
    pub aws_region: String,
    pub default_bucket: Option<String>,
    pub redis_host: String,
    pub redis_port: u16,
    #[serde(skip_serializing)]
    pub redis_password: Option<String>,
    pub redis_pool_size: usize,
}

impl From<Args> for AgentConfig {
    fn from(args: Args) -> Self {
        Self {
            port: args.port,
            backend: args.backend,
            batching_enabled: args.batching,
            batch_window_ms: args.batch_window,
            max_batch_size: args.max_batch_size,
            debug_mode: args.debug,
            log_level: args.log_level,
            log_json: args.log_json,
            aws_region: args.aws_region,
            default_bucket: args.default_bucket,
            redis_host: args.redis_host,
            redis_port: args.redis_port,
            redis_password: args.redis_password,
            redis_pool_size: args.redis_pool_size,
        }
    }
}

impl AgentConfig {
    /// Parses flags and applies environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from(Args::parse());
        config.apply_env(&|name| std::env::var(name).ok());
        config
    }

    /// Applies environment overrides from the given lookup.
    ///
    /// Taking the lookup as a parameter keeps this testable without
    /// mutating process-wide state.
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        override_parsed(&mut self.port, env("PORT"));
        override_parsed(&mut self.backend, env("BACKEND"));
        override_bool(&mut self.batching_enabled, env("BATCHING_ENABLED"));
        override_parsed(&mut self.batch_window_ms, env("BATCH_WINDOW"));
        override_parsed(&mut self.max_batch_size, env("MAX_BATCH_SIZE"));
        override_bool(&mut self.debug_mode, env("DEBUG_MODE"));
        override_parsed(&mut self.log_level, env("LOG_LEVEL"));
        override_bool(&mut self.log_json, env("LOG_JSON"));
        override_parsed(&mut self.aws_region, env("AWS_REGION"));
        if let Some(bucket) = env("DEFAULT_BUCKET") {
            self.default_bucket = Some(bucket);
        }
        override_parsed(&mut self.redis_host, env("REDIS_HOST"));
        override_parsed(&mut self.redis_port, env("REDIS_PORT"));
        if let Some(password) = env("REDIS_PASSWORD") {
            self.redis_password = Some(password);
        }
        override_parsed(&mut self.redis_pool_size, env("REDIS_POOL_SIZE"));
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            enabled: self.batching_enabled,
            batch_window: self.batch_window(),
            max_batch_size: self.max_batch_size,
        }
    }

    pub fn kv_config(&self) -> KvConfig {
        KvConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: self.redis_password.clone(),
            pool_size: self.redis_pool_size,
        }
    }

    pub fn object_config(&self) -> ObjectStoreConfig {
        ObjectStoreConfig {
            region: self.aws_region.clone(),
        }
    }

    /// Logs the effective configuration at startup.
    pub fn log_effective(&self) {
        info!(
            port = self.port,
            backend = %self.backend,
            batching = self.batching_enabled,
            batch_window_ms = self.batch_window_ms,
            max_batch_size = self.max_batch_size,
            debug = self.debug_mode,
            "effective configuration"
        );
        match self.backend {
            BackendFamily::S3 => info!(
                region = %self.aws_region,
                default_bucket = self.default_bucket.as_deref().unwrap_or("<none>"),
                "object-store backend"
            ),
            BackendFamily::Redis => info!(
                host = %self.redis_host,
                port = self.redis_port,
                pool_size = self.redis_pool_size,
                password = self.redis_password.is_some(),
                "key-value backend"
            ),
        }
    }
}

fn override_parsed<T: FromStr>(field: &mut T, value: Option<String>) {
    if let Some(raw) = value {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

/// Boolean env parsing in the spirit of `strconv.ParseBool`: accepts
/// 1/0 and t/f as well as true/false.
fn override_bool(field: &mut bool, value: Option<String>) {
    if let Some(raw) = value {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => *field = true,
            "0" | "f" | "false" => *field = false,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> AgentConfig {
        let mut argv = vec!["fanin-agent"];
        argv.extend_from_slice(args);
        AgentConfig::from(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let config = parse(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend, BackendFamily::Redis);
        assert!(config.batching_enabled);
        assert_eq!(config.batch_window(), Duration::from_millis(100));
        assert_eq!(config.max_batch_size, 10);
        assert!(!config.debug_mode);
        assert_eq!(config.redis_host, "localhost");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.redis_pool_size, 10);
        assert_eq!(config.aws_region, "us-east-1");
        assert!(config.default_bucket.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--port",
            "9090",
            "--backend",
            "s3",
            "--batching",
            "false",
            "--batch-window",
            "250",
            "--max-batch-size",
            "32",
            "--debug",
            "--default-bucket",
            "artifacts",
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.backend, BackendFamily::S3);
        assert!(!config.batching_enabled);
        assert_eq!(config.batch_window_ms, 250);
        assert_eq!(config.max_batch_size, 32);
        assert!(config.debug_mode);
        assert_eq!(config.default_bucket.as_deref(), Some("artifacts"));
    }

    #[test]
    fn environment_wins_over_flags() {
        let mut config = parse(&["--port", "9090", "--batching", "true"]);
        config.apply_env(&|name| match name {
            "PORT" => Some("7070".to_string()),
            "BATCHING_ENABLED" => Some("false".to_string()),
            "BATCH_WINDOW" => Some("5".to_string()),
            "REDIS_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        });

        assert_eq!(config.port, 7070);
        assert!(!config.batching_enabled);
        assert_eq!(config.batch_window_ms, 5);
        assert_eq!(config.redis_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn unparsable_environment_values_keep_the_flag_value() {
        let mut config = parse(&["--port", "9090"]);
        config.apply_env(&|name| match name {
            "PORT" => Some("not-a-port".to_string()),
            "BATCHING_ENABLED" => Some("maybe".to_string()),
            _ => None,
        });

        assert_eq!(config.port, 9090);
        assert!(config.batching_enabled);
    }

    #[test]
    #[serial]
    fn load_reads_the_process_environment() {
        std::env::set_var("MAX_BATCH_SIZE", "77");

        let mut config = parse(&[]);
        config.apply_env(&|name| std::env::var(name).ok());

        std::env::remove_var("MAX_BATCH_SIZE");

        assert_eq!(config.max_batch_size, 77);
    }

    #[test]
    fn debug_serialization_redacts_the_password() {
        let mut config = parse(&[]);
        config.redis_password = Some("hunter2".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"redis_host\""));
    }

    #[test]
    fn boolean_environment_parsing_is_forgiving() {
        let mut flag = false;
        override_bool(&mut flag, Some("1".to_string()));
        assert!(flag);
        override_bool(&mut flag, Some("F".to_string()));
        assert!(!flag);
        override_bool(&mut flag, Some("T".to_string()));
        assert!(flag);
        override_bool(&mut flag, None);
        assert!(flag);
    }
}

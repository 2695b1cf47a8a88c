//! Server configuration and CLI argument parsing
//!
//! Configuration comes from CLI arguments and environment variables (with
//! the USAGEGATE_ prefix); CLI takes precedence. The per-endpoint limits
//! table is loaded from an optional JSON file so limits can be tuned
//! without code changes:
//!
//! ```json
//! {
//!   "generate-menu": { "max_tokens": 5,  "refill_rate": 0.1, "cost": 1 },
//!   "photo-scan":    { "max_tokens": 10, "refill_rate": 0.5, "cost": 1 }
//! }
//! ```
//!
//! Endpoints absent from the table fall back to the default limit
//! parameters (`--default-max-tokens` etc.).

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use usagegate::RateLimit;

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP transport configuration (the only wire surface)
    pub http: Option<HttpConfig>,
    /// Store configuration
    pub store: StoreConfig,
    /// Per-endpoint rate limit parameters
    pub limits: LimitsTable,
    /// Reference time zone for daily rewards, seconds east of UTC
    pub reward_day_offset_secs: i32,
    /// Channel buffer size for actor communication
    pub buffer_size: usize,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// In-memory store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Initial capacity of the store
    pub capacity: usize,
    /// Credits a subject starts with when first seen
    pub initial_grant: i64,
    /// Seconds a bucket may sit idle before the sweep removes it
    pub bucket_retention: u64,
    /// Seconds between idle-bucket sweeps
    pub sweep_interval: u64,
}

/// Limit parameters for one endpoint, as configured
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitParams {
    pub max_tokens: f64,
    pub refill_rate: f64,
    pub cost: f64,
}

impl From<LimitParams> for RateLimit {
    fn from(params: LimitParams) -> Self {
        RateLimit::new(params.max_tokens, params.refill_rate, params.cost)
    }
}

/// Per-endpoint limits with a default fallback.
///
/// This is the explicit configuration table the control plane reads its
/// static `(max_tokens, refill_rate, cost)` triples from.
#[derive(Debug, Clone)]
pub struct LimitsTable {
    default: LimitParams,
    endpoints: HashMap<String, LimitParams>,
}

impl LimitsTable {
    pub fn new(default: LimitParams) -> Self {
        LimitsTable {
            default,
            endpoints: HashMap::new(),
        }
    }

    pub fn with_endpoints(default: LimitParams, endpoints: HashMap<String, LimitParams>) -> Self {
        LimitsTable { default, endpoints }
    }

    /// Load the endpoint table from a JSON file.
    pub fn from_file(path: &PathBuf, default: LimitParams) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read limits file {}", path.display()))?;
        let endpoints: HashMap<String, LimitParams> = serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse limits file {}", path.display()))?;
        Ok(LimitsTable { default, endpoints })
    }

    /// Limit parameters for an endpoint, falling back to the default.
    pub fn resolve(&self, endpoint: &str) -> LimitParams {
        self.endpoints.get(endpoint).copied().unwrap_or(self.default)
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// USAGEGATE_ prefix. CLI arguments take precedence.
#[derive(Parser, Debug)]
#[command(
    name = "usagegate",
    about = "Usage-control plane server: rate limiting and idempotent credit/event ledgers",
    long_about = "A usage-control plane server guarding billable and abuse-sensitive actions:\ntoken-bucket rate limiting plus idempotent credit and event ledgers.\n\nEnvironment variables with the USAGEGATE_ prefix are supported. CLI arguments take precedence."
)]
pub struct Args {
    // HTTP Transport
    #[arg(long, help = "Enable HTTP transport", env = "USAGEGATE_HTTP")]
    pub http: bool,
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "USAGEGATE_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "USAGEGATE_HTTP_PORT"
    )]
    pub http_port: u16,

    // Store configuration
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial store capacity",
        default_value_t = 100_000,
        env = "USAGEGATE_STORE_CAPACITY"
    )]
    pub store_capacity: usize,
    #[arg(
        long,
        value_name = "CREDITS",
        help = "Credits a new subject starts with",
        default_value_t = 0,
        env = "USAGEGATE_INITIAL_GRANT"
    )]
    pub initial_grant: i64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Idle bucket retention (seconds)",
        default_value_t = 3600,
        env = "USAGEGATE_BUCKET_RETENTION"
    )]
    pub bucket_retention: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between idle-bucket sweeps (seconds)",
        default_value_t = 300,
        env = "USAGEGATE_SWEEP_INTERVAL"
    )]
    pub sweep_interval: u64,

    // Limits
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON file with per-endpoint limit parameters",
        env = "USAGEGATE_LIMITS"
    )]
    pub limits: Option<PathBuf>,
    #[arg(
        long,
        value_name = "N",
        help = "Default bucket capacity for endpoints not in the limits file",
        default_value_t = 60.0,
        env = "USAGEGATE_DEFAULT_MAX_TOKENS"
    )]
    pub default_max_tokens: f64,
    #[arg(
        long,
        value_name = "N",
        help = "Default refill rate (tokens per second)",
        default_value_t = 1.0,
        env = "USAGEGATE_DEFAULT_REFILL_RATE"
    )]
    pub default_refill_rate: f64,
    #[arg(
        long,
        value_name = "N",
        help = "Default cost per call",
        default_value_t = 1.0,
        env = "USAGEGATE_DEFAULT_COST"
    )]
    pub default_cost: f64,

    // Rewards
    #[arg(
        long,
        value_name = "HOURS",
        help = "Reference time zone for daily rewards, hours east of UTC",
        default_value_t = 0,
        allow_negative_numbers = true,
        env = "USAGEGATE_REWARD_DAY_OFFSET"
    )]
    pub reward_day_offset: i32,

    // General options
    #[arg(
        long,
        value_name = "SIZE",
        help = "Channel buffer size",
        default_value_t = 100_000,
        env = "USAGEGATE_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "USAGEGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport is enabled, the limits file cannot
    /// be loaded, or any limit parameter is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    fn from_args(args: Args) -> Result<Self> {
        let default = LimitParams {
            max_tokens: args.default_max_tokens,
            refill_rate: args.default_refill_rate,
            cost: args.default_cost,
        };
        let limits = match &args.limits {
            Some(path) => LimitsTable::from_file(path, default)?,
            None => LimitsTable::new(default),
        };

        let config = Config {
            http: args.http.then(|| HttpConfig {
                host: args.http_host.clone(),
                port: args.http_port,
            }),
            store: StoreConfig {
                capacity: args.store_capacity,
                initial_grant: args.initial_grant,
                bucket_retention: args.bucket_retention,
                sweep_interval: args.sweep_interval,
            },
            limits,
            reward_day_offset_secs: args.reward_day_offset * 3600,
            buffer_size: args.buffer_size,
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http.is_none() {
            return Err(anyhow!(
                "The HTTP transport must be enabled.\n\n\
                Example:\n  \
                usagegate --http --http-port 8080\n\n\
                For more information, try '--help'"
            ));
        }

        let mut endpoints: Vec<(&str, LimitParams)> =
            vec![("(default)", self.limits.default)];
        endpoints.extend(
            self.limits
                .endpoints
                .iter()
                .map(|(name, params)| (name.as_str(), *params)),
        );
        for (name, params) in endpoints {
            if !RateLimit::from(params).is_valid() {
                return Err(anyhow!(
                    "Invalid limit parameters for endpoint {name}: \
                    max_tokens and refill_rate must be positive, cost non-negative"
                ));
            }
        }

        if self.store.sweep_interval == 0 {
            return Err(anyhow!("Sweep interval must be at least 1 second"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions.
    fn print_env_vars() {
        println!("Usagegate Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the USAGEGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Transport Configuration:");
        println!("  USAGEGATE_HTTP=true|false             Enable HTTP transport");
        println!("  USAGEGATE_HTTP_HOST=<host>            HTTP host [default: 127.0.0.1]");
        println!("  USAGEGATE_HTTP_PORT=<port>            HTTP port [default: 8080]");
        println!();

        println!("Store Configuration:");
        println!("  USAGEGATE_STORE_CAPACITY=<size>       Initial store capacity [default: 100000]");
        println!("  USAGEGATE_INITIAL_GRANT=<credits>     Credits a new subject starts with [default: 0]");
        println!("  USAGEGATE_BUCKET_RETENTION=<secs>     Idle bucket retention [default: 3600]");
        println!("  USAGEGATE_SWEEP_INTERVAL=<secs>       Idle-bucket sweep interval [default: 300]");
        println!();

        println!("Rate Limits:");
        println!("  USAGEGATE_LIMITS=<file>               JSON file with per-endpoint limits");
        println!("  USAGEGATE_DEFAULT_MAX_TOKENS=<n>      Default bucket capacity [default: 60]");
        println!("  USAGEGATE_DEFAULT_REFILL_RATE=<n>     Default refill rate, tokens/s [default: 1]");
        println!("  USAGEGATE_DEFAULT_COST=<n>            Default cost per call [default: 1]");
        println!();

        println!("Rewards:");
        println!(
            "  USAGEGATE_REWARD_DAY_OFFSET=<hours>   Daily-reward time zone, hours east of UTC [default: 0]"
        );
        println!();

        println!("General Configuration:");
        println!("  USAGEGATE_BUFFER_SIZE=<size>          Channel buffer size [default: 100000]");
        println!(
            "  USAGEGATE_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Enable HTTP transport on port 8080 with 30 free credits");
        println!("  export USAGEGATE_HTTP=true");
        println!("  export USAGEGATE_INITIAL_GRANT=30");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  usagegate --http --http-port 9090");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> LimitParams {
        LimitParams {
            max_tokens: 60.0,
            refill_rate: 1.0,
            cost: 1.0,
        }
    }

    fn base_config(limits: LimitsTable) -> Config {
        Config {
            http: Some(HttpConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            }),
            store: StoreConfig {
                capacity: 100_000,
                initial_grant: 0,
                bucket_retention: 3600,
                sweep_interval: 300,
            },
            limits,
            reward_day_offset_secs: 0,
            buffer_size: 100_000,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_limits_resolution_falls_back_to_default() {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            "generate-menu".to_string(),
            LimitParams {
                max_tokens: 5.0,
                refill_rate: 0.1,
                cost: 1.0,
            },
        );
        let table = LimitsTable::with_endpoints(default_params(), endpoints);

        assert_eq!(table.resolve("generate-menu").max_tokens, 5.0);
        assert_eq!(table.resolve("unknown-endpoint").max_tokens, 60.0);
    }

    #[test]
    fn test_validation_requires_http_transport() {
        let mut config = base_config(LimitsTable::new(default_params()));
        config.http = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_limit_params() {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            "broken".to_string(),
            LimitParams {
                max_tokens: 0.0,
                refill_rate: 1.0,
                cost: 1.0,
            },
        );
        let config = base_config(LimitsTable::with_endpoints(default_params(), endpoints));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_sweep_interval() {
        let mut config = base_config(LimitsTable::new(default_params()));
        config.store.sweep_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        let config = base_config(LimitsTable::new(default_params()));
        assert!(config.validate().is_ok());
    }
}

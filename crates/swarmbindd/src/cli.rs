//! Command line surface
//!
//! Every connection setting can be given as a flag or through its
//! environment variable.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use swarmbind_core::labels::DEFAULT_LABEL_PREFIX;
use swarmbind_core::{EngineConfig, GatewayConfig, LabelConfig, SyncConfig};
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    author,
    version,
    about = "Manages OPNsense BIND records for docker swarm services",
    long_about = None
)]
pub struct Cli {
    /// Base URL of the OPNsense firewall, without path
    #[arg(short = 'u', long, value_name = "URL", env = "GW_API_URL", global = true)]
    pub url: Option<String>,

    /// API key used to authenticate against the firewall
    #[arg(long, value_name = "KEY", env = "GW_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// API secret used to authenticate against the firewall
    #[arg(
        long,
        value_name = "SECRET",
        env = "GW_API_SECRET",
        hide_env_values = true,
        global = true
    )]
    pub api_secret: Option<String>,

    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        default_value_t = LogLevel::Info,
        value_name = "LEVEL",
        env = "SWARMBIND_LOG_LEVEL",
        global = true
    )]
    pub log_level: LogLevel,

    /// Timeout of every API request in seconds
    #[arg(
        long,
        default_value_t = 30,
        value_name = "SECONDS",
        env = "SWARMBIND_TIMEOUT_SECS",
        global = true
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Add a record
    Add {
        /// The domain of the record
        #[arg(short, long)]
        domain: String,
        /// The name of the record
        #[arg(short, long)]
        name: String,
        /// The type of the record, e.g. A or CNAME
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        record_type: String,
        /// The value of the record, e.g. 192.168.1.1
        #[arg(short, long)]
        value: String,
    },

    /// Remove a record
    Remove {
        /// The domain of the record
        #[arg(short, long)]
        domain: String,
        /// The name of the record
        #[arg(short, long)]
        name: String,
        /// The type of the record, e.g. A or CNAME
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        record_type: String,
    },

    /// Reconfigure the bind service
    Reconfigure,

    /// Listen and process docker service events
    Events {
        /// Docker Engine API endpoint, e.g. unix:///var/run/docker.sock or tcp://manager:2375
        #[arg(long, value_name = "HOST", env = "DOCKER_HOST")]
        docker_host: String,

        /// Prefix of the service labels declaring records
        #[arg(
            long,
            value_name = "PREFIX",
            default_value = DEFAULT_LABEL_PREFIX,
            env = "SWARMBIND_LABEL_PREFIX"
        )]
        label_prefix: String,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    /// Gateway settings, failing on the first missing one
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let Some(url) = self.url.as_deref() else {
            bail!("GW_API_URL is required. Set it via: export GW_API_URL=https://fw.example.org");
        };
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GW_API_KEY is required");
        };
        let Some(api_secret) = self.api_secret.as_deref() else {
            bail!("GW_API_SECRET is required");
        };

        let config = GatewayConfig::new(url, api_key, api_secret);
        config.validate().context("Invalid gateway settings")?;
        Ok(config)
    }

    /// Full configuration for the given label prefix
    pub fn sync_config(&self, label_prefix: &str) -> Result<SyncConfig> {
        let config = SyncConfig {
            gateway: self.gateway_config()?,
            labels: LabelConfig {
                prefix: label_prefix.to_string(),
            },
            engine: EngineConfig {
                request_timeout_secs: self.timeout_secs,
                ..EngineConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }
}

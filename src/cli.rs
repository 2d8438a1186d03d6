//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Upgrade risk engine - cluster upgrade-risk verdicts from telemetry
#[derive(Parser, Debug)]
#[command(name = "upgrade-risk-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "UPGRADE_RISK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "UPGRADE_RISK_PORT")]
    pub port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long, env = "UPGRADE_RISK_HOST")]
    pub host: Option<std::net::IpAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "UPGRADE_RISK_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "UPGRADE_RISK_LOG_FORMAT")]
    pub log_format: Option<String>,
}

//! Upgrade Risk Engine
//!
//! Queries a time-series telemetry backend for per-cluster risk signals
//! (firing alerts, failing operator conditions), forwards them to a
//! scoring service, and returns an upgrade-risk verdict.
//!
//! The interesting parts live in two subsystems:
//!
//! - [`auth::TokenManager`]: OAuth2 client-credentials lifecycle — keeps
//!   an access token usable without blocking every request on a fresh
//!   handshake, with single-flight refresh and retry via
//!   [`retry::RetryPolicy`].
//! - [`telemetry::TelemetryClient`]: caching query orchestrator — single
//!   and batched lookups answered from one shared [`cache::TtlCache`],
//!   querying upstream only for the subset the cache cannot answer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod models;
pub mod query;
pub mod retry;
pub mod telemetry;
pub mod urls;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

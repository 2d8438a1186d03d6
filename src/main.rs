//! Upgrade risk engine - service entry point

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use upgrade_risk_engine::{
    api::{self, AppState},
    auth::{self, TokenManager},
    cli::Cli,
    config::Settings,
    inference::InferenceClient,
    retry::RetryPolicy,
    setup_tracing,
    telemetry::{RiskCache, TelemetryClient},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let metrics_handle = PrometheusBuilder::new().install_recorder().ok();
    if metrics_handle.is_none() {
        error!("Failed to install Prometheus recorder, /metrics disabled");
    }

    let http = auth::build_http_client(
        settings.sso.allow_insecure,
        settings.telemetry.request_timeout,
    )?;

    // One token manager per process; discovery failures are fatal here,
    // not retried.
    let token_manager = Arc::new(TokenManager::connect(http.clone(), &settings.sso).await?);
    info!(issuer = %settings.sso.issuer, "SSO session initialized");

    let cache = Arc::new(RiskCache::from_config(&settings.cache));
    info!(
        enabled = settings.cache.enabled,
        max_entries = settings.cache.max_entries,
        ttl_secs = settings.cache.ttl.as_secs(),
        "Lookup cache configured"
    );

    let telemetry = Arc::new(TelemetryClient::new(
        Arc::clone(&token_manager),
        Arc::clone(&cache),
        RetryPolicy::new(&settings.retry),
        &settings.telemetry,
    ));
    let inference = Arc::new(InferenceClient::new(http, &settings.inference));

    let state = AppState {
        telemetry,
        inference,
        metrics_handle,
    };

    let addr = SocketAddr::new(settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

//! Caching query orchestrator for the telemetry backend
//!
//! [`TelemetryClient`] answers single-cluster and batched risk-signal
//! lookups from one shared, time-bounded cache. Both paths read and write
//! the same [`TtlCache`] instance, so a batch lookup observes entries
//! written by a prior single lookup and vice versa. Batches only query the
//! upstream for the subset of clusters the cache cannot answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use telemetry_metrics::histogram;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::TokenManager;
use crate::cache::TtlCache;
use crate::config::TelemetryConfig;
use crate::models::{Alert, ClusterRisk, OperatorCondition, RiskSignals};
use crate::query;
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Shared cache type for cluster risk lookups
pub type RiskCache = TtlCache<Uuid, ClusterRisk>;

/// Row discriminator for console URL rows
const METRIC_CONSOLE_URL: &str = "console_url";
/// Row discriminator for alert rows
const METRIC_ALERTS: &str = "alerts";
/// Row discriminator for operator condition rows
const METRIC_CONDITIONS: &str = "cluster_operator_conditions";

/// Telemetry query response: `{data: {result: [{metric: {...}}, ...]}}`
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Row>,
}

/// One instant-vector sample; only the label set matters here
#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    metric: HashMap<String, String>,
}

/// Orchestrates authenticated telemetry queries behind the shared cache
pub struct TelemetryClient {
    token_manager: Arc<TokenManager>,
    cache: Arc<RiskCache>,
    retry: RetryPolicy,
    query_url: String,
    request_timeout: Duration,
    max_data_age: Duration,
}

impl TelemetryClient {
    /// Build the orchestrator around an injected token manager and cache.
    ///
    /// The cache is shared, not owned: callers hand the same `Arc` to every
    /// consumer that must observe the same entries.
    #[must_use]
    pub fn new(
        token_manager: Arc<TokenManager>,
        cache: Arc<RiskCache>,
        retry: RetryPolicy,
        config: &TelemetryConfig,
    ) -> Self {
        let query_url = format!(
            "{}/api/metrics/v1/{}/api/v1/query",
            config.base_url.trim_end_matches('/'),
            config.tenant
        );
        Self {
            token_manager,
            cache,
            retry,
            query_url,
            request_timeout: config.request_timeout,
            max_data_age: config.max_data_age,
        }
    }

    /// Look up the risk signals for one cluster.
    ///
    /// Served from the shared cache when possible; otherwise refreshes the
    /// SSO token (with retry), queries the upstream, and caches the parsed
    /// result — including an explicit empty entry when the upstream knows
    /// the cluster but reports no signals.
    ///
    /// # Errors
    ///
    /// [`Error::ClusterNotFound`] on upstream 404 (never cached),
    /// [`Error::UpstreamStatus`] on other non-success statuses,
    /// [`Error::TokenRefresh`] when the refresh retries are exhausted.
    pub async fn lookup_one(&self, cluster_id: Uuid) -> Result<ClusterRisk> {
        if let Some(risk) = self.cache.get(&cluster_id) {
            debug!(%cluster_id, "Using cached result");
            return Ok(risk);
        }

        self.refresh_token().await?;
        let response = self
            .run_query(&query::single_cluster_risk_signals(cluster_id))
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(%cluster_id, "Cluster not found in telemetry backend");
            return Err(Error::ClusterNotFound(cluster_id));
        }
        if !status.is_success() {
            debug!(%cluster_id, status = status.as_u16(), "Telemetry query failed");
            return Err(Error::upstream(status));
        }

        let body: QueryResponse = response.json().await?;
        debug!(
            %cluster_id,
            rows = body.data.result.len(),
            "Telemetry response received"
        );

        let risk = collect_single(&body.data.result);
        self.cache.put(cluster_id, risk.clone());
        Ok(risk)
    }

    /// Look up risk signals for several clusters at once.
    ///
    /// Clusters answered by the shared cache are never re-queried; the
    /// missing subset goes upstream as one combined query. On an upstream
    /// non-success status the cached subset is returned as-is — partial
    /// results are preferred over failure. Requested clusters absent from
    /// the result rows are omitted from the mapping and *not* cached, so
    /// the next call retries them.
    ///
    /// # Errors
    ///
    /// Transport failures and token refresh exhaustion propagate;
    /// upstream HTTP errors do not.
    pub async fn lookup_many(&self, cluster_ids: &[Uuid]) -> Result<HashMap<Uuid, ClusterRisk>> {
        let mut results = HashMap::new();
        let mut missing: Vec<Uuid> = Vec::new();

        for cluster_id in cluster_ids {
            if let Some(risk) = self.cache.get(cluster_id) {
                debug!(%cluster_id, "Using cached result");
                results.insert(*cluster_id, risk);
            } else if !missing.contains(cluster_id) {
                missing.push(*cluster_id);
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        self.refresh_token().await?;
        let response = self.run_query(&query::risk_signals(&missing)).await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                missing = missing.len(),
                "Batch telemetry query failed, returning cached results only"
            );
            return Ok(results);
        }

        let body: QueryResponse = response.json().await?;
        debug!(rows = body.data.result.len(), "Telemetry response received");

        for (cluster_id, risk) in demux_rows(&body.data.result) {
            self.cache.put(cluster_id, risk.clone());
            results.insert(cluster_id, risk);
        }

        Ok(results)
    }

    /// Cache statistics for the shared lookup cache
    pub fn cache_stats(&self) -> crate::cache::CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Refresh the SSO token, absorbing transient outages with backoff
    async fn refresh_token(&self) -> Result<()> {
        self.retry
            .run("sso-token-refresh", || self.token_manager.ensure_fresh())
            .await
    }

    /// Issue the authenticated query with the configured deadline
    async fn run_query(&self, query_text: &str) -> Result<reqwest::Response> {
        let time = (chrono::Utc::now()
            - chrono::Duration::from_std(self.max_data_age)
                .unwrap_or_else(|_| chrono::Duration::zero()))
        .timestamp();

        let started = Instant::now();
        let response = self
            .token_manager
            .authorized_get(&self.query_url)?
            .query(&[("query", query_text), ("time", &time.to_string())])
            .timeout(self.request_timeout)
            .send()
            .await?;
        histogram!("telemetry_query_seconds").record(started.elapsed().as_secs_f64());
        Ok(response)
    }
}

/// Fold single-cluster rows into one deduplicated risk entry
fn collect_single(rows: &[Row]) -> ClusterRisk {
    let mut signals = RiskSignals::default();
    let mut console_url = String::new();

    for row in rows {
        let Some(name) = row.metric.get("__name__") else {
            debug!(?row, "Row received with anonymous metric");
            continue;
        };
        match name.as_str() {
            METRIC_CONSOLE_URL => {
                if let Some(url) = row.metric.get("url") {
                    console_url = url.clone();
                }
            }
            METRIC_ALERTS => match Alert::from_labels(&row.metric) {
                Some(alert) => signals.alerts.push(alert),
                None => debug!(?row, "Dropping malformed alert row"),
            },
            METRIC_CONDITIONS => match OperatorCondition::from_labels(&row.metric) {
                Some(condition) => signals.operator_conditions.push(condition),
                None => debug!(?row, "Dropping malformed operator condition row"),
            },
            other => debug!(metric = other, "Row received with unexpected metric type"),
        }
    }

    signals.dedup();
    ClusterRisk {
        signals,
        console_url,
    }
}

/// Demultiplex batch rows by their embedded cluster identifier.
///
/// Rows without a parseable `_id` or without a `__name__` discriminator are
/// dropped with a diagnostic; they never fail the batch.
fn demux_rows(rows: &[Row]) -> HashMap<Uuid, ClusterRisk> {
    let mut signals: HashMap<Uuid, RiskSignals> = HashMap::new();
    let mut console_urls: HashMap<Uuid, String> = HashMap::new();

    for row in rows {
        let Some(name) = row.metric.get("__name__") else {
            debug!(?row, "Row received with anonymous metric");
            continue;
        };
        let Some(id_label) = row.metric.get("_id") else {
            debug!(?row, "Row belongs to unknown cluster");
            continue;
        };
        let Ok(cluster_id) = Uuid::parse_str(id_label) else {
            debug!(id = %id_label, "Dropping row with unparseable cluster id");
            continue;
        };

        match name.as_str() {
            METRIC_CONSOLE_URL => {
                signals.entry(cluster_id).or_default();
                if let Some(url) = row.metric.get("url") {
                    console_urls.insert(cluster_id, url.clone());
                }
            }
            METRIC_ALERTS => match Alert::from_labels(&row.metric) {
                Some(alert) => signals.entry(cluster_id).or_default().alerts.push(alert),
                None => debug!(?row, "Dropping malformed alert row"),
            },
            METRIC_CONDITIONS => match OperatorCondition::from_labels(&row.metric) {
                Some(condition) => signals
                    .entry(cluster_id)
                    .or_default()
                    .operator_conditions
                    .push(condition),
                None => debug!(?row, "Dropping malformed operator condition row"),
            },
            other => debug!(metric = other, "Row received with unexpected metric type"),
        }
    }

    signals
        .into_iter()
        .map(|(cluster_id, mut cluster_signals)| {
            cluster_signals.dedup();
            let risk = ClusterRisk {
                signals: cluster_signals,
                console_url: console_urls.remove(&cluster_id).unwrap_or_default(),
            };
            (cluster_id, risk)
        })
        .collect()
}

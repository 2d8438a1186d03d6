//! Service metrics
//!
//! Counters and histograms go through the `metrics` facade; `main`
//! installs a Prometheus recorder and the `/metrics` route renders it.

use telemetry_metrics::{counter, histogram};

use crate::models::UpgradeRiskResponse;

/// Count a served prediction, labeled by its recommendation
pub fn record_prediction(response: &UpgradeRiskResponse) {
    let recommendation = if response.upgrade_recommended {
        "recommended"
    } else {
        "not_recommended"
    };
    counter!("upgrade_predictions_total", "recommendation" => recommendation).increment(1);
}

/// Record how many risks of each type a prediction carried
#[allow(clippy::cast_precision_loss)]
pub fn record_risk_counts(response: &UpgradeRiskResponse) {
    let predictors = &response.upgrade_risks_predictors;
    histogram!("upgrade_risks_total", "type" => "alerts").record(predictors.alerts.len() as f64);
    histogram!("upgrade_risks_total", "type" => "operator_conditions")
        .record(predictors.operator_conditions.len() as f64);
}

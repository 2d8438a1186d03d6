//! Client for the upgrade-risk scoring service
//!
//! The scoring call is opaque to the rest of the system: a set of
//! predictors goes in, a verdict comes out.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::models::{InferenceResponse, RiskSignals, RiskSignalsWithUrls, UpgradeRiskResponse};
use crate::{Error, Result};

/// Thin client for the inference (scoring) service
pub struct InferenceClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl InferenceClient {
    /// Build the client from configuration
    #[must_use]
    pub fn new(http: Client, config: &InferenceConfig) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/upgrade-risks-prediction",
                config.base_url.trim_end_matches('/')
            ),
            request_timeout: config.request_timeout,
        }
    }

    /// Score a set of risk predictors into an upgrade verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpstreamStatus`] on a non-success response and
    /// transport errors otherwise.
    pub async fn predict(&self, predictors: &RiskSignals) -> Result<UpgradeRiskResponse> {
        let response = self
            .http
            .get(&self.endpoint)
            .json(predictors)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Inference request failed");
            return Err(Error::upstream(status));
        }

        let inference: InferenceResponse = response.json().await?;
        let risks = inference.upgrade_risks_predictors;
        let verdict = UpgradeRiskResponse {
            upgrade_recommended: upgrade_recommended(&risks),
            upgrade_risks_predictors: RiskSignalsWithUrls::from(risks),
        };
        debug!(recommended = verdict.upgrade_recommended, "Inference verdict");
        Ok(verdict)
    }
}

/// An upgrade is recommended only when the model flagged no predictors
#[must_use]
pub fn upgrade_recommended(risks: &RiskSignals) -> bool {
    risks.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Alert;

    #[test]
    fn no_risks_recommends_upgrade() {
        assert!(upgrade_recommended(&RiskSignals::default()));
    }

    #[test]
    fn any_alert_blocks_the_upgrade() {
        let risks = RiskSignals {
            alerts: vec![Alert {
                name: "TargetDown".to_string(),
                namespace: None,
                severity: "critical".to_string(),
            }],
            operator_conditions: vec![],
        };
        assert!(!upgrade_recommended(&risks));
    }
}

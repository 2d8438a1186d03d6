//! Domain models for risk signals and API responses

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A firing alert for a cluster.
///
/// Equality and hashing cover every classification field so duplicate
/// upstream rows collapse to one alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alert {
    /// Alert name
    pub name: String,
    /// Namespace the alert fired in
    #[serde(default)]
    pub namespace: Option<String>,
    /// Alert severity (`warning` or `critical`)
    pub severity: String,
}

impl Alert {
    /// Parse an alert from a telemetry row's label map.
    ///
    /// The upstream emits the alert name under `alertname`; `name` is also
    /// accepted. Returns `None` when required labels are missing so the
    /// caller can drop the row with a diagnostic.
    #[must_use]
    pub fn from_labels(labels: &HashMap<String, String>) -> Option<Self> {
        let name = labels
            .get("alertname")
            .or_else(|| labels.get("name"))?
            .clone();
        let severity = labels.get("severity")?.clone();
        Some(Self {
            name,
            namespace: labels.get("namespace").cloned(),
            severity,
        })
    }
}

/// A failing operator condition for a cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorCondition {
    /// Operator name
    pub name: String,
    /// Condition that is failing (`Available`, `Degraded`)
    pub condition: String,
    /// Reason reported by the operator
    #[serde(default)]
    pub reason: Option<String>,
}

impl OperatorCondition {
    /// Parse an operator condition from a telemetry row's label map
    #[must_use]
    pub fn from_labels(labels: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            name: labels.get("name")?.clone(),
            condition: labels.get("condition")?.clone(),
            reason: labels.get("reason").cloned(),
        })
    }
}

/// Deduplicated risk signals for one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    /// Firing alerts
    pub alerts: Vec<Alert>,
    /// Failing operator conditions
    pub operator_conditions: Vec<OperatorCondition>,
}

impl RiskSignals {
    /// Whether no risk signal was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.operator_conditions.is_empty()
    }

    /// Collapse duplicate alerts and conditions by value equality,
    /// keeping first-seen order.
    pub fn dedup(&mut self) {
        let mut seen_alerts = std::collections::HashSet::new();
        self.alerts.retain(|a| seen_alerts.insert(a.clone()));
        let mut seen_conditions = std::collections::HashSet::new();
        self.operator_conditions
            .retain(|c| seen_conditions.insert(c.clone()));
    }
}

/// One cluster's risk signals plus the console URL used for deep links.
/// This is the value stored in the shared lookup cache; an empty signal
/// set with an empty URL is the explicit "no data" entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRisk {
    /// Risk signals found for the cluster
    pub signals: RiskSignals,
    /// Console base URL; empty means not yet known
    pub console_url: String,
}

/// Response body returned by the inference service
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    /// Predictors the model flagged as actual risks
    pub upgrade_risks_predictors: RiskSignals,
}

/// An alert enriched with its console deep link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertWithUrl {
    /// The underlying alert
    #[serde(flatten)]
    pub alert: Alert,
    /// Link into the console alert view; empty when the console URL is unknown
    #[serde(default)]
    pub url: String,
}

/// A failing operator condition enriched with its console deep link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConditionWithUrl {
    /// The underlying condition
    #[serde(flatten)]
    pub condition: OperatorCondition,
    /// Link into the console operator view; empty when unknown
    #[serde(default)]
    pub url: String,
}

/// Risk predictors with console links attached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignalsWithUrls {
    /// Firing alerts with links
    pub alerts: Vec<AlertWithUrl>,
    /// Failing operator conditions with links
    pub operator_conditions: Vec<OperatorConditionWithUrl>,
}

impl From<RiskSignals> for RiskSignalsWithUrls {
    fn from(signals: RiskSignals) -> Self {
        Self {
            alerts: signals
                .alerts
                .into_iter()
                .map(|alert| AlertWithUrl {
                    alert,
                    url: String::new(),
                })
                .collect(),
            operator_conditions: signals
                .operator_conditions
                .into_iter()
                .map(|condition| OperatorConditionWithUrl {
                    condition,
                    url: String::new(),
                })
                .collect(),
        }
    }
}

/// Response for the upgrade-risks-prediction endpoints: the verdict plus
/// the predictors the model flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeRiskResponse {
    /// Whether the upgrade is recommended (no risks detected)
    pub upgrade_recommended: bool,
    /// Predictors detected as actual risks, with console links
    pub upgrade_risks_predictors: RiskSignalsWithUrls,
}

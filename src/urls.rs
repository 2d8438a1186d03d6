//! Console deep links for alerts and operator conditions

use tracing::debug;
use url::Url;

use crate::models::UpgradeRiskResponse;

/// Fill each alert and operator condition with a link into the cluster
/// console. An empty console URL means the console is unknown and every
/// link stays empty.
pub fn fill_urls(response: &mut UpgradeRiskResponse, console_url: &str) {
    if console_url.is_empty() {
        return;
    }
    let Ok(base) = Url::parse(console_url) else {
        debug!(console_url, "Ignoring unparseable console URL");
        return;
    };

    for alert in &mut response.upgrade_risks_predictors.alerts {
        if alert.alert.name.is_empty() {
            continue;
        }
        if let Ok(mut link) = base.join("/monitoring/alerts") {
            link.query_pairs_mut()
                .append_pair("orderBy", "asc")
                .append_pair("sortBy", "Severity")
                .append_pair("alert-name", &alert.alert.name);
            alert.url = link.to_string();
        }
    }

    for condition in &mut response.upgrade_risks_predictors.operator_conditions {
        if condition.condition.name.is_empty() {
            continue;
        }
        if let Ok(link) = base.join(&format!(
            "/k8s/cluster/config.openshift.io~v1~ClusterOperator/{}",
            condition.condition.name
        )) {
            condition.url = link.to_string();
        }
    }
}

//! Telemetry query text construction
//!
//! The upstream treats the query as an opaque string; this module builds
//! the PromQL selecting console URLs, warning/critical alerts, and failing
//! operator conditions for a set of clusters in one shot.

use uuid::Uuid;

/// Query for the risk signals of a single cluster
#[must_use]
pub fn single_cluster_risk_signals(cluster_id: Uuid) -> String {
    risk_signals(std::slice::from_ref(&cluster_id))
}

/// Query spanning the risk signals of several clusters.
///
/// The clusters are folded into one `_id=~"a|b|c"` matcher per selector so
/// the whole batch costs a single upstream evaluation.
#[must_use]
pub fn risk_signals(cluster_ids: &[Uuid]) -> String {
    let clusters = cluster_ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join("|");

    format!(
        r#"console_url{{_id=~"{clusters}"}}
or
alerts{{_id=~"{clusters}", namespace=~"openshift-.*", severity=~"warning|critical"}}
or
cluster_operator_conditions{{_id=~"{clusters}", condition="Available"}} == 0
or
cluster_operator_conditions{{_id=~"{clusters}", condition="Degraded"}} == 1"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cluster_query_pins_the_id() {
        let id = Uuid::new_v4();
        let query = single_cluster_risk_signals(id);
        assert!(query.contains(&format!(r#"console_url{{_id=~"{id}"}}"#)));
        assert!(query.contains(r#"severity=~"warning|critical""#));
    }

    #[test]
    fn multi_cluster_query_joins_ids_with_pipe() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let query = risk_signals(&[a, b]);
        assert!(query.contains(&format!(r#"_id=~"{a}|{b}""#)));
        // All four selectors carry the same matcher
        assert_eq!(query.matches(&format!("{a}|{b}")).count(), 4);
    }

    #[test]
    fn conditions_check_available_and_degraded() {
        let query = risk_signals(&[Uuid::new_v4()]);
        assert!(query.contains(r#"condition="Available""#));
        assert!(query.contains("== 0"));
        assert!(query.contains(r#"condition="Degraded""#));
        assert!(query.contains("== 1"));
    }
}

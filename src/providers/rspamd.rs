//! Rspamd statistics provider, fed by `api/v1/get/logs/rspamd-stats`.
//!
//! The payload is one flat stats object. Scalar counters become individual
//! gauges; the `actions` and `fuzzy_hashes` maps become one labeled gauge
//! each; spam/ham and the pool/chunk counters are folded into gauges with a
//! classification/state label axis.

use async_trait::async_trait;
use prometheus::core::Collector;
use prometheus::{Gauge, GaugeVec, Opts};
use serde::Deserialize;
use std::collections::HashMap;

use super::{host_gauge, Provider, ProviderOutput};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/logs/rspamd-stats";

pub struct Rspamd;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RspamdStats {
    scanned: i64,
    learned: i64,
    actions: HashMap<String, i64>,
    spam_count: i64,
    ham_count: i64,
    connections: i64,
    control_connections: i64,
    pools_allocated: i64,
    pools_freed: i64,
    bytes_allocated: i64,
    chunks_allocated: i64,
    shared_chunks_allocated: i64,
    chunks_freed: i64,
    chunks_oversized: i64,
    fragmented: i64,
    fuzzy_hashes: HashMap<String, i64>,
}

fn scalar_gauge(host: &str, name: &str, help: &str, value: i64) -> Result<Gauge, prometheus::Error> {
    let gauge = Gauge::with_opts(Opts::new(name, help).const_label("host", host))?;
    gauge.set(value as f64);
    Ok(gauge)
}

fn map_gauge(
    host: &str,
    name: &str,
    help: &str,
    label: &str,
    values: &HashMap<String, i64>,
) -> Result<GaugeVec, prometheus::Error> {
    let gauge = host_gauge(name, help, host, &[label])?;
    for (key, value) in values {
        gauge.with_label_values(&[key]).set(*value as f64);
    }
    Ok(gauge)
}

fn classification(host: &str, stats: &RspamdStats) -> Result<GaugeVec, prometheus::Error> {
    let gauge = host_gauge(
        "mailcow_rspamd_classification",
        "Number of items classified as spam or ham",
        host,
        &["classification"],
    )?;
    gauge.with_label_values(&["spam"]).set(stats.spam_count as f64);
    gauge.with_label_values(&["ham"]).set(stats.ham_count as f64);
    Ok(gauge)
}

fn pools(host: &str, stats: &RspamdStats) -> Result<GaugeVec, prometheus::Error> {
    let gauge = host_gauge(
        "mailcow_rspamd_pools",
        "Memory pool counters by state",
        host,
        &["state"],
    )?;
    gauge.with_label_values(&["allocated"]).set(stats.pools_allocated as f64);
    gauge.with_label_values(&["freed"]).set(stats.pools_freed as f64);
    Ok(gauge)
}

fn chunks(host: &str, stats: &RspamdStats) -> Result<GaugeVec, prometheus::Error> {
    let gauge = host_gauge(
        "mailcow_rspamd_chunks",
        "Memory chunk counters by state",
        host,
        &["state"],
    )?;
    gauge.with_label_values(&["allocated"]).set(stats.chunks_allocated as f64);
    gauge.with_label_values(&["freed"]).set(stats.chunks_freed as f64);
    gauge.with_label_values(&["oversized"]).set(stats.chunks_oversized as f64);
    gauge.with_label_values(&["shared"]).set(stats.shared_chunks_allocated as f64);
    Ok(gauge)
}

fn build_collectors(
    host: &str,
    stats: &RspamdStats,
) -> Result<Vec<Box<dyn Collector>>, prometheus::Error> {
    Ok(vec![
        Box::new(scalar_gauge(host, "mailcow_rspamd_scanned", "Number of scanned mails", stats.scanned)?),
        Box::new(scalar_gauge(host, "mailcow_rspamd_learned", "Number of learned mails", stats.learned)?),
        Box::new(scalar_gauge(host, "mailcow_rspamd_connections", "Number of connections to rspamd", stats.connections)?),
        Box::new(scalar_gauge(host, "mailcow_rspamd_control_connections", "Number of control connections to rspamd", stats.control_connections)?),
        Box::new(scalar_gauge(host, "mailcow_rspamd_bytes_allocated", "Bytes allocated by rspamd", stats.bytes_allocated)?),
        Box::new(scalar_gauge(host, "mailcow_rspamd_fragmented", "Fragmented allocations", stats.fragmented)?),
        Box::new(chunks(host, stats)?),
        Box::new(pools(host, stats)?),
        Box::new(classification(host, stats)?),
        Box::new(map_gauge(
            host,
            "mailcow_rspamd_action",
            "Number of items for which a certain action has been taken",
            "action",
            &stats.actions,
        )?),
        Box::new(map_gauge(
            host,
            "mailcow_rspamd_fuzzy_hashes",
            "Fuzzy hash counters",
            "action",
            &stats.fuzzy_hashes,
        )?),
    ])
}

#[async_trait]
impl Provider for Rspamd {
    fn name(&self) -> &'static str {
        "rspamd"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let stats: RspamdStats = match api.get(ENDPOINT).await {
            Ok(stats) => stats,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };
        match build_collectors(api.host(), &stats) {
            Ok(collectors) => ProviderOutput::complete(collectors),
            Err(err) => ProviderOutput::failed(Vec::new(), err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(raw: serde_json::Value) -> RspamdStats {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_action_map_becomes_labeled_gauge() {
        let stats = stats(serde_json::json!({
            "scanned": 100,
            "actions": {"no action": 90, "reject": 7, "greylist": 3},
        }));
        let gauge = map_gauge("h", "mailcow_rspamd_action", "help", "action", &stats.actions).unwrap();

        assert_eq!(gauge.with_label_values(&["no action"]).get(), 90.0);
        assert_eq!(gauge.with_label_values(&["reject"]).get(), 7.0);
        assert_eq!(gauge.with_label_values(&["greylist"]).get(), 3.0);
    }

    #[test]
    fn test_classification_axis() {
        let stats = stats(serde_json::json!({"spam_count": 12, "ham_count": 88}));
        let gauge = classification("h", &stats).unwrap();
        assert_eq!(gauge.with_label_values(&["spam"]).get(), 12.0);
        assert_eq!(gauge.with_label_values(&["ham"]).get(), 88.0);
    }

    #[test]
    fn test_chunk_states() {
        let stats = stats(serde_json::json!({
            "chunks_allocated": 4,
            "chunks_freed": 2,
            "chunks_oversized": 1,
            "shared_chunks_allocated": 3,
        }));
        let gauge = chunks("h", &stats).unwrap();
        assert_eq!(gauge.with_label_values(&["allocated"]).get(), 4.0);
        assert_eq!(gauge.with_label_values(&["freed"]).get(), 2.0);
        assert_eq!(gauge.with_label_values(&["oversized"]).get(), 1.0);
        assert_eq!(gauge.with_label_values(&["shared"]).get(), 3.0);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let stats = stats(serde_json::json!({}));
        assert_eq!(stats.scanned, 0);
        assert!(stats.actions.is_empty());

        let collectors = build_collectors("h", &stats).unwrap();
        assert_eq!(collectors.len(), 11);
    }
}

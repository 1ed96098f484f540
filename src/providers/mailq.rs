//! Mail queue provider, fed by `api/v1/get/mailq/all`.

use async_trait::async_trait;
use prometheus::GaugeVec;
use serde::Deserialize;
use std::collections::HashMap;

use super::{host_gauge, Provider, ProviderOutput};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/mailq/all";

pub struct Mailq;

#[derive(Debug, Deserialize)]
struct QueueItem {
    queue_name: String,
    #[serde(default)]
    sender: String,
}

/// Groups queue items by `(queue, sender)` and gauges the count of each
/// pair. Input order is irrelevant; only distinct pairs matter.
fn aggregate(items: &[QueueItem], host: &str) -> Result<GaugeVec, prometheus::Error> {
    let gauge = host_gauge(
        "mailcow_mailq",
        "Number of items in the mail queue",
        host,
        &["queue", "sender"],
    )?;

    let mut counts: HashMap<(&str, &str), f64> = HashMap::new();
    for item in items {
        *counts
            .entry((item.queue_name.as_str(), item.sender.as_str()))
            .or_insert(0.0) += 1.0;
    }
    for ((queue, sender), count) in counts {
        gauge.with_label_values(&[queue, sender]).set(count);
    }

    Ok(gauge)
}

#[async_trait]
impl Provider for Mailq {
    fn name(&self) -> &'static str {
        "mailq"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let items: Vec<QueueItem> = match api.get(ENDPOINT).await {
            Ok(items) => items,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };
        match aggregate(&items, api.host()) {
            Ok(gauge) => ProviderOutput::complete(vec![Box::new(gauge)]),
            Err(err) => ProviderOutput::failed(Vec::new(), err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn items(raw: serde_json::Value) -> Vec<QueueItem> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_counts_per_queue_sender_pair() {
        let items = items(serde_json::json!([
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q1", "sender": "b"},
            {"queue_name": "q2", "sender": "a"},
        ]));
        let gauge = aggregate(&items, "mail.example.com").unwrap();

        assert_eq!(gauge.with_label_values(&["q1", "a"]).get(), 2.0);
        assert_eq!(gauge.with_label_values(&["q1", "b"]).get(), 1.0);
        assert_eq!(gauge.with_label_values(&["q2", "a"]).get(), 1.0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = items(serde_json::json!([
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q2", "sender": "a"},
        ]));
        let mut reversed = items(serde_json::json!([
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q1", "sender": "a"},
            {"queue_name": "q2", "sender": "a"},
        ]));
        reversed.reverse();

        let a = aggregate(&forward, "h").unwrap();
        let b = aggregate(&reversed, "h").unwrap();
        for labels in [["q1", "a"], ["q2", "a"]] {
            assert_eq!(
                a.with_label_values(&labels).get(),
                b.with_label_values(&labels).get()
            );
        }
    }

    #[test]
    fn test_empty_queue_yields_no_series() {
        let gauge = aggregate(&[], "h").unwrap();
        assert!(gauge.collect()[0].get_metric().is_empty());
    }
}

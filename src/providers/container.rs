//! Container status provider, fed by `api/v1/get/status/containers`.

use async_trait::async_trait;
use chrono::DateTime;
use prometheus::core::Collector;
use prometheus::GaugeVec;
use serde::Deserialize;
use std::collections::HashMap;

use super::{host_gauge, Provider, ProviderOutput};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/status/containers";

pub struct Container;

#[derive(Debug, Deserialize)]
struct ContainerItem {
    container: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    started_at: String,
    #[serde(default)]
    image: String,
}

struct ContainerGauges {
    running: GaugeVec,
    start_time: GaugeVec,
}

impl ContainerGauges {
    fn new(host: &str) -> Result<Self, prometheus::Error> {
        Ok(Self {
            running: host_gauge(
                "mailcow_container_running",
                "1 if the container is running, 0 if not",
                host,
                &["container", "image"],
            )?,
            start_time: host_gauge(
                "mailcow_container_start",
                "Unix timestamp of the container start",
                host,
                &["container", "image"],
            )?,
        })
    }

    fn fill(&self, items: &HashMap<String, ContainerItem>) {
        for item in items.values() {
            let labels = [item.container.as_str(), item.image.as_str()];
            let is_running = if item.state == "running" { 1.0 } else { 0.0 };
            self.running.with_label_values(&labels).set(is_running);
            self.start_time
                .with_label_values(&labels)
                .set(parse_start_time(&item.started_at));
        }
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![Box::new(self.running.clone()), Box::new(self.start_time.clone())]
    }
}

/// Stopped containers report an empty `started_at`; those (and anything else
/// that is not RFC 3339) map to 0.
fn parse_start_time(started_at: &str) -> f64 {
    DateTime::parse_from_rfc3339(started_at)
        .map(|t| t.timestamp() as f64)
        .unwrap_or(0.0)
}

#[async_trait]
impl Provider for Container {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let gauges = match ContainerGauges::new(api.host()) {
            Ok(gauges) => gauges,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };

        let items: HashMap<String, ContainerItem> = match api.get(ENDPOINT).await {
            Ok(items) => items,
            Err(err) => return ProviderOutput::failed(gauges.collectors(), err.into()),
        };

        gauges.fill(&items);
        ProviderOutput::complete(gauges.collectors())
    }
}

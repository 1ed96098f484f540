//! Quarantine provider, fed by `api/v1/get/quarantine/all`.
//!
//! Counts quarantined items per recipient, split by virus flag, and observes
//! the spam score and the age of each item into fixed-bucket histograms.

use async_trait::async_trait;
use chrono::Utc;
use prometheus::core::Collector;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec};
use serde::Deserialize;
use std::collections::HashMap;

use super::{host_gauge, Provider, ProviderOutput};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/quarantine/all";

const SCORE_BUCKETS: &[f64] = &[0.0, 10.0, 20.0, 40.0, 60.0, 80.0, 100.0];

const HOUR: f64 = 60.0 * 60.0;
const DAY: f64 = 24.0 * HOUR;
const AGE_BUCKETS: &[f64] = &[
    3.0 * HOUR,
    12.0 * HOUR,
    DAY,
    3.0 * DAY,
    7.0 * DAY,
    14.0 * DAY,
    30.0 * DAY,
];

pub struct Quarantine;

#[derive(Debug, Deserialize)]
struct QuarantineItem {
    #[serde(default)]
    virus_flag: i64,
    #[serde(default)]
    score: f64,
    #[serde(rename = "rcpt", default)]
    recipient: String,
    #[serde(default)]
    created: i64,
}

struct QuarantineMetrics {
    count: GaugeVec,
    score: HistogramVec,
    age: HistogramVec,
}

impl QuarantineMetrics {
    fn new(host: &str) -> Result<Self, prometheus::Error> {
        Ok(Self {
            count: host_gauge(
                "mailcow_quarantine_count",
                "Number of quarantined mails for this recipient",
                host,
                &["recipient", "is_virus"],
            )?,
            score: HistogramVec::new(
                HistogramOpts::new(
                    "mailcow_quarantine_score",
                    "Spam score of quarantined items",
                )
                .buckets(SCORE_BUCKETS.to_vec())
                .const_label("host", host),
                &["recipient"],
            )?,
            age: HistogramVec::new(
                HistogramOpts::new(
                    "mailcow_quarantine_age",
                    "Age of quarantined items in seconds",
                )
                .buckets(AGE_BUCKETS.to_vec())
                .const_label("host", host),
                &["recipient"],
            )?,
        })
    }

    /// `now` is passed in so the age computation stays deterministic in tests.
    fn fill(&self, items: &[QuarantineItem], now: i64) {
        let mut virus: HashMap<&str, f64> = HashMap::new();
        let mut not_virus: HashMap<&str, f64> = HashMap::new();

        for item in items {
            let recipient = item.recipient.as_str();
            // Both series exist for every recipient, even at zero.
            virus.entry(recipient).or_insert(0.0);
            not_virus.entry(recipient).or_insert(0.0);
            let counts = if item.virus_flag == 1 {
                &mut virus
            } else {
                &mut not_virus
            };
            *counts.entry(recipient).or_insert(0.0) += 1.0;

            self.age
                .with_label_values(&[recipient])
                .observe((now - item.created) as f64);
            self.score.with_label_values(&[recipient]).observe(item.score);
        }

        for (recipient, count) in virus {
            self.count.with_label_values(&[recipient, "1"]).set(count);
        }
        for (recipient, count) in not_virus {
            self.count.with_label_values(&[recipient, "0"]).set(count);
        }
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.count.clone()),
            Box::new(self.score.clone()),
            Box::new(self.age.clone()),
        ]
    }
}

#[async_trait]
impl Provider for Quarantine {
    fn name(&self) -> &'static str {
        "quarantine"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let metrics = match QuarantineMetrics::new(api.host()) {
            Ok(metrics) => metrics,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };

        let items: Vec<QuarantineItem> = match api.get(ENDPOINT).await {
            Ok(items) => items,
            Err(err) => return ProviderOutput::failed(metrics.collectors(), err.into()),
        };

        metrics.fill(&items, Utc::now().timestamp());
        ProviderOutput::complete(metrics.collectors())
    }
}

//! Mailbox provider, fed by `api/v1/get/mailbox/all`.
//!
//! One gauge per numeric field, labeled by mailbox. `last_imap_login` is
//! special: mailcow reports "never" for unused mailboxes, which maps to 0
//! instead of failing the provider.

use async_trait::async_trait;
use prometheus::core::Collector;
use prometheus::GaugeVec;
use serde::Deserialize;

use super::{host_gauge, Provider, ProviderError, ProviderOutput, RawNumber};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/mailbox/all";

pub struct Mailbox;

#[derive(Debug, Deserialize)]
struct MailboxItem {
    username: String,
    #[serde(default)]
    last_imap_login: RawNumber,
    #[serde(default)]
    quota: RawNumber,
    #[serde(default)]
    quota_used: RawNumber,
    #[serde(default)]
    messages: RawNumber,
}

struct MailboxGauges {
    last_login: GaugeVec,
    quota_allowed: GaugeVec,
    quota_used: GaugeVec,
    messages: GaugeVec,
}

impl MailboxGauges {
    fn new(host: &str) -> Result<Self, prometheus::Error> {
        Ok(Self {
            last_login: host_gauge(
                "mailcow_mailbox_last_login",
                "Timestamp of the last IMAP login for this mailbox",
                host,
                &["mailbox"],
            )?,
            quota_allowed: host_gauge(
                "mailcow_mailbox_quota_allowed",
                "Quota maximum for the mailbox in bytes",
                host,
                &["mailbox"],
            )?,
            quota_used: host_gauge(
                "mailcow_mailbox_quota_used",
                "Current size of the mailbox in bytes",
                host,
                &["mailbox"],
            )?,
            messages: host_gauge(
                "mailcow_mailbox_messages",
                "Number of messages in the mailbox",
                host,
                &["mailbox"],
            )?,
        })
    }

    fn fill(&self, items: &[MailboxItem]) -> Result<(), ProviderError> {
        for item in items {
            let quota = item.quota.as_f64(ENDPOINT, "quota")?;
            let quota_used = item.quota_used.as_f64(ENDPOINT, "quota_used")?;
            let messages = item.messages.as_f64(ENDPOINT, "messages")?;

            self.last_login
                .with_label_values(&[&item.username])
                .set(item.last_imap_login.as_f64_or_zero());
            self.quota_allowed
                .with_label_values(&[&item.username])
                .set(quota);
            self.quota_used
                .with_label_values(&[&item.username])
                .set(quota_used);
            self.messages
                .with_label_values(&[&item.username])
                .set(messages);
        }
        Ok(())
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.last_login.clone()),
            Box::new(self.quota_allowed.clone()),
            Box::new(self.quota_used.clone()),
            Box::new(self.messages.clone()),
        ]
    }
}

#[async_trait]
impl Provider for Mailbox {
    fn name(&self) -> &'static str {
        "mailbox"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let gauges = match MailboxGauges::new(api.host()) {
            Ok(gauges) => gauges,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };

        let items: Vec<MailboxItem> = match api.get(ENDPOINT).await {
            Ok(items) => items,
            Err(err) => return ProviderOutput::failed(gauges.collectors(), err.into()),
        };

        match gauges.fill(&items) {
            Ok(()) => ProviderOutput::complete(gauges.collectors()),
            Err(err) => ProviderOutput::failed(gauges.collectors(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(raw: serde_json::Value) -> Vec<MailboxItem> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_mailbox_gauges_per_field() {
        let gauges = MailboxGauges::new("mail.example.com").unwrap();
        let items = items(serde_json::json!([{
            "username": "user@example.com",
            "last_imap_login": "1693000000",
            "quota": 10240,
            "quota_used": "512",
            "messages": 42,
        }]));
        gauges.fill(&items).unwrap();

        let labels = ["user@example.com"];
        assert_eq!(gauges.last_login.with_label_values(&labels).get(), 1693000000.0);
        assert_eq!(gauges.quota_allowed.with_label_values(&labels).get(), 10240.0);
        assert_eq!(gauges.quota_used.with_label_values(&labels).get(), 512.0);
        assert_eq!(gauges.messages.with_label_values(&labels).get(), 42.0);
    }

    #[test]
    fn test_never_logged_in_maps_to_zero() {
        let gauges = MailboxGauges::new("h").unwrap();
        let items = items(serde_json::json!([{
            "username": "fresh@example.com",
            "last_imap_login": "never",
            "quota": 0,
            "quota_used": 0,
            "messages": 0,
        }]));
        gauges.fill(&items).unwrap();
        assert_eq!(
            gauges.last_login.with_label_values(&["fresh@example.com"]).get(),
            0.0
        );
    }

    #[test]
    fn test_bad_quota_aborts_with_field_error() {
        let gauges = MailboxGauges::new("h").unwrap();
        let items = items(serde_json::json!([{
            "username": "user@example.com",
            "last_imap_login": 0,
            "quota": "not-a-number",
            "quota_used": 0,
            "messages": 0,
        }]));
        let err = gauges.fill(&items).unwrap_err();
        match err {
            ProviderError::Field { field, endpoint, .. } => {
                assert_eq!(field, "quota");
                assert_eq!(endpoint, ENDPOINT);
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }
}

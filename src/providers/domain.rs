//! Domain provider, fed by `api/v1/get/domain/all`.
//!
//! Mailcow reports most domain figures as quoted numbers. All fields are
//! parsed strictly: one bad value aborts the provider with an error naming
//! the field, rather than silently gauging garbage.

use async_trait::async_trait;
use prometheus::core::Collector;
use prometheus::GaugeVec;
use serde::Deserialize;

use super::{host_gauge, Provider, ProviderError, ProviderOutput, RawNumber};
use crate::api::MailcowApiClient;

const ENDPOINT: &str = "api/v1/get/domain/all";

pub struct Domain;

#[derive(Debug, Deserialize)]
struct DomainItem {
    #[serde(rename = "domain_name")]
    domain: String,
    #[serde(default)]
    active: RawNumber,
    #[serde(rename = "mboxes_in_domain", default)]
    mailboxes: RawNumber,
    #[serde(rename = "max_num_mboxes_for_domain", default)]
    max_mailboxes: RawNumber,
    #[serde(rename = "aliases_in_domain", default)]
    aliases: RawNumber,
    #[serde(rename = "max_num_aliases_for_domain", default)]
    max_aliases: RawNumber,
    #[serde(rename = "max_quota_for_domain", default)]
    quota: RawNumber,
    #[serde(rename = "bytes_total", default)]
    quota_used: RawNumber,
    #[serde(rename = "msgs_total", default)]
    messages: RawNumber,
}

struct DomainGauges {
    active: GaugeVec,
    mailboxes: GaugeVec,
    max_mailboxes: GaugeVec,
    aliases: GaugeVec,
    max_aliases: GaugeVec,
    quota_allowed: GaugeVec,
    quota_used: GaugeVec,
    messages: GaugeVec,
}

impl DomainGauges {
    fn new(host: &str) -> Result<Self, prometheus::Error> {
        let gauge = |name, help| host_gauge(name, help, host, &["domain"]);
        Ok(Self {
            active: gauge("mailcow_domain_active", "Active flag for this domain")?,
            mailboxes: gauge(
                "mailcow_domain_mailboxes",
                "Current mailbox count for the domain",
            )?,
            max_mailboxes: gauge(
                "mailcow_domain_max_mailboxes",
                "Maximum amount of mailboxes for the domain",
            )?,
            aliases: gauge(
                "mailcow_domain_aliases",
                "Current alias count for the domain",
            )?,
            max_aliases: gauge(
                "mailcow_domain_max_aliases",
                "Maximum amount of aliases for the domain",
            )?,
            quota_allowed: gauge(
                "mailcow_domain_quota_allowed",
                "Aggregate quota maximum for the domain in bytes",
            )?,
            quota_used: gauge(
                "mailcow_domain_quota_used",
                "Current size of the domain in bytes",
            )?,
            messages: gauge(
                "mailcow_domain_messages",
                "Number of messages in the domain's mailboxes",
            )?,
        })
    }

    fn fill(&self, items: &[DomainItem]) -> Result<(), ProviderError> {
        for item in items {
            let labels = [item.domain.as_str()];
            self.active
                .with_label_values(&labels)
                .set(item.active.as_f64(ENDPOINT, "active")?);
            self.mailboxes
                .with_label_values(&labels)
                .set(item.mailboxes.as_f64(ENDPOINT, "mboxes_in_domain")?);
            self.max_mailboxes
                .with_label_values(&labels)
                .set(item.max_mailboxes.as_f64(ENDPOINT, "max_num_mboxes_for_domain")?);
            self.aliases
                .with_label_values(&labels)
                .set(item.aliases.as_f64(ENDPOINT, "aliases_in_domain")?);
            self.max_aliases
                .with_label_values(&labels)
                .set(item.max_aliases.as_f64(ENDPOINT, "max_num_aliases_for_domain")?);
            self.quota_allowed
                .with_label_values(&labels)
                .set(item.quota.as_f64(ENDPOINT, "max_quota_for_domain")?);
            self.quota_used
                .with_label_values(&labels)
                .set(item.quota_used.as_f64(ENDPOINT, "bytes_total")?);
            self.messages
                .with_label_values(&labels)
                .set(item.messages.as_f64(ENDPOINT, "msgs_total")?);
        }
        Ok(())
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.active.clone()),
            Box::new(self.mailboxes.clone()),
            Box::new(self.max_mailboxes.clone()),
            Box::new(self.aliases.clone()),
            Box::new(self.max_aliases.clone()),
            Box::new(self.quota_allowed.clone()),
            Box::new(self.quota_used.clone()),
            Box::new(self.messages.clone()),
        ]
    }
}

#[async_trait]
impl Provider for Domain {
    fn name(&self) -> &'static str {
        "domain"
    }

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput {
        let gauges = match DomainGauges::new(api.host()) {
            Ok(gauges) => gauges,
            Err(err) => return ProviderOutput::failed(Vec::new(), err.into()),
        };

        let items: Vec<DomainItem> = match api.get(ENDPOINT).await {
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

    fn items(raw: serde_json::Value) -> Vec<DomainItem> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_all_fields_gauged_per_domain() {
        let gauges = DomainGauges::new("h").unwrap();
        let items = items(serde_json::json!([{
            "domain_name": "example.com",
            "active": "1",
            "mboxes_in_domain": 3,
            "max_num_mboxes_for_domain": "10",
            "aliases_in_domain": 7,
            "max_num_aliases_for_domain": "400",
            "max_quota_for_domain": "10737418240",
            "bytes_total": 52428800,
            "msgs_total": "1234",
        }]));
        gauges.fill(&items).unwrap();

        let labels = ["example.com"];
        assert_eq!(gauges.active.with_label_values(&labels).get(), 1.0);
        assert_eq!(gauges.mailboxes.with_label_values(&labels).get(), 3.0);
        assert_eq!(gauges.max_mailboxes.with_label_values(&labels).get(), 10.0);
        assert_eq!(gauges.aliases.with_label_values(&labels).get(), 7.0);
        assert_eq!(gauges.max_aliases.with_label_values(&labels).get(), 400.0);
        assert_eq!(gauges.quota_allowed.with_label_values(&labels).get(), 10737418240.0);
        assert_eq!(gauges.quota_used.with_label_values(&labels).get(), 52428800.0);
        assert_eq!(gauges.messages.with_label_values(&labels).get(), 1234.0);
    }

    #[test]
    fn test_bad_field_aborts_and_is_named() {
        let gauges = DomainGauges::new("h").unwrap();
        let items = items(serde_json::json!([{
            "domain_name": "example.com",
            "active": "1",
            "mboxes_in_domain": 3,
            "max_num_mboxes_for_domain": 10,
            "aliases_in_domain": 7,
            "max_num_aliases_for_domain": 400,
            "max_quota_for_domain": "unlimited",
            "bytes_total": 0,
            "msgs_total": 0,
        }]));
        let err = gauges.fill(&items).unwrap_err();
        match err {
            ProviderError::Field { field, endpoint, value } => {
                assert_eq!(field, "max_quota_for_domain");
                assert_eq!(endpoint, ENDPOINT);
                assert_eq!(value, "unlimited");
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }
}

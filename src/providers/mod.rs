//! Metric providers — one per mailcow metric family.
//!
//! A provider owns exactly one API endpoint: it fetches the endpoint through
//! the shared [`MailcowApiClient`], aggregates the decoded payload, and hands
//! back a set of freshly built collectors. Providers never see each other and
//! never keep state between scrapes.

use async_trait::async_trait;
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};
use serde::Deserialize;
use thiserror::Error;

use crate::api::{ApiError, MailcowApiClient};

pub mod container;
pub mod domain;
pub mod mailbox;
pub mod mailq;
pub mod quarantine;
pub mod rspamd;

pub use container::Container;
pub use domain::Domain;
pub use mailbox::Mailbox;
pub use mailq::Mailq;
pub use quarantine::Quarantine;
pub use rspamd::Rspamd;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid numeric value {value:?} in field `{field}` of `{endpoint}` response")]
    Field {
        endpoint: &'static str,
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Metric(#[from] prometheus::Error),
}

/// What one provider produced for the current scrape. Collectors that were
/// already constructed are returned even when the provider failed midway, so
/// the orchestrator can still register the partial structure.
pub struct ProviderOutput {
    pub collectors: Vec<Box<dyn Collector>>,
    pub error: Option<ProviderError>,
}

impl ProviderOutput {
    pub fn complete(collectors: Vec<Box<dyn Collector>>) -> Self {
        Self {
            collectors,
            error: None,
        }
    }

    pub fn failed(collectors: Vec<Box<dyn Collector>>, error: ProviderError) -> Self {
        Self {
            collectors,
            error: Some(error),
        }
    }
}

/// The capability every metric family implements. `name` becomes the
/// `provider` label on the exporter's success gauge.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn provide(&self, api: &MailcowApiClient) -> ProviderOutput;
}

/// A numeric field as mailcow actually sends it: sometimes a JSON number,
/// sometimes a quoted one, occasionally not a number at all ("never").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl Default for RawNumber {
    fn default() -> Self {
        RawNumber::Number(0.0)
    }
}

impl RawNumber {
    /// Strict parse: a non-numeric value aborts the provider with an error
    /// naming the endpoint and field.
    pub fn as_f64(
        &self,
        endpoint: &'static str,
        field: &'static str,
    ) -> Result<f64, ProviderError> {
        match self {
            RawNumber::Number(value) => Ok(*value),
            RawNumber::Text(text) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| ProviderError::Field {
                        endpoint,
                        field,
                        value: text.clone(),
                    })
            }
        }
    }

    /// Lenient parse for fields that are legitimately non-numeric, such as a
    /// last-login timestamp of "never". Invalid or empty text maps to 0.
    pub fn as_f64_or_zero(&self) -> f64 {
        match self {
            RawNumber::Number(value) => *value,
            RawNumber::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        }
    }
}

/// All gauges of one provider share the `host` const label anyway.
pub(crate) fn host_gauge(
    name: &str,
    help: &str,
    host: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help).const_label("host", host), labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_number_accepts_numbers_and_numeric_strings() {
        let n: RawNumber = serde_json::from_value(serde_json::json!(42.5)).unwrap();
        assert_eq!(n.as_f64("e", "f").unwrap(), 42.5);

        let s: RawNumber = serde_json::from_value(serde_json::json!("3172")).unwrap();
        assert_eq!(s.as_f64("e", "f").unwrap(), 3172.0);
    }

    #[test]
    fn test_raw_number_strict_names_the_field() {
        let s: RawNumber = serde_json::from_value(serde_json::json!("never")).unwrap();
        let err = s.as_f64("api/v1/get/mailbox/all", "last_imap_login").unwrap_err();
        match err {
            ProviderError::Field { endpoint, field, value } => {
                assert_eq!(endpoint, "api/v1/get/mailbox/all");
                assert_eq!(field, "last_imap_login");
                assert_eq!(value, "never");
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_number_lenient_falls_back_to_zero() {
        let never: RawNumber = serde_json::from_value(serde_json::json!("never")).unwrap();
        assert_eq!(never.as_f64_or_zero(), 0.0);

        let empty: RawNumber = serde_json::from_value(serde_json::json!("")).unwrap();
        assert_eq!(empty.as_f64_or_zero(), 0.0);

        let fractional: RawNumber = serde_json::from_value(serde_json::json!("1693000000.25")).unwrap();
        assert_eq!(fractional.as_f64_or_zero(), 1693000000.25);
    }
}

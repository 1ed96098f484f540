//! Per-scrape registry assembly.
//!
//! One call builds one API client and one registry, runs every provider in
//! its fixed order and merges the results. A failing provider never aborts
//! the scrape of the others; it only pulls its success flag to 0.

use anyhow::Context;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::warn;

use crate::api::MailcowApiClient;
use crate::providers::{
    Container, Domain, Mailbox, Mailq, Provider, Quarantine, Rspamd,
};

/// The fixed provider order for every scrape.
fn providers() -> Vec<Box<dyn Provider>> {
    vec![
        Box::new(Mailq),
        Box::new(Mailbox),
        Box::new(Quarantine),
        Box::new(Container),
        Box::new(Rspamd),
        Box::new(Domain),
    ]
}

/// Polls the mailcow instance at `host` and assembles a fresh registry.
///
/// Only a failure to build the client or the base success gauge is an error
/// here; anything a single provider runs into is isolated, logged and
/// reflected in `mailcow_exporter_success{provider=...}`.
pub async fn collect_metrics(
    scheme: &str,
    host: &str,
    api_key: &str,
) -> anyhow::Result<Registry> {
    let api = MailcowApiClient::new(scheme, host, api_key)
        .context("could not construct mailcow API client")?;

    let registry = Registry::new();
    let success = GaugeVec::new(
        Opts::new(
            "mailcow_exporter_success",
            "1 if the provider's collection succeeded during this scrape, 0 if not",
        )
        .const_label("host", host),
        &["provider"],
    )
    .context("could not construct the exporter success gauge")?;
    registry
        .register(Box::new(success.clone()))
        .context("could not register the exporter success gauge")?;

    for provider in providers() {
        let name = provider.name();
        let output = provider.provide(&api).await;

        let mut healthy = output.error.is_none();
        if let Some(err) = &output.error {
            warn!(provider = name, host, error = %err, "provider collection failed");
        }
        for collector in output.collectors {
            if let Err(err) = registry.register(collector) {
                warn!(provider = name, host, error = %err, "could not register collector");
                healthy = false;
            }
        }

        success
            .with_label_values(&[name])
            .set(if healthy { 1.0 } else { 0.0 });
    }

    for collector in api.collectors() {
        if let Err(err) = registry.register(collector) {
            warn!(host, error = %err, "could not register API client instrumentation");
        }
    }

    Ok(registry)
}

//! Instrumented client for the mailcow management API.
//!
//! One client is built per scrape and bound to the requested
//! `(scheme, host, apiKey)`. Every `get` performs exactly one authenticated
//! HTTP GET — no retries, no caching — and records latency, body size and a
//! success flag into gauge vectors that the orchestrator merges into the
//! per-scrape registry.

use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};
use serde::de::DeserializeOwned;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Everything that can go wrong during one API call, each failure mode
/// classified separately so the scrape output stays diagnosable.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not build request URL for `{endpoint}`: {source}")]
    RequestConstruction {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to `{endpoint}` failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("`{endpoint}` answered HTTP {status}: {body}")]
    UpstreamStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("could not read response body of `{endpoint}`: {source}")]
    BodyRead {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode `{endpoint}` response: {source}; body was: {body}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

pub struct MailcowApiClient {
    scheme: String,
    host: String,
    api_key: String,
    client: reqwest::Client,
    response_time: GaugeVec,
    response_size: GaugeVec,
    success: GaugeVec,
}

impl MailcowApiClient {
    pub fn new(scheme: &str, host: &str, api_key: &str) -> Result<Self, prometheus::Error> {
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            response_time: GaugeVec::new(
                Opts::new(
                    "mailcow_api_response_time",
                    "Response time of the API in milliseconds",
                )
                .const_label("host", host),
                &["endpoint", "status_code"],
            )?,
            response_size: GaugeVec::new(
                Opts::new("mailcow_api_response_size", "Size of the API response in bytes")
                    .const_label("host", host),
                &["endpoint", "status_code"],
            )?,
            success: GaugeVec::new(
                Opts::new(
                    "mailcow_api_success",
                    "1 if the last call to this endpoint succeeded, 0 if not",
                )
                .const_label("host", host),
                &["endpoint"],
            )?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Performs one authenticated GET against `{scheme}://{host}/{endpoint}`
    /// and decodes the JSON body. A non-2xx status is reported before any
    /// decoding is attempted.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let raw = format!("{}://{}/{}", self.scheme, self.host, endpoint);
        let url = Url::parse(&raw).map_err(|source| {
            self.mark(endpoint, false);
            ApiError::RequestConstruction {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;
        debug!(%url, "requesting mailcow endpoint");

        let start = Instant::now();
        let response = match self
            .client
            .get(url)
            .header("X-Api-Key", self.api_key.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(source) => {
                self.mark(endpoint, false);
                return Err(ApiError::Transport {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        let status_label = status.as_u16().to_string();
        self.response_time
            .with_label_values(&[endpoint, &status_label])
            .set(start.elapsed().as_millis() as f64);

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(source) => {
                self.mark(endpoint, false);
                return Err(ApiError::BodyRead {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        };
        self.response_size
            .with_label_values(&[endpoint, &status_label])
            .set(body.len() as f64);

        if !status.is_success() {
            self.mark(endpoint, false);
            return Err(ApiError::UpstreamStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        match serde_json::from_slice(&body) {
            Ok(value) => {
                self.mark(endpoint, true);
                Ok(value)
            }
            Err(source) => {
                self.mark(endpoint, false);
                Err(ApiError::Decode {
                    endpoint: endpoint.to_string(),
                    source,
                    body: String::from_utf8_lossy(&body).into_owned(),
                })
            }
        }
    }

    fn mark(&self, endpoint: &str, ok: bool) {
        self.success
            .with_label_values(&[endpoint])
            .set(if ok { 1.0 } else { 0.0 });
    }

    /// Instrumentation about the API calls themselves, registered into the
    /// scrape registry after all providers ran.
    pub fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.response_time.clone()),
            Box::new(self.response_size.clone()),
            Box::new(self.success.clone()),
        ]
    }
}

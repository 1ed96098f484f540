//! On-demand Prometheus exporter for mailcow mail servers.
//!
//! Every scrape request polls the mailcow management API of the requested
//! host and rebuilds the full metric set from scratch: a fresh API client,
//! a fresh registry, one upstream request per provider. Nothing survives
//! the request, so concurrent scrapes of different hosts never interfere.

pub mod api;
pub mod orchestrator;
pub mod providers;
pub mod server;

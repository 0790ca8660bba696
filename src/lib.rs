//! FRITZ!Box UPnP Prometheus Exporter
//!
//! A Prometheus metrics exporter for FRITZ!Box-style home gateways, scraping
//! values over the gateway's UPnP/TR-064 SOAP interface.
//!
//! # Overview
//!
//! The exporter discovers the gateway's service tree from its XML descriptors
//! (the open IGD tree plus, with credentials, the digest-authenticated TR-064
//! tree), then answers each Prometheus scrape by invoking the SOAP actions the
//! declared metrics reference and converting the typed results to samples.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐       HTTP/SOAP       ┌──────────────┐
//! │  FRITZ!Box  │ ◄───────────────────► │   Exporter   │
//! │   gateway   │   XML descriptors,    │              │
//! └─────────────┘   action calls        │  ┌────────┐  │      HTTP      ┌────────────┐
//!                                       │  │  UPnP  │  │ ◄────────────► │ Prometheus │
//!                                       │  │ client │  │   /metrics     └────────────┘
//!                                       │  └────────┘  │
//!                                       │  ┌─────────┐ │
//!                                       │  │Collector│ │
//!                                       │  └─────────┘ │
//!                                       └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`upnp`] - descriptor loading, SOAP action invocation, typed results
//! - [`collector`] - snapshot slots, background loaders, the scrape cycle
//! - [`metrics`] - metric declarations and Prometheus handles
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use fritzbox_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - ✅ WAN traffic, link and connection-status metrics out of the box
//! - ✅ Any (service, action, result) triple declarable via YAML
//! - ✅ Digest-authenticated TR-064 services
//! - ✅ One action call per scrape regardless of how many metrics share it
//! - ✅ TLS support with optional certificate verification

pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod upnp;

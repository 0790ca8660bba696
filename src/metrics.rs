//! Metric declarations and Prometheus handles.
//!
//! Gateway metrics are declared, not hardcoded: each record names the
//! (service, action, result) triple to scrape plus how to present it. The
//! declarations come from a YAML file or, when none is configured, from the
//! built-in WAN/WLAN set. Each accepted record becomes one registered
//! Counter/Gauge vector with the fixed `gateway` label and, for label-valued
//! metrics, the declared secondary label.
//!
//! The exporter's own diagnostics (call and error counters) live in
//! [`ExporterMetrics`], owned by the registry instead of global state.

use anyhow::Context;
use prometheus::{CounterVec, Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Deserialize;
use tracing::warn;

/// Namespace for the exporter's own diagnostics counters.
const NAMESPACE: &str = "fritzbox_exporter";

/// Call and error counters for the collection pipeline.
#[derive(Clone)]
pub struct ExporterMetrics {
    /// Number of SOAP action invocations
    pub num_calls: IntCounter,
    /// Load, invocation and conversion errors
    pub collect_errors: IntCounter,
    pub service_not_found: IntCounterVec,
    pub action_not_found: IntCounterVec,
    pub result_not_found: IntCounterVec,
}

impl ExporterMetrics {
    pub fn new(registry: &Registry) -> crate::error::Result<Self> {
        let num_calls = IntCounter::with_opts(
            Opts::new("calls", "Number of calls to a service action.").namespace(NAMESPACE),
        )?;
        let collect_errors = IntCounter::with_opts(
            Opts::new("collect_errors", "Number of collection errors.").namespace(NAMESPACE),
        )?;
        let service_not_found = IntCounterVec::new(
            Opts::new(
                "service_not_found",
                "Declared metrics whose service is missing from the loaded trees.",
            )
            .namespace(NAMESPACE),
            &["service"],
        )?;
        let action_not_found = IntCounterVec::new(
            Opts::new(
                "action_not_found",
                "Declared metrics whose action is missing from its service.",
            )
            .namespace(NAMESPACE),
            &["action"],
        )?;
        let result_not_found = IntCounterVec::new(
            Opts::new(
                "result_not_found",
                "Declared metrics whose result is missing from the action response.",
            )
            .namespace(NAMESPACE),
            &["result"],
        )?;

        registry.register(Box::new(num_calls.clone()))?;
        registry.register(Box::new(collect_errors.clone()))?;
        registry.register(Box::new(service_not_found.clone()))?;
        registry.register(Box::new(action_not_found.clone()))?;
        registry.register(Box::new(result_not_found.clone()))?;

        Ok(Self {
            num_calls,
            collect_errors,
            service_not_found,
            action_not_found,
            result_not_found,
        })
    }
}

/// One declared gateway metric. Parsed once at startup, immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricDecl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub help: String,
    /// "counter" or "gauge"
    #[serde(rename = "type", default)]
    pub kind: String,
    /// serviceType URN to look up in the loaded trees
    pub service: String,
    pub action: String,
    /// State-variable name to pick out of the action result
    pub result: String,
    /// When set, a string result equal to this maps to 1 and anything else
    /// to 0
    #[serde(default)]
    pub ok_value: Option<String>,
    /// When set, the sample value is 1 and the stringified result becomes
    /// this extra label
    #[serde(default)]
    pub label_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

enum Handle {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// A validated declaration bound to its registered Prometheus vector.
pub struct GatewayMetric {
    pub decl: MetricDecl,
    handle: Handle,
}

impl GatewayMetric {
    fn register(decl: MetricDecl, kind: MetricKind, registry: &Registry) -> crate::error::Result<Self> {
        let mut labels = vec!["gateway"];
        if let Some(label) = &decl.label_name {
            labels.push(label.as_str());
        }

        // prometheus rejects empty help strings
        let help = if decl.help.is_empty() {
            decl.name.clone()
        } else {
            decl.help.clone()
        };
        let opts = Opts::new(decl.name.clone(), help);

        let handle = match kind {
            MetricKind::Counter => Handle::Counter(CounterVec::new(opts, &labels)?),
            MetricKind::Gauge => Handle::Gauge(GaugeVec::new(opts, &labels)?),
        };
        match &handle {
            Handle::Counter(c) => registry.register(Box::new(c.clone()))?,
            Handle::Gauge(g) => registry.register(Box::new(g.clone()))?,
        }

        Ok(Self { decl, handle })
    }

    /// Counters reject negative increments; callers must route negative
    /// values elsewhere.
    pub fn is_counter(&self) -> bool {
        matches!(self.handle, Handle::Counter(_))
    }

    /// Fresh counter children start at zero after a reset, so one `inc_by`
    /// sets the scraped value exactly.
    pub fn set(&self, labels: &[&str], value: f64) {
        match &self.handle {
            Handle::Counter(c) => c.with_label_values(labels).inc_by(value),
            Handle::Gauge(g) => g.with_label_values(labels).set(value),
        }
    }

    /// Drop all samples from the previous cycle.
    pub fn reset(&self) {
        match &self.handle {
            Handle::Counter(c) => c.reset(),
            Handle::Gauge(g) => g.reset(),
        }
    }
}

/// Load metric declarations from a YAML file, or fall back to the built-in
/// set when no file is configured.
pub fn load_declarations(path: Option<&str>) -> anyhow::Result<Vec<MetricDecl>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read metrics file {path}"))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("cannot parse metrics file {path}"))
        }
        None => Ok(default_declarations()),
    }
}

/// Validate declarations and register one vector per accepted record.
/// Records without a display name or with an unrecognized type are dropped
/// with a warning, never fatally; so are names the registry rejects.
pub fn register_metrics(declarations: Vec<MetricDecl>, registry: &Registry) -> Vec<GatewayMetric> {
    let mut metrics = Vec::with_capacity(declarations.len());
    for decl in declarations {
        if decl.name.is_empty() {
            warn!(
                "dropping metric declaration without a name ({}#{})",
                decl.service, decl.action
            );
            continue;
        }
        let kind = match decl.kind.to_ascii_lowercase().as_str() {
            "counter" => MetricKind::Counter,
            "gauge" => MetricKind::Gauge,
            other => {
                warn!("dropping metric {}: unrecognized type {:?}", decl.name, other);
                continue;
            }
        };
        let name = decl.name.clone();
        match GatewayMetric::register(decl, kind, registry) {
            Ok(metric) => metrics.push(metric),
            Err(e) => warn!("dropping metric {}: {}", name, e),
        }
    }
    metrics
}

/// Render everything in the registry in Prometheus text format.
pub fn render(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

const WAN_COMMON: &str = "urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1";
const WAN_IP: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";
const WLAN: &str = "urn:dslforum-org:service:WLANConfiguration:1";

fn decl(name: &str, help: &str, kind: &str, service: &str, action: &str, result: &str) -> MetricDecl {
    MetricDecl {
        name: name.to_string(),
        help: help.to_string(),
        kind: kind.to_string(),
        service: service.to_string(),
        action: action.to_string(),
        result: result.to_string(),
        ok_value: None,
        label_name: None,
    }
}

/// The stock WAN/WLAN metric set every gateway answers on its IGD tree.
pub fn default_declarations() -> Vec<MetricDecl> {
    let mut declarations = vec![
        decl(
            "gateway_wan_packets_received",
            "packets received on gateway WAN interface",
            "counter",
            WAN_COMMON,
            "GetTotalPacketsReceived",
            "TotalPacketsReceived",
        ),
        decl(
            "gateway_wan_packets_sent",
            "packets sent on gateway WAN interface",
            "counter",
            WAN_COMMON,
            "GetTotalPacketsSent",
            "TotalPacketsSent",
        ),
        decl(
            "gateway_wan_bytes_received",
            "bytes received on gateway WAN interface",
            "counter",
            WAN_COMMON,
            "GetAddonInfos",
            "TotalBytesReceived",
        ),
        decl(
            "gateway_wan_bytes_sent",
            "bytes sent on gateway WAN interface",
            "counter",
            WAN_COMMON,
            "GetAddonInfos",
            "TotalBytesSent",
        ),
        decl(
            "gateway_wan_bytes_receive_rate",
            "byte receive rate on gateway WAN interface",
            "gauge",
            WAN_COMMON,
            "GetAddonInfos",
            "ByteReceiveRate",
        ),
        decl(
            "gateway_wan_bytes_send_rate",
            "byte send rate on gateway WAN interface",
            "gauge",
            WAN_COMMON,
            "GetAddonInfos",
            "ByteSendRate",
        ),
        decl(
            "gateway_wan_layer1_upstream_max_bitrate",
            "Layer1 upstream max bitrate",
            "gauge",
            WAN_COMMON,
            "GetCommonLinkProperties",
            "Layer1UpstreamMaxBitRate",
        ),
        decl(
            "gateway_wan_layer1_downstream_max_bitrate",
            "Layer1 downstream max bitrate",
            "gauge",
            WAN_COMMON,
            "GetCommonLinkProperties",
            "Layer1DownstreamMaxBitRate",
        ),
        decl(
            "gateway_wan_connection_uptime_seconds",
            "WAN connection uptime",
            "gauge",
            WAN_IP,
            "GetStatusInfo",
            "Uptime",
        ),
        decl(
            "gateway_wlan_current_connections",
            "current WLAN connections",
            "gauge",
            WLAN,
            "GetTotalAssociations",
            "TotalAssociations",
        ),
    ];

    let mut link_status = decl(
        "gateway_wan_layer1_link_status",
        "Status of physical link (Up = 1)",
        "gauge",
        WAN_COMMON,
        "GetCommonLinkProperties",
        "PhysicalLinkStatus",
    );
    link_status.ok_value = Some("Up".to_string());
    declarations.push(link_status);

    let mut connection_status = decl(
        "gateway_wan_connection_status",
        "WAN connection status (Connected = 1)",
        "gauge",
        WAN_IP,
        "GetStatusInfo",
        "ConnectionStatus",
    );
    connection_status.ok_value = Some("Connected".to_string());
    declarations.push(connection_status);

    declarations
}

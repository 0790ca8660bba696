//! Metric declaration parsing, validation and registration.

use fritzbox_exporter::metrics::{
    default_declarations, register_metrics, render, ExporterMetrics, MetricDecl,
};
use prometheus::Registry;

#[test]
fn test_yaml_declarations_parse() {
    let yaml = r#"
- name: gateway_wan_bytes_sent
  help: bytes sent on gateway WAN interface
  type: counter
  service: "urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1"
  action: GetAddonInfos
  result: TotalBytesSent
- name: gateway_wan_link_status
  type: gauge
  service: "urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1"
  action: GetCommonLinkProperties
  result: PhysicalLinkStatus
  ok_value: "Up"
- name: gateway_wan_access_type
  type: gauge
  service: "urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1"
  action: GetCommonLinkProperties
  result: WANAccessType
  label_name: access_type
"#;
    let declarations: Vec<MetricDecl> = serde_yaml::from_str(yaml).expect("Failed to parse YAML");

    assert_eq!(declarations.len(), 3);
    assert_eq!(declarations[0].kind, "counter");
    assert_eq!(declarations[1].ok_value.as_deref(), Some("Up"));
    assert_eq!(declarations[2].label_name.as_deref(), Some("access_type"));
}

#[test]
fn test_invalid_records_are_dropped_not_fatal() {
    let yaml = r#"
- name: ""
  type: counter
  service: "urn:x"
  action: GetA
  result: A
- name: bad_kind
  type: histogram
  service: "urn:x"
  action: GetB
  result: B
- name: good_metric
  type: gauge
  service: "urn:x"
  action: GetC
  result: C
"#;
    let declarations: Vec<MetricDecl> = serde_yaml::from_str(yaml).unwrap();
    let registry = Registry::new();
    let metrics = register_metrics(declarations, &registry);

    // The nameless record and the unrecognized kind are dropped with a
    // warning; the valid record survives.
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].decl.name, "good_metric");
}

#[test]
fn test_duplicate_names_are_dropped() {
    let mut declarations = Vec::new();
    for _ in 0..2 {
        declarations.push(MetricDecl {
            name: "gateway_twice".to_string(),
            help: "declared twice".to_string(),
            kind: "gauge".to_string(),
            service: "urn:x".to_string(),
            action: "GetX".to_string(),
            result: "X".to_string(),
            ok_value: None,
            label_name: None,
        });
    }

    let registry = Registry::new();
    let metrics = register_metrics(declarations, &registry);
    assert_eq!(metrics.len(), 1);
}

#[test]
fn test_default_declarations_all_register() {
    let registry = Registry::new();
    let metrics = register_metrics(default_declarations(), &registry);
    assert_eq!(metrics.len(), 12);
}

#[test]
fn test_set_and_render() {
    let registry = Registry::new();
    let metrics = register_metrics(default_declarations(), &registry);

    let bytes_received = metrics
        .iter()
        .find(|m| m.decl.name == "gateway_wan_bytes_received")
        .unwrap();
    bytes_received.set(&["fritz.box"], 5_000_000_000.0);

    let rendered = render(&registry).expect("Failed to render metrics");
    assert!(rendered.contains("# TYPE gateway_wan_bytes_received counter"));
    assert!(rendered.contains(r#"gateway_wan_bytes_received{gateway="fritz.box"} 5000000000"#));

    // Reset drops the sample but rendering still works
    bytes_received.reset();
    let rendered = render(&registry).unwrap();
    assert!(!rendered.contains(r#"gateway="fritz.box"} 5000000000"#));
}

#[test]
fn test_exporter_counters_render_under_namespace() {
    let registry = Registry::new();
    let counters = ExporterMetrics::new(&registry).expect("Failed to create counters");

    counters.num_calls.inc();
    counters.service_not_found.with_label_values(&["urn:x"]).inc();

    let rendered = render(&registry).unwrap();
    assert!(rendered.contains("fritzbox_exporter_calls 1"));
    assert!(rendered.contains(r#"fritzbox_exporter_service_not_found{service="urn:x"} 1"#));
}

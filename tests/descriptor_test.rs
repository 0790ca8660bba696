//! Descriptor and SCPD parsing tests against fixture documents.

use fritzbox_exporter::upnp::root::{link_service, parse_descriptor, parse_scpd, ServiceDescription};

const DESCRIPTOR: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <friendlyName>FRITZ!Box 7590</friendlyName>
    <manufacturer>AVM Berlin</manufacturer>
    <modelName>FRITZ!Box 7590</modelName>
    <modelDescription>FRITZ!Box 7590</modelDescription>
    <UDN>uuid:75802409-bccb-40e7-8e6c-000000000000</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-any-com:service:Any:1</serviceType>
        <serviceId>urn:any-com:serviceId:any1</serviceId>
        <controlURL>/igdupnp/control/any</controlURL>
        <eventSubURL>/igdupnp/control/any</eventSubURL>
        <SCPDURL>/any.xml</SCPDURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:WANDevice:1</deviceType>
        <friendlyName>WANDevice - FRITZ!Box 7590</friendlyName>
        <manufacturer>AVM Berlin</manufacturer>
        <modelName>FRITZ!Box 7590</modelName>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:WANCommonIFC1</serviceId>
            <controlURL>/igdupnp/control/WANCommonIFC1</controlURL>
            <eventSubURL>/igdupnp/control/WANCommonIFC1</eventSubURL>
            <SCPDURL>/igdicfgSCPD.xml</SCPDURL>
          </service>
        </serviceList>
        <deviceList>
          <device>
            <deviceType>urn:schemas-upnp-org:device:WANConnectionDevice:1</deviceType>
            <friendlyName>WANConnectionDevice - FRITZ!Box 7590</friendlyName>
            <manufacturer>AVM Berlin</manufacturer>
            <modelName>FRITZ!Box 7590</modelName>
            <serviceList>
              <service>
                <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
                <serviceId>urn:upnp-org:serviceId:WANIPConn1</serviceId>
                <controlURL>/igdupnp/control/WANIPConn1</controlURL>
                <eventSubURL>/igdupnp/control/WANIPConn1</eventSubURL>
                <SCPDURL>/igdconnSCPD.xml</SCPDURL>
              </service>
            </serviceList>
          </device>
        </deviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

const SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetTotalBytesSent</name>
      <argumentList>
        <argument>
          <name>NewTotalBytesSent</name>
          <direction>out</direction>
          <relatedStateVariable>TotalBytesSent</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>SetEnable</name>
      <argumentList>
        <argument>
          <name>NewEnable</name>
          <direction>in</direction>
          <relatedStateVariable>Enable</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>GetMystery</name>
      <argumentList>
        <argument>
          <name>NewMystery</name>
          <direction>out</direction>
          <relatedStateVariable>NoSuchVariable</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable>
      <name>TotalBytesSent</name>
      <dataType>ui4</dataType>
      <defaultValue>0</defaultValue>
    </stateVariable>
    <stateVariable>
      <name>Enable</name>
      <dataType>boolean</dataType>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

fn service_description() -> ServiceDescription {
    ServiceDescription {
        service_type: "urn:schemas-upnp-org:service:WANCommonInterfaceConfig:1".to_string(),
        service_id: "urn:upnp-org:serviceId:WANCommonIFC1".to_string(),
        control_url: "/igdupnp/control/WANCommonIFC1".to_string(),
        event_sub_url: "/igdupnp/control/WANCommonIFC1".to_string(),
        scpd_url: "/igdicfgSCPD.xml".to_string(),
    }
}

#[test]
fn test_descriptor_device_tree() {
    let device = parse_descriptor(DESCRIPTOR).expect("Failed to parse descriptor");

    assert_eq!(device.friendly_name, "FRITZ!Box 7590");
    assert_eq!(device.manufacturer, "AVM Berlin");
    assert_eq!(device.service_list.services.len(), 1);
    assert_eq!(device.device_list.devices.len(), 1);

    let wan = &device.device_list.devices[0];
    assert_eq!(
        wan.device_type,
        "urn:schemas-upnp-org:device:WANDevice:1"
    );
    assert_eq!(wan.service_list.services.len(), 1);
    assert_eq!(
        wan.service_list.services[0].scpd_url,
        "/igdicfgSCPD.xml"
    );

    // Devices nest arbitrarily deep
    let conn = &wan.device_list.devices[0];
    assert_eq!(
        conn.service_list.services[0].service_type,
        "urn:schemas-upnp-org:service:WANIPConnection:1"
    );
}

#[test]
fn test_descriptor_without_subdevices() {
    let xml = r#"<root><device>
        <deviceType>urn:x:device:Solo:1</deviceType>
        <friendlyName>Solo</friendlyName>
    </device></root>"#;
    let device = parse_descriptor(xml).expect("Failed to parse minimal descriptor");
    assert!(device.service_list.services.is_empty());
    assert!(device.device_list.devices.is_empty());
}

#[test]
fn test_malformed_descriptor_is_an_error() {
    assert!(parse_descriptor("<root><device>").is_err());
    assert!(parse_descriptor("not xml at all").is_err());
}

#[test]
fn test_scpd_actions_and_state_variables() {
    let scpd = parse_scpd(SCPD).expect("Failed to parse SCPD");

    assert_eq!(scpd.action_list.actions.len(), 3);
    assert_eq!(scpd.state_table.variables.len(), 2);
    assert_eq!(scpd.action_list.actions[0].name, "GetTotalBytesSent");
    assert_eq!(scpd.state_table.variables[0].data_type, "ui4");
}

#[test]
fn test_link_resolves_arguments_to_state_variables() {
    let scpd = parse_scpd(SCPD).unwrap();
    let service = link_service(service_description(), scpd);

    assert_eq!(service.actions.len(), 3);
    assert_eq!(service.state_variables.len(), 2);

    let action = &service.actions["GetTotalBytesSent"];
    let argument = &action.argument_map["NewTotalBytesSent"];
    let variable = argument
        .state_variable
        .as_ref()
        .expect("argument should be linked");
    assert_eq!(variable.name, "TotalBytesSent");
    assert_eq!(variable.data_type, "ui4");
}

#[test]
fn test_unresolved_state_variable_is_not_fatal() {
    let scpd = parse_scpd(SCPD).unwrap();
    let service = link_service(service_description(), scpd);

    // GetMystery references a state variable the table does not declare;
    // linking succeeds and leaves the reference unset.
    let argument = &service.actions["GetMystery"].argument_map["NewMystery"];
    assert!(argument.state_variable.is_none());
    assert_eq!(argument.related_state_variable, "NoSuchVariable");
}

#[test]
fn test_is_get_only() {
    let scpd = parse_scpd(SCPD).unwrap();
    let service = link_service(service_description(), scpd);

    assert!(service.actions["GetTotalBytesSent"].is_get_only());
    assert!(!service.actions["SetEnable"].is_get_only());

    // An action without any arguments reports nothing and is not a getter
    let empty = parse_scpd(
        r#"<scpd><actionList><action><name>Reboot</name></action></actionList></scpd>"#,
    )
    .unwrap();
    let service = link_service(service_description(), empty);
    assert!(!service.actions["Reboot"].is_get_only());
}

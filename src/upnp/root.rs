//! Descriptor loading and the resolved service tree.
//!
//! A [`Root`] is built in two phases: the device descriptor is parsed as a
//! whole document into a declared tree, then each declared service's SCPD is
//! fetched and linked into the resolved model. The result is immutable; the
//! collector swaps whole snapshots, never mutating one in place.

use crate::config::GatewayConfig;
use crate::error::{ExporterError, Result};
use crate::upnp::client::SoapClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

// Wire schemas, parsed whole-document with quick-xml's serde support.

#[derive(Debug, Deserialize)]
struct DescriptorDocument {
    device: DeviceDescription,
}

/// `<device>` element of a descriptor document.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceDescription {
    #[serde(rename = "deviceType", default)]
    pub device_type: String,
    #[serde(rename = "friendlyName", default)]
    pub friendly_name: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(rename = "modelName", default)]
    pub model_name: String,
    #[serde(rename = "modelDescription", default)]
    pub model_description: String,
    #[serde(rename = "UDN", default)]
    pub udn: String,
    #[serde(rename = "serviceList", default)]
    pub service_list: ServiceList,
    #[serde(rename = "deviceList", default)]
    pub device_list: DeviceList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceList {
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceList {
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceDescription>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDescription {
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "serviceId", default)]
    pub service_id: String,
    #[serde(rename = "controlURL", default)]
    pub control_url: String,
    #[serde(rename = "eventSubURL", default)]
    pub event_sub_url: String,
    #[serde(rename = "SCPDURL", default)]
    pub scpd_url: String,
}

/// Service Control Protocol Description: a service's actions and state
/// variables, both in document order.
#[derive(Debug, Default, Deserialize)]
pub struct Scpd {
    #[serde(rename = "actionList", default)]
    pub action_list: ActionTable,
    #[serde(rename = "serviceStateTable", default)]
    pub state_table: StateVariableTable,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionTable {
    #[serde(rename = "action", default)]
    pub actions: Vec<ActionDescription>,
}

#[derive(Debug, Deserialize)]
pub struct ActionDescription {
    pub name: String,
    #[serde(rename = "argumentList", default)]
    pub argument_list: ArgumentList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArgumentList {
    #[serde(rename = "argument", default)]
    pub arguments: Vec<ArgumentDescription>,
}

#[derive(Debug, Deserialize)]
pub struct ArgumentDescription {
    pub name: String,
    #[serde(default)]
    pub direction: String,
    #[serde(rename = "relatedStateVariable", default)]
    pub related_state_variable: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateVariableTable {
    #[serde(rename = "stateVariable", default)]
    pub variables: Vec<StateVariableDescription>,
}

#[derive(Debug, Deserialize)]
pub struct StateVariableDescription {
    pub name: String,
    #[serde(rename = "dataType", default)]
    pub data_type: String,
    #[serde(rename = "defaultValue", default)]
    pub default_value: String,
}

// Resolved model. The Root exclusively owns the tree; services, actions and
// state variables are shared within it via Arc, never back up the tree.

/// One fully linked descriptor tree.
#[derive(Debug)]
pub struct Root {
    pub(crate) base_url: String,
    pub(crate) client: Arc<SoapClient>,
    pub device: Device,
    /// Flat view of the tree keyed by serviceType URN, built depth-first.
    /// On a duplicate serviceType the later device wins.
    pub services: HashMap<String, Arc<Service>>,
}

#[derive(Debug)]
pub struct Device {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_description: String,
    pub udn: String,
    pub services: Vec<Arc<Service>>,
    pub devices: Vec<Device>,
}

#[derive(Debug)]
pub struct Service {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
    pub actions: HashMap<String, Arc<Action>>,
    pub state_variables: Vec<Arc<StateVariable>>,
}

#[derive(Debug)]
pub struct Action {
    pub name: String,
    pub arguments: Vec<Arc<Argument>>,
    /// Same arguments keyed by name for O(1) lookup while decoding.
    pub argument_map: HashMap<String, Arc<Argument>>,
}

impl Action {
    /// Whether the action only reports values: at least one argument and none
    /// flowing in. Only such actions are invoked by the exporter.
    pub fn is_get_only(&self) -> bool {
        !self.arguments.is_empty() && self.arguments.iter().all(|a| a.direction != "in")
    }
}

#[derive(Debug)]
pub struct Argument {
    pub name: String,
    pub direction: String,
    pub related_state_variable: String,
    /// Resolved during linking; `None` when the SCPD references an unknown
    /// state variable, in which case decoding this argument fails.
    pub state_variable: Option<Arc<StateVariable>>,
}

#[derive(Debug)]
pub struct StateVariable {
    pub name: String,
    /// UPnP data type tag ("string", "boolean", "ui4", ...); drives result
    /// conversion.
    pub data_type: String,
    pub default_value: String,
}

pub fn parse_descriptor(xml: &str) -> Result<DeviceDescription> {
    let document: DescriptorDocument = quick_xml::de::from_str(xml)?;
    Ok(document.device)
}

pub fn parse_scpd(xml: &str) -> Result<Scpd> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// Link a declared service to its SCPD: build the action map and resolve each
/// argument's related state variable by exact name. An unresolved reference
/// is left unset rather than failing the load.
pub fn link_service(description: ServiceDescription, scpd: Scpd) -> Service {
    let state_variables: Vec<Arc<StateVariable>> = scpd
        .state_table
        .variables
        .into_iter()
        .map(|v| {
            Arc::new(StateVariable {
                name: v.name,
                data_type: v.data_type,
                default_value: v.default_value,
            })
        })
        .collect();

    let mut actions = HashMap::new();
    for action in scpd.action_list.actions {
        let arguments: Vec<Arc<Argument>> = action
            .argument_list
            .arguments
            .into_iter()
            .map(|argument| {
                let state_variable = state_variables
                    .iter()
                    .find(|v| v.name == argument.related_state_variable)
                    .cloned();
                Arc::new(Argument {
                    name: argument.name,
                    direction: argument.direction,
                    related_state_variable: argument.related_state_variable,
                    state_variable,
                })
            })
            .collect();

        let argument_map = arguments
            .iter()
            .map(|argument| (argument.name.clone(), argument.clone()))
            .collect();

        actions.insert(
            action.name.clone(),
            Arc::new(Action {
                name: action.name,
                arguments,
                argument_map,
            }),
        );
    }

    Service {
        service_type: description.service_type,
        service_id: description.service_id,
        control_url: description.control_url,
        event_sub_url: description.event_sub_url,
        scpd_url: description.scpd_url,
        actions,
        state_variables,
    }
}

impl Root {
    /// Fetch one descriptor and fully link its tree. Any network or parse
    /// error aborts the whole load; no partial Root is ever returned. Retry
    /// policy lives in the collector's loader task, not here.
    pub async fn load(config: &GatewayConfig, descriptor: &str) -> Result<Root> {
        let base_url = config.base_url();
        let client = Arc::new(SoapClient::new(config)?);

        let response = client.get(&format!("{base_url}/{descriptor}")).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ExporterError::DescriptorNotFound(descriptor.to_string()));
        }
        if !response.status().is_success() {
            return Err(ExporterError::DescriptorStatus {
                descriptor: descriptor.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let description = parse_descriptor(&body)?;
        debug!("parsed descriptor {} for {}", descriptor, description.friendly_name);

        let mut services = HashMap::new();
        let device = build_device(&client, &base_url, description, &mut services).await?;

        Ok(Root {
            base_url,
            client,
            device,
            services,
        })
    }
}

/// Depth-first resolution of a declared device: fetch and link every service's
/// SCPD, insert it into the flat service map, then recurse into sub-devices.
fn build_device<'a>(
    client: &'a Arc<SoapClient>,
    base_url: &'a str,
    description: DeviceDescription,
    services: &'a mut HashMap<String, Arc<Service>>,
) -> Pin<Box<dyn Future<Output = Result<Device>> + Send + 'a>> {
    Box::pin(async move {
        let mut resolved = Vec::with_capacity(description.service_list.services.len());
        for declared in description.service_list.services {
            let body = client
                .get(&format!("{base_url}{}", declared.scpd_url))
                .await?
                .error_for_status()?
                .text()
                .await?;
            let scpd = parse_scpd(&body)?;

            let service = Arc::new(link_service(declared, scpd));
            if services
                .insert(service.service_type.clone(), service.clone())
                .is_some()
            {
                warn!(
                    "duplicate serviceType {}: keeping the later occurrence",
                    service.service_type
                );
            }
            resolved.push(service);
        }

        let mut children = Vec::with_capacity(description.device_list.devices.len());
        for child in description.device_list.devices {
            children.push(build_device(client, base_url, child, services).await?);
        }

        Ok(Device {
            device_type: description.device_type,
            friendly_name: description.friendly_name,
            manufacturer: description.manufacturer,
            model_name: description.model_name,
            model_description: description.model_description,
            udn: description.udn,
            services: resolved,
            devices: children,
        })
    })
}

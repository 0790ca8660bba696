//! SOAP action invocation and typed result decoding.
//!
//! An action with no input arguments is invoked by POSTing an empty,
//! namespaced SOAP body element to the service's control URL. The response is
//! decoded as a token stream: any element whose local name matches a declared
//! output argument contributes a value, converted per the argument's state
//! variable data type and stored under the state variable's name. Elements
//! the device omits are simply absent from the result.

use crate::error::{ExporterError, Result};
use crate::upnp::root::{Action, Argument, Root, Service, StateVariable};
use chrono::NaiveDateTime;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::fmt;

const DATE_TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// A decoded output value, tagged by the originating state variable's UPnP
/// data type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::DateTime(t) => write!(f, "{}", t.format(DATE_TIME_LAYOUT)),
        }
    }
}

/// Output arguments of one call, keyed by state-variable name. Arguments
/// aliasing the same state variable overwrite each other; last one wins.
pub type ActionResult = HashMap<String, Value>;

impl Root {
    /// Invoke an action through this root's transport and decode the result.
    /// Only meaningful for actions without input arguments; the SOAP body
    /// carries none.
    pub async fn call(&self, service: &Service, action: &Action) -> Result<ActionResult> {
        let url = format!("{}{}", self.base_url, service.control_url);
        let soap_action = format!("\"{}#{}\"", service.service_type, action.name);
        let envelope = soap_envelope(&action.name, &service.service_type);

        let response = self
            .client
            .post_soap(&url, &soap_action, envelope)
            .await
            .map_err(|e| match e {
                ExporterError::Http(source) => ExporterError::CallFailed {
                    action: action.name.clone(),
                    source,
                },
                other => other,
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ExporterError::Unauthorized {
                action: action.name.clone(),
            });
        }

        let body = response.text().await.map_err(|source| ExporterError::CallFailed {
            action: action.name.clone(),
            source,
        })?;

        decode_response(action, &body)
    }
}

fn soap_envelope(action: &str, service_type: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\
         <s:Envelope s:encodingStyle='http://schemas.xmlsoap.org/soap/encoding/' \
         xmlns:s='http://schemas.xmlsoap.org/soap/envelope/'>\
         <s:Body><u:{action} xmlns:u='{service_type}' /></s:Body></s:Envelope>"
    )
}

/// Token-stream decode of a SOAP response body against an action's declared
/// output arguments. Reaching end of document without error is success, even
/// when declared arguments never appeared in the body.
pub fn decode_response(action: &Action, body: &str) -> Result<ActionResult> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut result = ActionResult::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = start.local_name();
                let name = String::from_utf8_lossy(name.as_ref());
                let Some(argument) = action.argument_map.get(name.as_ref()) else {
                    continue;
                };

                // The very next token decides: character data is the raw
                // value, an end element means empty, anything else is a
                // malformed response.
                let raw = match reader.read_event()? {
                    Event::Text(text) => text
                        .xml_content()
                        .map_err(|_| invalid_response(action))?
                        .into_owned(),
                    Event::CData(data) => String::from_utf8_lossy(&data.into_inner()).into_owned(),
                    Event::End(_) => String::new(),
                    _ => return Err(invalid_response(action)),
                };
                store(argument, raw, &mut result)?;
            }
            Event::Empty(empty) => {
                let name = empty.local_name();
                let name = String::from_utf8_lossy(name.as_ref());
                if let Some(argument) = action.argument_map.get(name.as_ref()) {
                    store(argument, String::new(), &mut result)?;
                }
            }
            Event::Eof => return Ok(result),
            _ => {}
        }
    }
}

fn invalid_response(action: &Action) -> ExporterError {
    ExporterError::InvalidSoapResponse {
        action: action.name.clone(),
    }
}

fn store(argument: &Argument, raw: String, result: &mut ActionResult) -> Result<()> {
    let variable = argument
        .state_variable
        .as_ref()
        .ok_or_else(|| ExporterError::UnlinkedArgument {
            argument: argument.name.clone(),
        })?;
    let value = convert(variable, raw)?;
    result.insert(variable.name.clone(), value);
    Ok(())
}

fn convert(variable: &StateVariable, raw: String) -> Result<Value> {
    match variable.data_type.as_str() {
        "string" => Ok(Value::Text(raw)),
        "boolean" => Ok(Value::Bool(raw == "1")),
        // ui4 counters legitimately exceed 2^32 on the wire; decode all
        // unsigned widths as u64
        "ui1" | "ui2" | "ui4" => raw
            .parse::<u64>()
            .map(Value::Unsigned)
            .map_err(|e| invalid_value(variable, &raw, e)),
        "i1" | "i2" | "i4" => raw
            .parse::<i64>()
            .map(Value::Signed)
            .map_err(|e| invalid_value(variable, &raw, e)),
        "dateTime" => NaiveDateTime::parse_from_str(&raw, DATE_TIME_LAYOUT)
            .map(Value::DateTime)
            .map_err(|e| invalid_value(variable, &raw, e)),
        _ => Err(ExporterError::UnknownDataType {
            data_type: variable.data_type.clone(),
            value: raw,
        }),
    }
}

fn invalid_value(variable: &StateVariable, raw: &str, reason: impl fmt::Display) -> ExporterError {
    ExporterError::InvalidValue {
        data_type: variable.data_type.clone(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

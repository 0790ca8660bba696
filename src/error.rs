use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("descriptor {0} not found (HTTP 404): is UPnP discovery enabled on the gateway?")]
    DescriptorNotFound(String),

    #[error("cannot load descriptor {descriptor}: HTTP status {status}")]
    DescriptorStatus { descriptor: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot parse descriptor: {0}")]
    Descriptor(#[from] quick_xml::DeError),

    #[error("cannot parse SOAP response: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("cannot call {action}: {source}")]
    CallFailed {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot call {action}: status 401 unauthorized")]
    Unauthorized { action: String },

    #[error("invalid SOAP response for action {action}")]
    InvalidSoapResponse { action: String },

    #[error("argument {argument} has no related state variable")]
    UnlinkedArgument { argument: String },

    #[error("unknown UPnP data type {data_type}: {value}")]
    UnknownDataType { data_type: String, value: String },

    #[error("cannot parse {value:?} as {data_type}: {reason}")]
    InvalidValue {
        data_type: String,
        value: String,
        reason: String,
    },

    #[error("digest authentication failed: {0}")]
    DigestAuth(#[from] digest_auth::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, ExporterError>;

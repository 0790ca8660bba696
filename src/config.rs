use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Connection parameters for the gateway's UPnP/TR-064 endpoints.
/// Immutable once startup overrides have been applied.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Hostname or IP of the gateway
    pub host: String,
    /// Plaintext UPnP port
    pub port: u16,
    /// TLS UPnP port, used when `use_tls` is set
    pub port_tls: u16,
    pub use_tls: bool,
    /// TR-064 username; when empty, requests are unauthenticated and the
    /// TR-064 tree is not loaded
    pub username: String,
    pub password: SecretString,
    pub allow_self_signed: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "fritz.box".to_string(),
            port: 49000,
            port_tls: 49443,
            use_tls: false,
            username: String::new(),
            password: SecretString::from(""),
            allow_self_signed: true,
        }
    }
}

impl GatewayConfig {
    /// Scheme, host and port for every descriptor fetch and SOAP call.
    pub fn base_url(&self) -> String {
        if self.use_tls {
            format!("https://{}:{}", self.host, self.port_tls)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 9133,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Optional YAML file of metric declarations; the built-in WAN/WLAN set
    /// is used when unset
    pub metrics_file: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("FRITZBOX_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

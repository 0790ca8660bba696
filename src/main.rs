use anyhow::Result;
use clap::Parser;
use fritzbox_exporter::config::{Config, GatewayConfig};
use fritzbox_exporter::server;
use fritzbox_exporter::upnp::{self, Root};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// Gateway hostname or IP (overrides config)
    #[arg(long, env = "FRITZBOX_HOST")]
    gateway_host: Option<String>,

    /// Username for TR-064 services (overrides config)
    #[arg(long, env = "FRITZBOX_USERNAME")]
    username: Option<String>,

    /// Password for TR-064 services (overrides config)
    #[arg(long, env = "FRITZBOX_PASSWORD")]
    password: Option<String>,

    /// Port to listen on for metrics
    #[arg(short, long, env = "EXPORTER_PORT", default_value = "9133")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "EXPORTER_ADDR", default_value = "0.0.0.0")]
    addr: String,

    /// Print all available IGD metrics to stdout and exit
    #[arg(long)]
    test_igd: bool,

    /// Print all available TR-064 metrics to stdout and exit
    #[arg(long)]
    test_tr064: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting FRITZ!Box UPnP Exporter v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(host) = args.gateway_host {
        config.gateway.host = host;
    }
    if let Some(username) = args.username {
        config.gateway.username = username;
    }
    if let Some(password) = args.password {
        config.gateway.password = secrecy::SecretString::new(password.into());
    }
    config.server.port = args.port;
    config.server.addr = args.addr;

    if args.test_igd {
        return print_available_metrics(&config.gateway, upnp::IGD_DESCRIPTOR).await;
    }
    if args.test_tr064 {
        anyhow::ensure!(
            !config.gateway.username.is_empty(),
            "no username/password configured for TR-064"
        );
        return print_available_metrics(&config.gateway, upnp::TR064_DESCRIPTOR).await;
    }

    info!("Gateway: {}", config.gateway.host);
    info!(
        "Metrics endpoint: http://{}:{}/metrics",
        config.server.addr, config.server.port
    );

    // Start the metrics server
    if let Err(e) = server::start(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Walk every service of one descriptor tree and print the result of each
/// query-style action. Handy for discovering which (service, action, result)
/// triples a particular gateway model offers.
async fn print_available_metrics(gateway: &GatewayConfig, descriptor: &str) -> Result<()> {
    let root = Root::load(gateway, descriptor).await?;

    for service in root.services.values() {
        println!("{} ({})", service.service_type, service.scpd_url);
        for action in service.actions.values() {
            if !action.is_get_only() {
                continue;
            }
            match root.call(service, action).await {
                Ok(result) => {
                    println!("  {}", action.name);
                    for argument in &action.arguments {
                        let Some(variable) = &argument.state_variable else {
                            continue;
                        };
                        if let Some(value) = result.get(&variable.name) {
                            println!("    {}: {}", variable.name, value);
                        }
                    }
                }
                Err(e) => warn!("cannot call {}: {}", action.name, e),
            }
        }
    }

    Ok(())
}

use std::path::PathBuf;
use clap::Parser;
use log::{info, warn};

use ember_mugd::config::Config;
use ember_mugd::device::session::MugSession;
use ember_mugd::device::transport::BtleTransport;
use ember_mugd::error::AppRunError;
use ember_mugd::init_logging;

#[derive(Parser)]
#[command(name = "ember-mugd", version, about = "Maintains a persistent session with an Ember mug")]
struct Args {
    /// Bluetooth address of the mug; overrides the config file
    #[arg(long)]
    address: Option<String>,

    /// Report temperatures in Fahrenheit
    #[arg(long)]
    imperial: bool,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn fmt_reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{}{}", value, unit),
        None => "unknown".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("ember-mugd ", env!("CARGO_PKG_VERSION")));

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).await?;
    let address = args.address.or(config.mac_address).ok_or(AppRunError::NoAddress)?;
    let use_metric = if args.imperial { false } else { config.use_metric };

    let transport = BtleTransport::find(&address).await?;
    let (session, handle, mut updates) = MugSession::new(transport, use_metric);
    let session_task = tokio::spawn(session.run());

    let unit = if use_metric { "°C" } else { "°F" };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                handle.disconnect();
                break;
            }
            changed = updates.recv() => match changed {
                Some(()) => {
                    let snapshot = handle.snapshot();
                    info!(
                        "Mug {}: connection={:?} status={:?} current={} target={} battery={} color={} available={}",
                        snapshot.address,
                        snapshot.connection_status,
                        snapshot.mug_status,
                        fmt_reading(snapshot.current_temp, unit),
                        fmt_reading(snapshot.target_temp, unit),
                        fmt_reading(snapshot.battery_percent, "%"),
                        snapshot.color_hex().unwrap_or_else(|| "unknown".to_string()),
                        snapshot.available,
                    );
                }
                None => break,
            }
        }
    }

    if let Err(err) = session_task.await {
        warn!("Failed to join session task: {:?}", err);
    }

    Ok(())
}

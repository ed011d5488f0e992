//! One-shot discovery tool: scans for peripherals advertising the mug's
//! name and probes each match with a connect+pair cycle.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use clap::Parser;
use tokio::time::{sleep, Duration};

use ember_mugd::device::constants::MUG_DEVICE_NAME;
use ember_mugd::error::TransportError;
use ember_mugd::init_logging;

#[derive(Parser)]
#[command(name = "find-mugs", version, about = "Scan for Ember mugs and probe pairing")]
struct Args {
    /// How long to scan before probing, in seconds
    #[arg(long, default_value_t = 10)]
    scan_seconds: u64,
}

async fn probe(peripheral: &Peripheral) -> Result<(), TransportError> {
    peripheral.connect().await?;
    println!("  connected: {}", peripheral.is_connected().await?);
    println!("  pairing is delegated to the platform stack");
    peripheral.disconnect().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), TransportError> {
    init_logging();
    let args = Args::parse();

    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(TransportError::NoAdapter);
    }

    println!("Searching for \"{}\" for {}s...", MUG_DEVICE_NAME, args.scan_seconds);
    for adapter in &adapters {
        adapter.start_scan(ScanFilter::default()).await?;
    }

    sleep(Duration::from_secs(args.scan_seconds)).await;

    let mut found = 0;
    for adapter in &adapters {
        for peripheral in adapter.peripherals().await? {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(err) => {
                    eprintln!("Could not query peripheral for properties: {:?}", err);
                    continue;
                }
            };

            if properties.local_name.as_deref() != Some(MUG_DEVICE_NAME) {
                continue;
            }

            found += 1;
            println!(
                "{} {:?} rssi={:?}",
                properties.address, properties.local_name, properties.rssi,
            );

            if let Err(err) = probe(&peripheral).await {
                eprintln!("  probe failed: {}", err);
            }
        }

        if let Err(err) = adapter.stop_scan().await {
            eprintln!("Failed to stop scanning: {:?}", err);
        }
    }

    println!("Found {} mug(s)", found);
    Ok(())
}

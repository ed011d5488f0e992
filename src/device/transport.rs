use std::collections::HashMap;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::BoxStream;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::device::constants::{DISCOVERY_POLLS, DISCOVERY_POLL_DELAY};
use crate::error::TransportError;

/// One pushed characteristic value.
#[derive(Debug, Clone)]
pub struct Notification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

pub type NotificationStream = BoxStream<'static, Notification>;

/// The capability boundary towards the BLE stack. One implementor wraps
/// btleplug; tests script their own.
#[allow(async_fn_in_trait)]
pub trait MugTransport: Send {
    fn address(&self) -> &str;

    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn pair(&mut self) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn is_connected(&self) -> Result<bool, TransportError>;

    async fn read(&mut self, id: Uuid) -> Result<Vec<u8>, TransportError>;

    async fn write(
        &mut self,
        id: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError>;

    /// Subscribes to `id` and returns the peripheral's notification
    /// stream. Items are not filtered by characteristic.
    async fn subscribe(&mut self, id: Uuid) -> Result<NotificationStream, TransportError>;

    async fn unsubscribe(&mut self, id: Uuid) -> Result<(), TransportError>;
}

/// btleplug-backed transport for a single peripheral located by address.
pub struct BtleTransport {
    address: String,
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
}

impl BtleTransport {
    /// Scans all adapters until a peripheral with the given address shows
    /// up. Gives up after a bounded number of scan sweeps.
    pub async fn find(address: &str) -> Result<BtleTransport, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(TransportError::NoAdapter);
        }

        for adapter in &adapters {
            info!(
                "Scanning for {} using adapter {}...",
                address,
                adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()),
            );
            adapter.start_scan(ScanFilter::default()).await?;
        }

        let found = Self::poll_for_peripheral(&adapters, address).await;

        for adapter in &adapters {
            if let Err(err) = adapter.stop_scan().await {
                warn!("Failed to stop scanning: {:?}", err);
            }
        }

        match found {
            Some(peripheral) => Ok(BtleTransport {
                address: address.to_string(),
                peripheral,
                characteristics: HashMap::new(),
            }),
            None => Err(TransportError::PeripheralNotFound(address.to_string())),
        }
    }

    async fn poll_for_peripheral(adapters: &[Adapter], address: &str) -> Option<Peripheral> {
        for _ in 0..DISCOVERY_POLLS {
            sleep(Duration::from_millis(DISCOVERY_POLL_DELAY)).await;

            for adapter in adapters {
                let peripherals = match adapter.peripherals().await {
                    Ok(v) => v,
                    Err(err) => {
                        warn!("Failed to query BLE adapter for peripherals: {}", err);
                        continue;
                    }
                };

                for peripheral in peripherals {
                    if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                        info!("Found peripheral {}", address);
                        return Some(peripheral);
                    }
                }
            }
        }

        None
    }

    fn characteristic(&self, id: Uuid) -> Result<&Characteristic, TransportError> {
        self.characteristics
            .get(&id)
            .ok_or(TransportError::MissingCharacteristic(id))
    }
}

impl MugTransport for BtleTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.peripheral.connect().await?;
        self.peripheral.discover_services().await?;

        self.characteristics = self
            .peripheral
            .services()
            .into_iter()
            .flat_map(|service| service.characteristics.into_iter())
            .map(|characteristic| (characteristic.uuid, characteristic))
            .collect();

        debug!(
            "Discovered {} characteristics on {}",
            self.characteristics.len(),
            self.address,
        );
        Ok(())
    }

    async fn pair(&mut self) -> Result<(), TransportError> {
        // btleplug exposes no explicit pairing call; the platform stack
        // pairs on demand when a protected characteristic is accessed.
        debug!("Pairing for {} is delegated to the platform stack", self.address);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, TransportError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn read(&mut self, id: Uuid) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.characteristic(id)?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    async fn write(
        &mut self,
        id: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        let characteristic = self.characteristic(id)?;
        self.peripheral.write(characteristic, payload, write_type).await?;
        Ok(())
    }

    async fn subscribe(&mut self, id: Uuid) -> Result<NotificationStream, TransportError> {
        let characteristic = self.characteristic(id)?;
        self.peripheral.subscribe(characteristic).await?;

        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .map(|n| Notification { uuid: n.uuid, value: n.value })
            .boxed())
    }

    async fn unsubscribe(&mut self, id: Uuid) -> Result<(), TransportError> {
        let characteristic = self.characteristic(id)?;
        self.peripheral.unsubscribe(characteristic).await?;
        Ok(())
    }
}

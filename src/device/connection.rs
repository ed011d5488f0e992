use log::{debug, error, info, warn};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::device::constants::{
    make_state_uuid, CONNECT_ATTEMPTS, CONNECT_BACKOFF_DELAY, CONNECT_RETRY_DELAY,
};
use crate::device::transport::{MugTransport, NotificationStream};
use crate::device::types::{ConnectionStatus, UpdateSignal};
use crate::error::TransportError;

/// Owns the transport handle and the connect/subscribe/teardown policy.
/// Read and write retry policy belongs to the caller; this never retries
/// individual characteristic operations.
pub struct Connection<T> {
    transport: T,
    status: ConnectionStatus,
}

impl<T: MugTransport> Connection<T> {
    pub fn new(transport: T) -> Connection<T> {
        Connection {
            transport,
            status: ConnectionStatus::Disconnected,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    /// Connects in bursts of up to `CONNECT_ATTEMPTS` connect+pair cycles
    /// with a wait after each failure. A fully failed burst signals the
    /// change sink and backs off for five minutes before the next burst;
    /// the outer loop runs until a burst succeeds. On success the state
    /// characteristic is subscribed to; a subscription failure is logged
    /// and leaves the session connected without notifications.
    ///
    /// Callers that need to abandon the attempt (shutdown) race this
    /// future against their cancellation token.
    pub async fn connect(&mut self, on_change: &UpdateSignal) -> Option<NotificationStream> {
        loop {
            self.status = ConnectionStatus::Connecting;

            if self.connect_burst().await {
                break;
            }

            self.status = ConnectionStatus::Disconnected;
            on_change.signal();
            warn!(
                "Failed to connect to {} after {} attempts. Will try again in 5min",
                self.transport.address(),
                CONNECT_ATTEMPTS,
            );
            sleep(Duration::from_millis(CONNECT_BACKOFF_DELAY)).await;
        }

        self.status = ConnectionStatus::Connected;
        info!("Connected to {}", self.transport.address());

        match self.transport.subscribe(make_state_uuid()).await {
            Ok(stream) => {
                self.status = ConnectionStatus::Subscribed;
                info!("Subscribed to state notifications of {}", self.transport.address());
                Some(stream)
            }
            Err(err) => {
                warn!("Failed to subscribe to state notifications: {}", err);
                None
            }
        }
    }

    async fn connect_burst(&mut self) -> bool {
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.connect_once().await {
                Ok(()) => return true,
                Err(err) => {
                    error!(
                        "Connect attempt {}/{} to {} failed: {}. Waiting 30sec",
                        attempt,
                        CONNECT_ATTEMPTS,
                        self.transport.address(),
                        err,
                    );
                    sleep(Duration::from_millis(CONNECT_RETRY_DELAY)).await;
                }
            }
        }

        false
    }

    async fn connect_once(&mut self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        self.transport.pair().await?;
        Ok(())
    }

    pub async fn is_connected(&self) -> Result<bool, TransportError> {
        self.transport.is_connected().await
    }

    pub async fn read(&mut self, id: Uuid) -> Result<Vec<u8>, TransportError> {
        self.transport.read(id).await
    }

    pub async fn write(
        &mut self,
        id: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        self.transport.write(id, payload, with_response).await
    }

    /// Best-effort teardown: unsubscribe, then disconnect if still
    /// connected. Errors are logged and swallowed so shutdown always
    /// completes.
    pub async fn disconnect(&mut self) {
        if let Err(err) = self.transport.unsubscribe(make_state_uuid()).await {
            debug!("Ignoring unsubscribe failure during disconnect: {}", err);
        }

        if let Ok(true) = self.transport.is_connected().await {
            if let Err(err) = self.transport.disconnect().await {
                debug!("Ignoring disconnect failure: {}", err);
            }
        }

        self.status = ConnectionStatus::Disconnected;
        info!("Disconnected from {}", self.transport.address());
    }
}

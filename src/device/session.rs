use std::sync::{Arc, RwLock};
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::device::connection::Connection;
use crate::device::constants::{
    make_battery_uuid, make_current_temp_uuid, make_led_color_uuid, make_state_uuid,
    make_target_temp_uuid, make_unknown_read_uuids, DWELL_CHECKS, DWELL_CHECK_DELAY,
};
use crate::device::transport::{MugTransport, Notification, NotificationStream};
use crate::device::types::{
    ConnectionStatus, MugState, SessionCommand, UpdateReceiver, UpdateSignal,
};
use crate::error::SessionError;

/// The long-running task keeping the mug session alive: ensure a
/// connection, poll, signal observers, dwell, repeat. Owns the transport
/// handle exclusively; everything else reaches it through [`SessionHandle`].
pub struct MugSession<T> {
    connection: Connection<T>,
    use_metric: bool,
    state: Arc<RwLock<MugState>>,
    notifications: Option<NotificationStream>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    on_change: UpdateSignal,
    cancel: CancellationToken,
}

/// Cheap to clone. Exposes state snapshots and serializes external
/// requests onto the session task; never touches the transport directly.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<MugState>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn snapshot(&self) -> MugState {
        self.state.read().expect("mug state lock poisoned").clone()
    }

    /// Encodes `celsius` and writes the target-temperature characteristic
    /// through the session task, so the write is serialized with the poll
    /// loop on the single transport handle.
    pub async fn set_target_temperature(&self, celsius: f64) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::SetTargetTemp { celsius, reply })
            .map_err(|_| SessionError::Stopped)?;
        response.await.map_err(|_| SessionError::Stopped)?
    }

    /// Cooperative shutdown: the loop exits at its next check and tears
    /// the connection down. Nothing in flight is interrupted.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl<T: MugTransport> MugSession<T> {
    pub fn new(transport: T, use_metric: bool) -> (MugSession<T>, SessionHandle, UpdateReceiver) {
        let state = Arc::new(RwLock::new(MugState::new(transport.address())));
        let (on_change, updates) = UpdateSignal::channel();
        let (command_sender, commands) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            state: state.clone(),
            commands: command_sender,
            cancel: cancel.clone(),
        };

        let session = MugSession {
            connection: Connection::new(transport),
            use_metric,
            state,
            notifications: None,
            commands,
            on_change,
            cancel,
        };

        (session, handle, updates)
    }

    /// Runs until shutdown. Any error escaping one pass of the inner loop
    /// is logged and the loop starts over; it never terminates on its own.
    pub async fn run(mut self) {
        info!("Starting mug session loop for {}", self.connection.address());

        loop {
            match self.run_until_failure().await {
                Ok(()) => break,
                Err(err) => {
                    error!(
                        "An unexpected error occurred during the loop for {}: {}. Restarting",
                        self.connection.address(),
                        err,
                    );
                }
            }
        }

        self.connection.disconnect().await;
        self.write_state(|state| {
            state.connection_status = ConnectionStatus::Disconnected;
            state.available = false;
        });
        info!("Mug session loop for {} stopped", self.connection.address());
    }

    async fn run_until_failure(&mut self) -> Result<(), SessionError> {
        while !self.cancel.is_cancelled() {
            self.ensure_connected().await;
            if self.cancel.is_cancelled() {
                break;
            }

            if self.poll_cycle().await {
                self.write_state(|state| state.available = true);
            }
            self.on_change.signal();

            self.dwell().await?;
        }

        Ok(())
    }

    /// Reconnects when the connectivity probe reports (or fails to
    /// report) a live connection. The connect itself retries forever, so
    /// it is raced against the cancellation token.
    async fn ensure_connected(&mut self) {
        if self.connection.is_connected().await.unwrap_or(false) {
            return;
        }

        self.write_state(|state| {
            state.connection_status = ConnectionStatus::Connecting;
            state.available = false;
        });
        self.notifications = None;

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            stream = self.connection.connect(&self.on_change) => {
                self.notifications = stream;
            }
        }

        let status = self.connection.status();
        self.write_state(|state| state.connection_status = status);
    }

    /// One pass over the mug's characteristics, in a fixed order. A
    /// failed read or decode aborts the rest of the pass; values stored
    /// before the failure are kept. The diagnostic sweep afterwards is
    /// best effort and never fails the cycle.
    async fn poll_cycle(&mut self) -> bool {
        let success = match self.update_all().await {
            Ok(()) => true,
            Err(err) => {
                error!("Poll cycle for {} aborted: {}", self.connection.address(), err);
                false
            }
        };

        self.update_diagnostics().await;
        success
    }

    async fn update_all(&mut self) -> Result<(), SessionError> {
        self.update_led_color().await?;
        self.update_current_temp().await?;
        self.update_target_temp().await?;
        self.update_battery().await?;
        Ok(())
    }

    async fn update_led_color(&mut self) -> Result<(), SessionError> {
        let payload = self.connection.read(make_led_color_uuid()).await?;
        let color = codec::decode_color(&payload)?;
        self.write_state(|state| state.led_color = Some(color));
        Ok(())
    }

    async fn update_current_temp(&mut self) -> Result<(), SessionError> {
        let payload = self.connection.read(make_current_temp_uuid()).await?;
        let temp = codec::decode_temperature(&payload, self.use_metric)?;
        debug!("Current temp {}", temp);
        self.write_state(|state| state.current_temp = Some(temp));
        Ok(())
    }

    async fn update_target_temp(&mut self) -> Result<(), SessionError> {
        let payload = self.connection.read(make_target_temp_uuid()).await?;
        let temp = codec::decode_temperature(&payload, self.use_metric)?;
        debug!("Target temp {}", temp);
        self.write_state(|state| state.target_temp = Some(temp));
        Ok(())
    }

    async fn update_battery(&mut self) -> Result<(), SessionError> {
        let payload = self.connection.read(make_battery_uuid()).await?;
        let percent = codec::decode_battery(&payload)?;
        debug!("Battery is at {}", percent);
        self.write_state(|state| state.battery_percent = Some(percent));
        Ok(())
    }

    /// Reads the characteristics nobody understands yet and stores their
    /// raw dumps for investigation. Each failure is logged and skipped.
    async fn update_diagnostics(&mut self) {
        for id in make_unknown_read_uuids() {
            match self.connection.read(id).await {
                Ok(value) => {
                    debug!("Current value of {}: {:?}", id, value);
                    self.write_state(|state| {
                        state.diagnostic_readings.insert(id, format!("{:?}", value));
                    });
                }
                Err(err) => {
                    error!("Failed to update {}: {}", id, err);
                }
            }
        }
    }

    /// Holds the connection between polls for `DWELL_CHECKS` short steps,
    /// servicing commands and pushed notifications while waiting. A
    /// transport error from the liveness check escapes to the restart
    /// loop.
    async fn dwell(&mut self) -> Result<(), SessionError> {
        for _ in 0..DWELL_CHECKS {
            let step = sleep(Duration::from_millis(DWELL_CHECK_DELAY));
            tokio::pin!(step);

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = &mut step => {
                        self.connection.is_connected().await?;
                        break;
                    }
                    Some(command) = self.commands.recv() => {
                        self.handle_command(command).await;
                    }
                    Some(notification) = next_notification(&mut self.notifications) => {
                        self.handle_notification(&notification);
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetTargetTemp { celsius, reply } => {
                let result = self.set_target_temp(celsius).await;
                if reply.send(result).is_err() {
                    debug!("Caller of set_target_temperature went away before the reply");
                }
            }
        }
    }

    async fn set_target_temp(&mut self, celsius: f64) -> Result<(), SessionError> {
        debug!("Set target temp of {} to {}", self.connection.address(), celsius);
        let payload = codec::encode_temperature(celsius)?;
        self.connection.write(make_target_temp_uuid(), &payload, false).await?;
        Ok(())
    }

    fn handle_notification(&mut self, notification: &Notification) {
        if notification.uuid != make_state_uuid() {
            return;
        }

        let Some(&code) = notification.value.first() else {
            warn!("Ignoring empty state notification from {}", self.connection.address());
            return;
        };

        let applied = {
            let mut state = self.state.write().expect("mug state lock poisoned");
            state.apply_status(code)
        };

        if applied {
            self.on_change.signal();
        }
    }

    fn write_state(&self, mutate: impl FnOnce(&mut MugState)) {
        let mut state = self.state.write().expect("mug state lock poisoned");
        mutate(&mut state);
    }
}

async fn next_notification(stream: &mut Option<NotificationStream>) -> Option<Notification> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

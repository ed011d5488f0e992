use std::collections::HashMap;
use log::info;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::codec::format_color_hex;
use crate::error::SessionError;

/// Status code the mug pushes while transitioning; it must never
/// overwrite the stored status.
const TRANSIENT_STATUS: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

/// Snapshot of everything known about the mug. Mutated only by the
/// session task; observers get clones.
#[derive(Debug, Clone)]
pub struct MugState {
    pub address: String,
    pub connection_status: ConnectionStatus,
    /// Last status code pushed by the mug. Opaque; the meaning of most
    /// codes is undocumented, so it is logged but never interpreted.
    pub mug_status: Option<u8>,
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub battery_percent: Option<f64>,
    pub led_color: Option<(u8, u8, u8)>,
    /// Raw textual dumps of the characteristics we cannot interpret yet.
    pub diagnostic_readings: HashMap<Uuid, String>,
    /// True once at least one full poll has succeeded since the last
    /// connection loss.
    pub available: bool,
}

impl MugState {
    pub fn new(address: &str) -> Self {
        MugState {
            address: address.to_string(),
            connection_status: ConnectionStatus::Disconnected,
            mug_status: None,
            current_temp: None,
            target_temp: None,
            battery_percent: None,
            led_color: None,
            diagnostic_readings: HashMap::new(),
            available: false,
        }
    }

    pub fn color_hex(&self) -> Option<String> {
        self.led_color.map(|(r, g, b)| format_color_hex(r, g, b))
    }

    /// Applies a pushed status code. Skipped when the code equals the
    /// transient value 1 or the currently stored value. Returns whether
    /// the stored status changed.
    pub fn apply_status(&mut self, new_status: u8) -> bool {
        if new_status == TRANSIENT_STATUS || Some(new_status) == self.mug_status {
            return false;
        }

        info!(
            "Mug {} status changed from {:?} to {}",
            self.address, self.mug_status, new_status,
        );
        self.mug_status = Some(new_status);
        true
    }
}

/// Payload-free change signal; observers re-read the state snapshot.
#[derive(Debug, Clone)]
pub struct UpdateSignal {
    sender: mpsc::UnboundedSender<()>,
}

pub type UpdateReceiver = mpsc::UnboundedReceiver<()>;

impl UpdateSignal {
    pub fn channel() -> (UpdateSignal, UpdateReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (UpdateSignal { sender }, receiver)
    }

    /// Never fails; a dropped receiver just means nobody is watching.
    pub fn signal(&self) {
        let _ = self.sender.send(());
    }
}

/// Requests from outside the session task, serialized onto the single
/// transport handle through the session's command channel.
#[derive(Debug)]
pub enum SessionCommand {
    SetTargetTemp {
        celsius: f64,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

//! Scriptable in-memory transport used by the connection and session tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::device::constants::{
    make_battery_uuid, make_current_temp_uuid, make_led_color_uuid, make_target_temp_uuid,
    make_unknown_read_uuids,
};
use crate::device::transport::{MugTransport, Notification, NotificationStream};
use crate::error::TransportError;

pub(crate) const MOCK_ADDRESS: &str = "aa:bb:cc:dd:ee:ff";

struct MockInner {
    address: String,
    connect_failures: AtomicUsize,
    connect_calls: AtomicUsize,
    connected: AtomicBool,
    subscribe_fails: AtomicBool,
    teardown_fails: AtomicBool,
    scripted_reads: Mutex<HashMap<Uuid, VecDeque<Result<Vec<u8>, String>>>>,
    default_reads: Mutex<HashMap<Uuid, Vec<u8>>>,
    read_log: Mutex<Vec<Uuid>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>, bool)>>,
    liveness_script: Mutex<VecDeque<Result<bool, String>>>,
    notify_sender: Mutex<Option<mpsc::UnboundedSender<Notification>>>,
}

/// Clones share the same scripted state, so tests keep one clone around
/// for inspection after handing the other to the session.
#[derive(Clone)]
pub(crate) struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// A mock whose four main characteristics read back fixed payloads:
    /// blue LED, 55.00 current, 50.00 target, 42% battery. The unknown
    /// characteristics read back a single byte.
    pub fn new() -> MockTransport {
        let mut default_reads = HashMap::new();
        default_reads.insert(make_led_color_uuid(), vec![0x00, 0x00, 0xFF, 0xFF]);
        default_reads.insert(make_current_temp_uuid(), vec![0x7C, 0x15]);
        default_reads.insert(make_target_temp_uuid(), vec![0x88, 0x13]);
        default_reads.insert(make_battery_uuid(), vec![42]);
        for id in make_unknown_read_uuids() {
            default_reads.insert(id, vec![0x01]);
        }

        MockTransport {
            inner: Arc::new(MockInner {
                address: MOCK_ADDRESS.to_string(),
                connect_failures: AtomicUsize::new(0),
                connect_calls: AtomicUsize::new(0),
                connected: AtomicBool::new(false),
                subscribe_fails: AtomicBool::new(false),
                teardown_fails: AtomicBool::new(false),
                scripted_reads: Mutex::new(HashMap::new()),
                default_reads: Mutex::new(default_reads),
                read_log: Mutex::new(Vec::new()),
                writes: Mutex::new(Vec::new()),
                liveness_script: Mutex::new(VecDeque::new()),
                notify_sender: Mutex::new(None),
            }),
        }
    }

    pub fn fail_connects(&self, count: usize) {
        self.inner.connect_failures.store(count, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self) {
        self.inner.subscribe_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_teardown(&self) {
        self.inner.teardown_fails.store(true, Ordering::SeqCst);
    }

    /// Queues one read result for a characteristic. Queued results take
    /// precedence over the defaults and are consumed in order.
    pub fn script_read(&self, id: Uuid, result: Result<Vec<u8>, &str>) {
        self.inner
            .scripted_reads
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(result.map_err(str::to_string));
    }

    /// Queues one result for `is_connected`; afterwards it reports the
    /// plain connected flag again.
    pub fn script_liveness(&self, result: Result<bool, &str>) {
        self.inner
            .liveness_script
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
    }

    pub fn read_log(&self) -> Vec<Uuid> {
        self.inner.read_log.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>, bool)> {
        self.inner.writes.lock().unwrap().clone()
    }

    /// Pushes a notification into the stream handed out by `subscribe`.
    pub fn push_notification(&self, uuid: Uuid, value: Vec<u8>) {
        let sender = self.inner.notify_sender.lock().unwrap();
        let sender = sender.as_ref().expect("subscribe was never called");
        sender
            .send(Notification { uuid, value })
            .expect("notification stream was dropped");
    }
}

impl MugTransport for MockTransport {
    fn address(&self) -> &str {
        &self.inner.address
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.inner.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Failed("simulated connect failure".to_string()));
        }

        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pair(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.inner.teardown_fails.load(Ordering::SeqCst) {
            return Err(TransportError::Failed("simulated disconnect failure".to_string()));
        }

        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, TransportError> {
        if let Some(scripted) = self.inner.liveness_script.lock().unwrap().pop_front() {
            return scripted.map_err(TransportError::Failed);
        }

        Ok(self.inner.connected.load(Ordering::SeqCst))
    }

    async fn read(&mut self, id: Uuid) -> Result<Vec<u8>, TransportError> {
        self.inner.read_log.lock().unwrap().push(id);

        if let Some(queue) = self.inner.scripted_reads.lock().unwrap().get_mut(&id) {
            if let Some(scripted) = queue.pop_front() {
                return scripted.map_err(TransportError::Failed);
            }
        }

        match self.inner.default_reads.lock().unwrap().get(&id) {
            Some(payload) => Ok(payload.clone()),
            None => Err(TransportError::Failed(format!("unscripted read of {}", id))),
        }
    }

    async fn write(
        &mut self,
        id: Uuid,
        payload: &[u8],
        with_response: bool,
    ) -> Result<(), TransportError> {
        self.inner
            .writes
            .lock()
            .unwrap()
            .push((id, payload.to_vec(), with_response));
        Ok(())
    }

    async fn subscribe(&mut self, _id: Uuid) -> Result<NotificationStream, TransportError> {
        if self.inner.subscribe_fails.load(Ordering::SeqCst) {
            return Err(TransportError::Failed("simulated subscribe failure".to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        *self.inner.notify_sender.lock().unwrap() = Some(sender);

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|notification| (notification, receiver))
        })
        .boxed())
    }

    async fn unsubscribe(&mut self, _id: Uuid) -> Result<(), TransportError> {
        if self.inner.teardown_fails.load(Ordering::SeqCst) {
            return Err(TransportError::Failed("simulated unsubscribe failure".to_string()));
        }

        Ok(())
    }
}

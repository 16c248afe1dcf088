//! Scripted in-memory transport
//!
//! Stands in for real hardware in tests and simulations. Each
//! [`MemoryHandle`] replays a queue of [`ReadStep`]s, and the
//! [`MemoryTransport`] raises attach, detach and failure notifications on
//! demand.

use super::transport::{HidHandle, HidTransport, SharedHandle, TransportListener};
use super::DeviceIdentity;
use crate::error::TransportError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Longest a read waits when the script has nothing to deliver
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Outcome of one scripted read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Deliver these bytes as one report
    Report(Vec<u8>),
    /// Fail with this message
    Error(String),
    /// Time out without data
    NoData,
    /// Block for this long, then time out without data
    Stall(Duration),
}

/// A fake HID interface replaying scripted reads
#[derive(Debug)]
pub struct MemoryHandle {
    path: String,
    identity: DeviceIdentity,
    serial_number: Option<String>,
    product_name: Option<String>,
    script: Mutex<VecDeque<ReadStep>>,
    open_error: Mutex<Option<String>>,
    is_open: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryHandle {
    pub fn new(path: impl Into<String>, identity: DeviceIdentity) -> Self {
        Self {
            path: path.into(),
            identity,
            serial_number: None,
            product_name: None,
            script: Mutex::new(VecDeque::new()),
            open_error: Mutex::new(None),
            is_open: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn with_steps(self, steps: impl IntoIterator<Item = ReadStep>) -> Self {
        self.script.lock().extend(steps);
        self
    }

    /// Queue one more read step
    pub fn push(&self, step: ReadStep) {
        self.script.lock().push_back(step);
    }

    /// Queue a report made of `bytes`
    pub fn push_report(&self, bytes: &[u8]) {
        self.push(ReadStep::Report(bytes.to_vec()));
    }

    /// Make every following `open` fail with `message`, or succeed again with `None`
    pub fn set_open_error(&self, message: Option<&str>) {
        *self.open_error.lock() = message.map(str::to_string);
    }

    /// Steps not consumed yet
    pub fn pending(&self) -> usize {
        self.script.lock().len()
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// Number of successful opens
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of closes of an open handle
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of read attempts
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl HidHandle for MemoryHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    fn serial_number(&self) -> Option<String> {
        self.serial_number.clone()
    }

    fn product_name(&self) -> Option<String> {
        self.product_name.clone()
    }

    fn open(&self) -> Result<(), TransportError> {
        if let Some(message) = self.open_error.lock().clone() {
            return Err(TransportError::Open(message));
        }
        self.is_open.store(true, Ordering::SeqCst);
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let step = self.script.lock().pop_front();
        match step {
            Some(ReadStep::Report(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            Some(ReadStep::Error(message)) => Err(TransportError::Read(message)),
            Some(ReadStep::Stall(duration)) => {
                thread::sleep(duration);
                Ok(0)
            }
            Some(ReadStep::NoData) | None => {
                thread::sleep(timeout.min(IDLE_WAIT));
                Ok(0)
            }
        }
    }

    fn close(&self) {
        if self.is_open.swap(false, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A fake transport over a set of [`MemoryHandle`]s
#[derive(Default)]
pub struct MemoryTransport {
    devices: Mutex<Vec<Arc<MemoryHandle>>>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device that is present before the transport starts, without
    /// any notification
    pub fn plug(&self, handle: Arc<MemoryHandle>) {
        self.devices.lock().push(handle);
    }

    /// Add a device and notify the listener, if started
    pub fn attach(&self, handle: Arc<MemoryHandle>) {
        self.devices.lock().push(Arc::clone(&handle));
        if let Some(listener) = self.listener() {
            listener.device_attached(handle);
        }
    }

    /// Remove the device at `path` and notify the listener, if started
    pub fn detach(&self, path: &str) -> Option<Arc<MemoryHandle>> {
        let handle = {
            let mut devices = self.devices.lock();
            let index = devices.iter().position(|d| d.path() == path)?;
            devices.remove(index)
        };
        if let Some(listener) = self.listener() {
            listener.device_detached(Arc::clone(&handle) as SharedHandle);
        }
        Some(handle)
    }

    /// Report a failure of the device at `path`
    pub fn fail(&self, path: &str, message: &str) {
        let handle = self
            .devices
            .lock()
            .iter()
            .find(|d| d.path() == path)
            .cloned();
        if let (Some(handle), Some(listener)) = (handle, self.listener()) {
            listener.device_failure(handle, message);
        }
    }

    pub fn is_started(&self) -> bool {
        self.listener.lock().is_some()
    }

    fn listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().clone()
    }
}

impl HidTransport for MemoryTransport {
    fn start(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn attached_devices(&self) -> Result<Vec<SharedHandle>, TransportError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .map(|d| Arc::clone(d) as SharedHandle)
            .collect())
    }

    fn stop(&self) {
        self.listener.lock().take();
    }
}

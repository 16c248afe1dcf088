//! HID transport backed by the `hidapi` crate
//!
//! hidapi has no hotplug callbacks, so a monitor thread re-enumerates the
//! attached devices periodically and diffs them by path.
//!
//! On Linux the hidraw nodes are root-only by default. A udev rule grants
//! access to Wooting keyboards:
//!
//! ```text
//! SUBSYSTEM=="hidraw", ATTRS{idVendor}=="31e3", MODE="0660", GROUP="plugdev"
//! SUBSYSTEM=="hidraw", ATTRS{idVendor}=="03eb", ATTRS{idProduct}=="ff0[12]", MODE="0660", GROUP="plugdev"
//! ```

use super::transport::{HidHandle, HidTransport, SharedHandle, TransportListener};
use super::DeviceIdentity;
use crate::error::TransportError;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const MONITOR_THREAD_NAME: &str = "hid hotplug monitor";

/// Granularity at which the monitor notices a stop request
const STOP_CHECK: Duration = Duration::from_millis(20);

/// One HID interface seen by hidapi
pub struct HidApiHandle {
    path: String,
    raw_path: CString,
    identity: DeviceIdentity,
    serial_number: Option<String>,
    product_name: Option<String>,
    api: Arc<Mutex<HidApi>>,
    device: Mutex<Option<HidDevice>>,
}

impl HidApiHandle {
    fn from_info(info: &DeviceInfo, api: &Arc<Mutex<HidApi>>) -> Self {
        Self {
            path: info.path().to_string_lossy().into_owned(),
            raw_path: info.path().to_owned(),
            identity: DeviceIdentity::new(info.vendor_id(), info.product_id(), info.usage_page()),
            serial_number: info.serial_number().map(str::to_string),
            product_name: info.product_string().map(str::to_string),
            api: Arc::clone(api),
            device: Mutex::new(None),
        }
    }
}

impl HidHandle for HidApiHandle {
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
        let device = self
            .api
            .lock()
            .open_path(&self.raw_path)
            .map_err(|e| TransportError::Open(e.to_string()))?;
        device
            .set_blocking_mode(false)
            .map_err(|e| TransportError::Open(e.to_string()))?;

        log::debug!("[hid] opened {}", self.path);
        *self.device.lock() = Some(device);
        Ok(())
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let device = self.device.lock();
        let device = device.as_ref().ok_or(TransportError::Closed)?;
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| TransportError::Read(e.to_string()))
    }

    fn close(&self) {
        if self.device.lock().take().is_some() {
            log::debug!("[hid] closed {}", self.path);
        }
    }
}

struct Monitor {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Transport over the system HID stack
pub struct HidApiTransport {
    api: Arc<Mutex<HidApi>>,
    scan_interval: Duration,
    monitor: Mutex<Option<Monitor>>,
}

impl HidApiTransport {
    pub fn new(scan_interval: Duration) -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Enumerate(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            scan_interval,
            monitor: Mutex::new(None),
        })
    }
}

fn scan(api: &Arc<Mutex<HidApi>>) -> Result<Vec<Arc<HidApiHandle>>, TransportError> {
    let mut guard = api.lock();
    guard
        .refresh_devices()
        .map_err(|e| TransportError::Enumerate(e.to_string()))?;

    Ok(guard
        .device_list()
        .map(|info| Arc::new(HidApiHandle::from_info(info, api)))
        .collect())
}

fn by_path(handles: Vec<Arc<HidApiHandle>>) -> HashMap<String, Arc<HidApiHandle>> {
    handles
        .into_iter()
        .map(|handle| (handle.path.clone(), handle))
        .collect()
}

fn monitor_loop(
    api: Arc<Mutex<HidApi>>,
    listener: Arc<dyn TransportListener>,
    mut known: HashMap<String, Arc<HidApiHandle>>,
    scan_interval: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut next_scan = Instant::now() + scan_interval;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next_scan {
            thread::sleep(STOP_CHECK.min(next_scan - now));
            continue;
        }
        next_scan = now + scan_interval;

        let current = match scan(&api) {
            Ok(handles) => by_path(handles),
            Err(e) => {
                log::warn!("[hid] rescan failed: {}", e);
                continue;
            }
        };

        let detached: Vec<String> = known
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();
        for path in detached {
            if let Some(handle) = known.remove(&path) {
                log::debug!("[hid] detached {}", path);
                listener.device_detached(handle);
            }
        }

        for (path, handle) in current {
            if known.contains_key(&path) {
                continue;
            }
            log::debug!("[hid] attached {}", path);
            known.insert(path, Arc::clone(&handle));
            listener.device_attached(handle);
        }
    }
}

impl HidTransport for HidApiTransport {
    fn start(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return Ok(());
        }

        let known = by_path(scan(&self.api)?);
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let api = Arc::clone(&self.api);
            let stop = Arc::clone(&stop);
            let scan_interval = self.scan_interval;
            thread::Builder::new()
                .name(MONITOR_THREAD_NAME.to_string())
                .spawn(move || monitor_loop(api, listener, known, scan_interval, stop))
                .map_err(|e| TransportError::Enumerate(e.to_string()))?
        };

        *monitor = Some(Monitor { stop, thread });
        Ok(())
    }

    fn attached_devices(&self) -> Result<Vec<SharedHandle>, TransportError> {
        Ok(scan(&self.api)?
            .into_iter()
            .map(|handle| handle as SharedHandle)
            .collect())
    }

    fn stop(&self) {
        let Some(monitor) = self.monitor.lock().take() else {
            return;
        };
        monitor.stop.store(true, Ordering::SeqCst);
        if monitor.thread.thread().id() != thread::current().id() {
            let _ = monitor.thread.join();
        }
    }
}

impl Drop for HidApiTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

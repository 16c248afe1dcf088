//! Tracking of attached keyboards
//!
//! The registry listens to the transport's hotplug notifications, keeps one
//! [`KeyboardSession`] per recognized interface, and drains all of them on
//! shutdown.

use super::session::{KeyboardSession, SessionOptions};
use super::transport::{HidTransport, SharedHandle, TransportListener};
use super::{first_responsible, KeyboardFamily};
use crate::error::{RegistryError, SessionError};
use crate::event::EventBus;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Registry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    pub session: SessionOptions,
    /// Longest `stop` waits for sessions to close
    pub shutdown_timeout: Duration,
    /// How often `stop` checks whether sessions have closed
    pub shutdown_poll: Duration,
    /// Open sessions as soon as they are tracked
    pub auto_open: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            shutdown_timeout: Duration::from_secs(60),
            shutdown_poll: Duration::from_millis(50),
            auto_open: false,
        }
    }
}

#[derive(Default)]
struct Tracked {
    sessions: Vec<Arc<KeyboardSession>>,
    /// Set once `stop` begins, new devices are refused from then on
    stopping: bool,
}

/// The set of recognized keyboards
pub struct DeviceRegistry {
    transport: Arc<dyn HidTransport>,
    families: Vec<KeyboardFamily>,
    bus: Arc<EventBus>,
    options: RegistryOptions,
    tracked: Mutex<Tracked>,
}

impl DeviceRegistry {
    pub fn new(
        transport: Arc<dyn HidTransport>,
        bus: Arc<EventBus>,
        options: RegistryOptions,
    ) -> Arc<Self> {
        Self::with_families(transport, KeyboardFamily::ALL.to_vec(), bus, options)
    }

    /// A registry recognizing only `families`, matched in the given order
    pub fn with_families(
        transport: Arc<dyn HidTransport>,
        families: Vec<KeyboardFamily>,
        bus: Arc<EventBus>,
        options: RegistryOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            families,
            bus,
            options,
            tracked: Mutex::new(Tracked::default()),
        })
    }

    /// Subscribe to hotplug notifications and track every recognized
    /// keyboard that is already attached
    pub fn start(self: &Arc<Self>) -> Result<(), RegistryError> {
        let listener = HotplugListener {
            registry: Arc::downgrade(self),
        };
        self.transport.start(Arc::new(listener))?;

        let devices = match self.transport.attached_devices() {
            Ok(devices) => devices,
            Err(e) => {
                self.transport.stop();
                return Err(e.into());
            }
        };
        for handle in devices {
            self.attach(handle);
        }

        log::info!("Keyboard registry started, {} keyboard(s) found", self.len());
        Ok(())
    }

    /// Close every session, wait for the readers to exit, then report each
    /// keyboard as removed and stop the transport.
    ///
    /// Devices attached once `stop` has begun are ignored, and sessions
    /// opened while it waits are closed as well. A closed session is retired
    /// before it is dropped from the registry, so it can no longer be opened.
    ///
    /// Fails with [`RegistryError::ShutdownTimeout`] if a session is still
    /// open when the shutdown timeout elapses. The open sessions stay tracked
    /// in that case and `stop` can be called again.
    pub fn stop(&self) -> Result<(), RegistryError> {
        self.tracked.lock().stopping = true;

        let deadline = Instant::now() + self.options.shutdown_timeout;
        let removed = loop {
            let open: Vec<Arc<KeyboardSession>> = {
                let mut tracked = self.tracked.lock();
                let open: Vec<_> = tracked
                    .sessions
                    .iter()
                    .filter(|s| !s.retire())
                    .cloned()
                    .collect();
                if open.is_empty() {
                    break std::mem::take(&mut tracked.sessions);
                }
                open
            };

            for session in &open {
                match session.close() {
                    // The reader exited since the check
                    Ok(()) | Err(SessionError::NotOpen) => {}
                    Err(e) => log::warn!("Failed to close {}: {}", session.name(), e),
                }
            }

            if Instant::now() >= deadline {
                let open: Vec<String> = open.iter().map(|s| s.name().to_string()).collect();
                log::error!(
                    "Keyboards still open after {:?}: {}",
                    self.options.shutdown_timeout,
                    open.join(", ")
                );
                return Err(RegistryError::ShutdownTimeout {
                    timeout: self.options.shutdown_timeout,
                    open,
                });
            }
            thread::sleep(self.options.shutdown_poll);
        };

        for session in &removed {
            log::info!("Removed {}", session.name());
            self.bus.fire_removed(session);
        }

        self.transport.stop();
        log::info!("Keyboard registry stopped");
        Ok(())
    }

    /// Tracked keyboards, in the order they were recognized
    pub fn keyboards(&self) -> Vec<Arc<KeyboardSession>> {
        self.tracked.lock().sessions.clone()
    }

    /// The tracked keyboard at transport `path`
    pub fn keyboard(&self, path: &str) -> Option<Arc<KeyboardSession>> {
        self.tracked
            .lock()
            .sessions
            .iter()
            .find(|s| s.path() == path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tracked.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.lock().sessions.is_empty()
    }

    fn attach(&self, handle: SharedHandle) {
        let identity = handle.identity();
        let Some(family) = first_responsible(&identity, &self.families) else {
            log::debug!("Ignoring unsupported device {} at {}", identity, handle.path());
            return;
        };

        let session = {
            let mut tracked = self.tracked.lock();
            if tracked.stopping {
                log::debug!("Registry is stopping, ignoring device at {}", handle.path());
                return;
            }
            if tracked.sessions.iter().any(|s| s.path() == handle.path()) {
                log::debug!("Device at {} is already tracked", handle.path());
                return;
            }
            let session = KeyboardSession::new(
                handle,
                family,
                Arc::clone(&self.bus),
                self.options.session,
            );
            tracked.sessions.push(Arc::clone(&session));
            session
        };

        log::info!("Added {} at {}", session.name(), session.path());
        self.bus.fire_added(&session);

        if self.options.auto_open {
            match session.open() {
                Ok(()) => {}
                // Retired by a concurrent stop
                Err(SessionError::Spent) => {
                    log::debug!("Not opening {}, registry is stopping", session.name())
                }
                Err(e) => {
                    log::warn!("Failed to open {}: {}", session.name(), e);
                    self.bus.fire_error(&session, e.to_string());
                }
            }
        }
    }

    fn detach(&self, handle: &SharedHandle) {
        let removed: Vec<Arc<KeyboardSession>> = {
            let mut tracked = self.tracked.lock();
            let (removed, kept): (Vec<_>, Vec<_>) = tracked
                .sessions
                .drain(..)
                .partition(|s| s.path() == handle.path());
            tracked.sessions = kept;
            removed
        };

        for session in removed {
            if !session.is_closed() {
                if let Err(e) = session.close() {
                    log::debug!("{} closed on its own: {}", session.name(), e);
                }
            }
            log::info!("Removed {}", session.name());
            self.bus.fire_removed(&session);
        }
    }

    fn failure(&self, handle: &SharedHandle, message: &str) {
        match self.keyboard(handle.path()) {
            Some(session) => {
                log::warn!("{} failed: {}", session.name(), message);
                self.bus.fire_error(&session, message);
            }
            None => log::debug!("Dropping failure of untracked device {}", handle.path()),
        }
    }
}

/// Forwards transport notifications to the registry without keeping it alive
struct HotplugListener {
    registry: Weak<DeviceRegistry>,
}

impl TransportListener for HotplugListener {
    fn device_attached(&self, handle: SharedHandle) {
        if let Some(registry) = self.registry.upgrade() {
            registry.attach(handle);
        }
    }

    fn device_detached(&self, handle: SharedHandle) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&handle);
        }
    }

    fn device_failure(&self, handle: SharedHandle, message: &str) {
        if let Some(registry) = self.registry.upgrade() {
            registry.failure(&handle, message);
        }
    }
}

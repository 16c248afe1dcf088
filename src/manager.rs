//! Entry point for library consumers
//!
//! [`AnalogKeyboardManager`] wires a transport, the device registry and the
//! event bus together.
//!
//! ```no_run
//! use analog_keys::{AnalogKeyboardListener, AnalogKeyboardManager, Config, KeyStates};
//! use analog_keys::device::KeyboardSession;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalogKeyboardListener for Printer {
//!     fn keyboard_added(&self, keyboard: &Arc<KeyboardSession>) {
//!         let _ = keyboard.open();
//!     }
//!
//!     fn key_pressed(&self, keyboard: &Arc<KeyboardSession>, states: &KeyStates) {
//!         for state in states {
//!             println!("{}: {:?} {:.2}", keyboard.name(), state.key, state.value);
//!         }
//!     }
//! }
//!
//! # #[cfg(feature = "hidapi")]
//! # fn main() -> anyhow::Result<()> {
//! let manager = AnalogKeyboardManager::with_hidapi(&Config::default())?;
//! manager.add_listener(Arc::new(Printer));
//! manager.start()?;
//! // ...
//! manager.stop()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "hidapi"))]
//! # fn main() {}
//! ```

use crate::config::Config;
use crate::device::{DeviceRegistry, HidTransport, KeyboardSession};
use crate::error::RegistryError;
use crate::event::{AnalogKeyboardListener, EventBus, ListenerId};
use std::sync::Arc;

/// Analog keyboard subsystem
pub struct AnalogKeyboardManager {
    bus: Arc<EventBus>,
    registry: Arc<DeviceRegistry>,
}

impl AnalogKeyboardManager {
    pub fn new(transport: Arc<dyn HidTransport>, config: &Config) -> Result<Self, RegistryError> {
        let bus = Arc::new(EventBus::new(config.events.worker_threads).map_err(RegistryError::Spawn)?);
        let registry = DeviceRegistry::new(transport, Arc::clone(&bus), config.registry_options());
        Ok(Self { bus, registry })
    }

    /// A manager reading keyboards through the system HID stack
    #[cfg(feature = "hidapi")]
    pub fn with_hidapi(config: &Config) -> Result<Self, RegistryError> {
        let transport = crate::device::HidApiTransport::new(config.scan_interval())?;
        Self::new(Arc::new(transport), config)
    }

    /// Start tracking keyboards. Listeners added before this call see the
    /// keyboards that are already attached.
    pub fn start(&self) -> Result<(), RegistryError> {
        self.registry.start()
    }

    /// Close every keyboard and stop tracking
    pub fn stop(&self) -> Result<(), RegistryError> {
        self.registry.stop()
    }

    pub fn add_listener(&self, listener: Arc<dyn AnalogKeyboardListener>) -> ListenerId {
        self.bus.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    /// Recognized keyboards
    pub fn keyboards(&self) -> Vec<Arc<KeyboardSession>> {
        self.registry.keyboards()
    }

    pub fn keyboard(&self, path: &str) -> Option<Arc<KeyboardSession>> {
        self.registry.keyboard(path)
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

//! Keyboard hardware: model matching, transports, sessions and the registry

mod descriptor;
#[cfg(feature = "hidapi")]
mod hidapi;
mod memory;
mod registry;
mod session;
mod transport;

pub use descriptor::{
    first_responsible, matches, DeviceIdentity, KeyboardDescriptor, KeyboardFamily,
};
#[cfg(feature = "hidapi")]
pub use hidapi::{HidApiHandle, HidApiTransport};
pub use memory::{MemoryHandle, MemoryTransport, ReadStep};
pub use registry::{DeviceRegistry, RegistryOptions};
pub use session::{KeyboardInfo, KeyboardSession, SessionOptions, SessionState};
pub use transport::{HidHandle, HidTransport, SharedHandle, TransportListener};

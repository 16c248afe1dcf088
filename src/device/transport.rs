//! Interface to the HID transport layer
//!
//! The pipeline does not talk to USB or Bluetooth itself. A transport
//! enumerates attached HID interfaces, reports hotplug changes to a
//! [`TransportListener`], and hands out [`HidHandle`]s that sessions read
//! reports from.

use super::DeviceIdentity;
use crate::error::TransportError;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to one attached HID interface
pub type SharedHandle = Arc<dyn HidHandle>;

/// One attached HID interface
pub trait HidHandle: Send + Sync {
    /// Platform path of the interface. Two handles with the same path refer
    /// to the same physical interface.
    fn path(&self) -> &str;

    fn identity(&self) -> DeviceIdentity;

    fn serial_number(&self) -> Option<String>;

    fn product_name(&self) -> Option<String>;

    /// Open the interface in non-blocking mode
    fn open(&self) -> Result<(), TransportError>;

    /// Read one report into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes read, `0` if no report arrived in time.
    /// The error carries the transport's last error message.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Close the interface. Closing a closed handle does nothing.
    fn close(&self);
}

/// Receiver of hotplug notifications
pub trait TransportListener: Send + Sync {
    fn device_attached(&self, handle: SharedHandle);

    fn device_detached(&self, handle: SharedHandle);

    fn device_failure(&self, handle: SharedHandle, message: &str);
}

/// A source of HID interfaces
pub trait HidTransport: Send + Sync {
    /// Start delivering hotplug notifications to `listener`
    fn start(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError>;

    /// Interfaces attached right now
    fn attached_devices(&self) -> Result<Vec<SharedHandle>, TransportError>;

    /// Stop delivering notifications and release the listener
    fn stop(&self);
}

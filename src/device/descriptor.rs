//! Supported keyboard models and hardware matching
//!
//! A HID device is recognized from its vendor id, product id and usage page.
//! All three must match: analog keyboards expose several interfaces under the
//! same vendor and product id, and only one usage page carries analog reports.

use crate::keyboard::{default_keymap, KeyMap};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Hardware identity of an attached HID interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16, usage_page: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            usage_page,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (usage page {:#06x})",
            self.vendor_id, self.product_id, self.usage_page
        )
    }
}

/// A supported keyboard model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardDescriptor {
    pub name: &'static str,
    pub identity: DeviceIdentity,
}

impl KeyboardDescriptor {
    const fn new(name: &'static str, vendor_id: u16, product_id: u16, usage_page: u16) -> Self {
        Self {
            name,
            identity: DeviceIdentity::new(vendor_id, product_id, usage_page),
        }
    }

    /// Whether `identity` refers to this model
    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        self.identity == *identity
    }
}

/// Usage page of the Wooting analog interface
const WOOTING_ANALOG_USAGE_PAGE: u16 = 0xff54;

const WOOTING_KEYBOARDS: &[KeyboardDescriptor] = &[
    KeyboardDescriptor::new("Wooting 60HE", 0x31e3, 0x1312, WOOTING_ANALOG_USAGE_PAGE),
    KeyboardDescriptor::new("Wooting 80HE", 0x31e3, 0x1402, WOOTING_ANALOG_USAGE_PAGE),
    KeyboardDescriptor::new("Wooting Two HE (ARM)", 0x31e3, 0x1232, WOOTING_ANALOG_USAGE_PAGE),
    KeyboardDescriptor::new("Wooting Two Legacy", 0x03eb, 0xff02, WOOTING_ANALOG_USAGE_PAGE),
    KeyboardDescriptor::new("Wooting One Legacy", 0x03eb, 0xff01, WOOTING_ANALOG_USAGE_PAGE),
];

/// Whether `identity` equals the identity of any of `descriptors`
pub fn matches(identity: &DeviceIdentity, descriptors: &[KeyboardDescriptor]) -> bool {
    descriptors.iter().any(|d| d.matches(identity))
}

/// A family of keyboards sharing one report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyboardFamily {
    Wooting,
}

impl KeyboardFamily {
    /// Every supported family, in matching order
    pub const ALL: &'static [KeyboardFamily] = &[KeyboardFamily::Wooting];

    pub fn name(&self) -> &'static str {
        match self {
            KeyboardFamily::Wooting => "Wooting",
        }
    }

    /// Models belonging to this family
    pub fn descriptors(&self) -> &'static [KeyboardDescriptor] {
        match self {
            KeyboardFamily::Wooting => WOOTING_KEYBOARDS,
        }
    }

    /// Key code table used by this family's reports
    pub fn keymap(&self) -> Arc<KeyMap> {
        match self {
            KeyboardFamily::Wooting => default_keymap(),
        }
    }

    /// Size of one analog report in bytes
    pub fn report_size(&self) -> usize {
        match self {
            KeyboardFamily::Wooting => 48,
        }
    }

    /// Whether this family handles the device with `identity`
    pub fn responsible_for(&self, identity: &DeviceIdentity) -> bool {
        matches(identity, self.descriptors())
    }

    /// The model `identity` belongs to, if it is part of this family
    pub fn matching_descriptor(&self, identity: &DeviceIdentity) -> Option<&'static KeyboardDescriptor> {
        self.descriptors().iter().find(|d| d.matches(identity))
    }
}

impl fmt::Display for KeyboardFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The first of `families` responsible for the device with `identity`
pub fn first_responsible(
    identity: &DeviceIdentity,
    families: &[KeyboardFamily],
) -> Option<KeyboardFamily> {
    families
        .iter()
        .copied()
        .find(|family| family.responsible_for(identity))
}

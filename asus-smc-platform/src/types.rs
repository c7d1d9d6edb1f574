//! Common types shared between the engine and its collaborators

use std::fmt;

use serde::Serialize;

use crate::error::PlatformError;

/// Value returned by a firmware method evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareValue {
    /// Method returned nothing
    Nothing,
    /// Integer result
    Integer(u64),
    /// String result
    String(String),
    /// Opaque buffer result
    Buffer(Vec<u8>),
}

impl FirmwareValue {
    /// Interpret the value as an integer, failing for other kinds
    pub fn as_integer(&self, method: &str) -> Result<u64, PlatformError> {
        match self {
            FirmwareValue::Integer(v) => Ok(*v),
            other => Err(PlatformError::InvalidValue {
                method: method.to_string(),
                detail: format!("expected integer, got {other:?}"),
            }),
        }
    }
}

/// A single key transition posted to the virtual keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyReport {
    /// HID usage page (`hid::PAGE_CONSUMER` or `hid::PAGE_TOP_CASE`)
    pub page: u16,
    /// HID usage within the page
    pub usage: u16,
    /// Press (true) or release (false)
    pub pressed: bool,
}

impl KeyReport {
    pub const fn press(page: u16, usage: u16) -> Self {
        Self {
            page,
            usage,
            pressed: true,
        }
    }

    pub const fn release(page: u16, usage: u16) -> Self {
        Self {
            page,
            usage,
            pressed: false,
        }
    }
}

/// Events delivered to the user-space event sink (on-screen display, power daemon)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserEvent {
    /// Keyboard backlight badge, carrying the scaled 0-255 value
    KeyboardBacklight { value: u8 },
    /// The user asked the system to sleep
    Sleep,
    /// The user toggled airplane mode
    AirplaneMode,
}

/// Out-of-band signal raised to the telemetry host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEvent {
    /// A new ambient light sample is available
    AmbientLightChanged { lux: u32 },
}

/// Panel brightness as reported by the display parameter source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelBrightness {
    pub value: u32,
    pub max: u32,
}

impl PanelBrightness {
    /// Brightness as a 0-100 percentage
    pub fn percent(&self) -> u8 {
        if self.max == 0 {
            return 0;
        }
        let pct = (self.value.min(self.max) as u64 * 100) / self.max as u64;
        pct as u8
    }
}

/// Identity of an attached subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Messages broadcast to attached subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriberMessage {
    /// Touchpad was enabled (true) or disabled (false)
    TouchpadStatusChanged(bool),
    /// Keyboard backlight level (0-16) set through the `LKSB` key
    KeyboardBacklightLevel(u8),
}

impl SubscriberMessage {
    /// Message kind name
    pub fn kind(&self) -> &'static str {
        match self {
            SubscriberMessage::TouchpadStatusChanged(_) => "touchpad-status-changed",
            SubscriberMessage::KeyboardBacklightLevel(_) => "keyboard-backlight-level",
        }
    }
}

// ============================================================================
// Registry key types
// ============================================================================

/// Capability flags of a registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KeyFlags {
    pub read: bool,
    pub write: bool,
    pub function: bool,
}

impl KeyFlags {
    pub const READ: Self = Self {
        read: true,
        write: false,
        function: false,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        function: false,
    };
    pub const READ_FUNCTION: Self = Self {
        read: true,
        write: false,
        function: true,
    };
    pub const READ_WRITE_FUNCTION: Self = Self {
        read: true,
        write: true,
        function: true,
    };
}

impl fmt::Display for KeyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.function { 'f' } else { '-' }
        )
    }
}

/// Value type of a registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueType {
    UInt8,
    UInt16,
    UInt32,
    Data,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::UInt8 => "ui8",
            ValueType::UInt16 => "ui16",
            ValueType::UInt32 => "ui32",
            ValueType::Data => "data",
        }
    }
}

/// Typed registry value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    Data(Vec<u8>),
}

impl KeyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            KeyValue::UInt8(_) => ValueType::UInt8,
            KeyValue::UInt16(_) => ValueType::UInt16,
            KeyValue::UInt32(_) => ValueType::UInt32,
            KeyValue::Data(_) => ValueType::Data,
        }
    }

    /// Big-endian byte form, as registry hosts expect
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            KeyValue::UInt8(v) => vec![*v],
            KeyValue::UInt16(v) => v.to_be_bytes().to_vec(),
            KeyValue::UInt32(v) => v.to_be_bytes().to_vec(),
            KeyValue::Data(d) => d.clone(),
        }
    }

    /// Parse bytes as the given value type
    ///
    /// Returns `None` when the length doesn't match the type.
    pub fn from_bytes(ty: ValueType, bytes: &[u8]) -> Option<Self> {
        match ty {
            ValueType::UInt8 => match bytes {
                [b] => Some(KeyValue::UInt8(*b)),
                _ => None,
            },
            ValueType::UInt16 => {
                let arr: [u8; 2] = bytes.try_into().ok()?;
                Some(KeyValue::UInt16(u16::from_be_bytes(arr)))
            }
            ValueType::UInt32 => {
                let arr: [u8; 4] = bytes.try_into().ok()?;
                Some(KeyValue::UInt32(u32::from_be_bytes(arr)))
            }
            ValueType::Data => Some(KeyValue::Data(bytes.to_vec())),
        }
    }

    /// Numeric view of integer values
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            KeyValue::UInt8(v) => Some(*v as u32),
            KeyValue::UInt16(v) => Some(*v as u32),
            KeyValue::UInt32(v) => Some(*v),
            KeyValue::Data(_) => None,
        }
    }
}

/// Key declaration handed to the telemetry host at attach time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDescriptor {
    pub name: &'static str,
    pub flags: KeyFlags,
    pub value_type: ValueType,
}

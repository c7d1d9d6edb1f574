//! Sensor/key registry exposed to the telemetry host
//!
//! A fixed table of four-character keys. Static keys hold their own value
//! (writable ones can be overwritten with a value of the same type). Computed
//! keys proxy to live state: `ALV0` to the lux cell and `LKSB` to the keyboard
//! backlight level.

use asus_smc_platform::protocol::key;
use asus_smc_platform::{KeyDescriptor, KeyFlags, KeyValue, TelemetryHost, ValueType};
use tracing::{debug, info, warn};

use crate::als::LuxCell;
use crate::error::SmcError;

/// Live state behind a computed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedKey {
    /// Latest lux sample; read-only even though the flags say writable
    AmbientLux,
    /// Keyboard backlight level; writes set and persist it
    KeyboardBacklight,
}

impl ComputedKey {
    pub fn has_setter(&self) -> bool {
        matches!(self, ComputedKey::KeyboardBacklight)
    }
}

/// Initial content of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initial {
    U8(u8),
    U16(u16),
    U32(u32),
    Bytes(&'static [u8]),
    Computed(ComputedKey),
}

/// Static definition of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub name: &'static str,
    pub flags: KeyFlags,
    pub value_type: ValueType,
    pub initial: Initial,
}

impl KeySpec {
    pub fn descriptor(&self) -> KeyDescriptor {
        KeyDescriptor {
            name: self.name,
            flags: self.flags,
            value_type: self.value_type,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.initial, Initial::Computed(_))
    }
}

/// ALS descriptor: type 7, valid, channel bit 6, not a panel sensor
const ALS_SENSOR: &[u8] = &[7, 1, 6, 0];
/// Descriptor for an absent sensor
const NO_SENSOR: &[u8] = &[0, 0, 0, 0];
const EMPTY_STATUS: &[u8] = &[0, 0];

/// Every key, in attach order
pub const KEY_TABLE: &[KeySpec] = &[
    KeySpec {
        name: key::AL,
        flags: KeyFlags::READ_WRITE,
        value_type: ValueType::UInt16,
        initial: Initial::U16(0),
    },
    KeySpec {
        name: key::ALI0,
        flags: KeyFlags::READ_FUNCTION,
        value_type: ValueType::Data,
        initial: Initial::Bytes(ALS_SENSOR),
    },
    KeySpec {
        name: key::ALI1,
        flags: KeyFlags::READ_FUNCTION,
        value_type: ValueType::Data,
        initial: Initial::Bytes(NO_SENSOR),
    },
    KeySpec {
        name: key::ALRV,
        flags: KeyFlags::READ,
        value_type: ValueType::UInt16,
        initial: Initial::U16(1),
    },
    KeySpec {
        name: key::ALV0,
        flags: KeyFlags::READ_WRITE_FUNCTION,
        value_type: ValueType::UInt32,
        initial: Initial::Computed(ComputedKey::AmbientLux),
    },
    KeySpec {
        name: key::ALV1,
        flags: KeyFlags::READ_WRITE_FUNCTION,
        value_type: ValueType::UInt32,
        initial: Initial::U32(0),
    },
    KeySpec {
        name: key::LKSB,
        flags: KeyFlags::READ_WRITE_FUNCTION,
        value_type: ValueType::UInt8,
        initial: Initial::Computed(ComputedKey::KeyboardBacklight),
    },
    KeySpec {
        name: key::LKSS,
        flags: KeyFlags::READ_WRITE_FUNCTION,
        value_type: ValueType::Data,
        initial: Initial::Bytes(EMPTY_STATUS),
    },
    KeySpec {
        name: key::MSLD,
        flags: KeyFlags::READ_WRITE_FUNCTION,
        value_type: ValueType::UInt8,
        initial: Initial::U8(0),
    },
];

/// Look up a key definition by name
pub fn find_key(name: &str) -> Option<&'static KeySpec> {
    KEY_TABLE.iter().find(|k| k.name == name)
}

/// Descriptors handed to the telemetry host
pub fn descriptors() -> Vec<KeyDescriptor> {
    KEY_TABLE.iter().map(KeySpec::descriptor).collect()
}

/// What an accepted write asks the engine to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A static value was replaced
    Stored,
    /// Set and persist the keyboard backlight level
    SetBacklight(u8),
}

struct Entry {
    spec: &'static KeySpec,
    value: Option<KeyValue>,
}

/// Runtime registry state
pub struct Registry {
    entries: Vec<Entry>,
    lux: LuxCell,
    attached: bool,
}

impl Registry {
    pub fn new(lux: LuxCell) -> Self {
        let entries = KEY_TABLE
            .iter()
            .map(|spec| Entry {
                spec,
                value: match spec.initial {
                    Initial::U8(v) => Some(KeyValue::UInt8(v)),
                    Initial::U16(v) => Some(KeyValue::UInt16(v)),
                    Initial::U32(v) => Some(KeyValue::UInt32(v)),
                    Initial::Bytes(b) => Some(KeyValue::Data(b.to_vec())),
                    Initial::Computed(_) => None,
                },
            })
            .collect();
        Self {
            entries,
            lux,
            attached: false,
        }
    }

    /// Whether the telemetry host accepted the table
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Declare every key to the host
    ///
    /// All-or-nothing. On failure the registry stays usable internally but is
    /// inert: nothing is exposed and the poller won't run.
    pub async fn attach(&mut self, host: &dyn TelemetryHost) -> bool {
        if self.attached {
            return true;
        }
        match host.attach(&descriptors()).await {
            Ok(()) => {
                self.attached = true;
                info!("Registry attached ({} keys)", self.entries.len());
                true
            }
            Err(e) => {
                warn!("Telemetry host unavailable, registry inert: {}", e);
                false
            }
        }
    }

    /// Withdraw the table, if it was attached
    pub async fn detach(&mut self, host: &dyn TelemetryHost) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Err(e) = host.detach().await {
            warn!("Failed to detach registry: {}", e);
        } else {
            debug!("Registry detached");
        }
    }

    fn entry(&self, name: &str) -> Result<&Entry, SmcError> {
        self.entries
            .iter()
            .find(|e| e.spec.name == name)
            .ok_or_else(|| SmcError::UnknownKey(name.to_string()))
    }

    /// Read a key
    ///
    /// `backlight_level` supplies the live value for `LKSB`.
    pub fn read(&self, name: &str, backlight_level: u8) -> Result<KeyValue, SmcError> {
        let entry = self.entry(name)?;
        match (&entry.value, entry.spec.initial) {
            (_, Initial::Computed(ComputedKey::AmbientLux)) => Ok(KeyValue::UInt32(self.lux.load())),
            (_, Initial::Computed(ComputedKey::KeyboardBacklight)) => {
                Ok(KeyValue::UInt8(backlight_level))
            }
            (Some(value), _) => Ok(value.clone()),
            (None, _) => Err(SmcError::UnknownKey(name.to_string())),
        }
    }

    /// Validate and apply a write
    ///
    /// Static keys are updated in place; a backlight write is returned for the
    /// engine to carry out.
    pub fn write(&mut self, name: &str, value: KeyValue) -> Result<WriteOutcome, SmcError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.spec.name == name)
            .ok_or_else(|| SmcError::UnknownKey(name.to_string()))?;
        let spec = self.entries[idx].spec;

        if !spec.flags.write {
            return Err(SmcError::ReadOnlyKey(name.to_string()));
        }
        if value.value_type() != spec.value_type {
            return Err(SmcError::type_mismatch(
                name,
                spec.value_type,
                value.value_type(),
            ));
        }

        match spec.initial {
            Initial::Computed(computed) if !computed.has_setter() => {
                Err(SmcError::NoSetter(name.to_string()))
            }
            Initial::Computed(_) => {
                let level = value.as_u32().unwrap_or(0).min(u8::MAX as u32) as u8;
                Ok(WriteOutcome::SetBacklight(level))
            }
            _ => {
                debug!("Registry {} <- {:?}", name, value);
                self.entries[idx].value = Some(value);
                Ok(WriteOutcome::Stored)
            }
        }
    }
}

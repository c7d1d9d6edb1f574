//! D-Bus service and logind sleep monitoring
//!
//! Bus name: `org.asussmc.Smc1`
//! Object path: `/org/asussmc/Smc1`
//!
//! The service doubles as the telemetry host: the key table is published
//! through `ListKeys`/`ReadKey`/`WriteKey`, and every ALS sample raises the
//! `SampleAvailable` signal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use asus_smc_platform::{
    KeyDescriptor, KeyValue, PlatformError, SampleEvent, Subscriber, SubscriberId,
    SubscriberMessage, TelemetryHost,
};
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::OwnedFd;
use zbus::{interface, Connection};

use crate::engine::{EngineHandle, ServiceMessage};
use crate::error::SmcError;
use crate::registry;

use super::sleep::SleepGate;

pub const BUS_NAME: &str = "org.asussmc.Smc1";
pub const OBJECT_PATH: &str = "/org/asussmc/Smc1";

/// Key table as published by the last successful attach
pub type SharedKeys = Arc<Mutex<Option<Vec<KeyDescriptor>>>>;

fn to_fdo(e: SmcError) -> zbus::fdo::Error {
    match e {
        SmcError::UnknownKey(_) | SmcError::TypeMismatch { .. } => {
            zbus::fdo::Error::InvalidArgs(e.to_string())
        }
        SmcError::ReadOnlyKey(_) | SmcError::NoSetter(_) => {
            zbus::fdo::Error::AccessDenied(e.to_string())
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

fn to_platform(e: zbus::Error) -> PlatformError {
    PlatformError::Io(e.to_string())
}

// ============================================================================
// Interface
// ============================================================================

/// D-Bus interface implementation
pub struct SmcInterface {
    engine: EngineHandle,
    keys: SharedKeys,
    conn: Connection,
    /// Strong handles for the engine's weak HID driver entries
    hid_drivers: Mutex<HashMap<u64, Arc<dyn Subscriber>>>,
}

impl SmcInterface {
    pub fn new(engine: EngineHandle, keys: SharedKeys, conn: Connection) -> Self {
        Self {
            engine,
            keys,
            conn,
            hid_drivers: Mutex::new(HashMap::new()),
        }
    }
}

#[interface(name = "org.asussmc.Smc1")]
impl SmcInterface {
    /// Dispatch a decoded notification code
    async fn notify(&self, code: u32) -> zbus::fdo::Result<()> {
        self.engine.notify(code).await.map_err(to_fdo)
    }

    /// Handle a raw device notification
    async fn device_notification(&self, raw: u32) -> zbus::fdo::Result<()> {
        self.engine.device_notification(raw).await.map_err(to_fdo)
    }

    /// Peer request: sleep, airplane-mode, touchpad-toggle or display-off
    async fn service(&self, message: &str) -> zbus::fdo::Result<()> {
        let message = ServiceMessage::from_name(message).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!("unknown service message: {message}"))
        })?;
        self.engine.service_message(message).await.map_err(to_fdo)
    }

    /// Read a registry key as big-endian bytes
    async fn read_key(&self, name: &str) -> zbus::fdo::Result<Vec<u8>> {
        let value = self.engine.read_key(name).await.map_err(to_fdo)?;
        Ok(value.to_bytes())
    }

    /// Write a registry key from big-endian bytes
    async fn write_key(&self, name: &str, bytes: Vec<u8>) -> zbus::fdo::Result<()> {
        let spec = registry::find_key(name)
            .ok_or_else(|| to_fdo(SmcError::UnknownKey(name.to_string())))?;
        let value = KeyValue::from_bytes(spec.value_type, &bytes).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!(
                "{} bytes is not a {}",
                bytes.len(),
                spec.value_type.name()
            ))
        })?;
        self.engine.write_key(name, value).await.map_err(to_fdo)
    }

    /// List keys as (name, "flags type")
    async fn list_keys(&self) -> zbus::fdo::Result<Vec<(String, String)>> {
        let keys = self.keys.lock();
        let keys = keys
            .as_ref()
            .ok_or_else(|| zbus::fdo::Error::Failed("registry not attached".into()))?;
        Ok(keys
            .iter()
            .map(|k| {
                (
                    k.name.to_string(),
                    format!("{} {}", k.flags, k.value_type.name()),
                )
            })
            .collect())
    }

    /// Set the keyboard backlight level (badged and persisted)
    async fn set_backlight_level(&self, level: u8) -> zbus::fdo::Result<u8> {
        self.engine
            .set_backlight_level(level as i64, true, true)
            .await
            .map_err(to_fdo)
    }

    /// Register a HID keyboard driver; `LKSB` writes are then signalled as
    /// `KeyboardBacklightLevel`
    async fn add_hid_driver(&self, id: u64) -> zbus::fdo::Result<bool> {
        let driver: Arc<dyn Subscriber> = Arc::new(SignalSubscriber::new(self.conn.clone()));
        let added = self
            .engine
            .attach_hid_driver(SubscriberId(id), Arc::clone(&driver))
            .await
            .map_err(to_fdo)?;
        if added {
            self.hid_drivers.lock().insert(id, driver);
        }
        Ok(added)
    }

    async fn remove_hid_driver(&self, id: u64) -> zbus::fdo::Result<bool> {
        let removed = self
            .engine
            .detach_hid_driver(SubscriberId(id))
            .await
            .map_err(to_fdo)?;
        self.hid_drivers.lock().remove(&id);
        Ok(removed)
    }

    /// Engine status as JSON
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        serde_json::to_string(&status).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// New ambient light sample (sentinel 0xFFFFFFFF when the read failed)
    #[zbus(signal)]
    async fn sample_available(emitter: &SignalEmitter<'_>, lux: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn touchpad_status_changed(
        emitter: &SignalEmitter<'_>,
        enabled: bool,
    ) -> zbus::Result<()>;

    /// Level written through `LKSB`, for HID keyboard drivers on the bus
    #[zbus(signal)]
    async fn keyboard_backlight_level(emitter: &SignalEmitter<'_>, level: u8) -> zbus::Result<()>;
}

// ============================================================================
// Telemetry host and subscriber
// ============================================================================

/// Telemetry host publishing through [`SmcInterface`]
pub struct DbusTelemetry {
    conn: Connection,
    keys: SharedKeys,
}

impl DbusTelemetry {
    pub fn new(conn: Connection, keys: SharedKeys) -> Self {
        Self { conn, keys }
    }
}

#[async_trait]
impl TelemetryHost for DbusTelemetry {
    async fn attach(&self, keys: &[KeyDescriptor]) -> Result<(), PlatformError> {
        *self.keys.lock() = Some(keys.to_vec());
        Ok(())
    }

    async fn detach(&self) -> Result<(), PlatformError> {
        *self.keys.lock() = None;
        Ok(())
    }

    async fn post_interrupt(&self, event: SampleEvent) -> Result<(), PlatformError> {
        let SampleEvent::AmbientLightChanged { lux } = event;
        let emitter = SignalEmitter::new(&self.conn, OBJECT_PATH).map_err(to_platform)?;
        SmcInterface::sample_available(&emitter, lux)
            .await
            .map_err(to_platform)
    }
}

/// Subscriber re-emitting broadcasts as D-Bus signals
pub struct SignalSubscriber {
    conn: Connection,
}

impl SignalSubscriber {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Subscriber for SignalSubscriber {
    fn name(&self) -> &str {
        "dbus-signals"
    }

    async fn deliver(&self, message: &SubscriberMessage) -> Result<(), PlatformError> {
        let emitter = SignalEmitter::new(&self.conn, OBJECT_PATH).map_err(to_platform)?;
        match message {
            SubscriberMessage::TouchpadStatusChanged(enabled) => {
                SmcInterface::touchpad_status_changed(&emitter, *enabled)
                    .await
                    .map_err(to_platform)
            }
            SubscriberMessage::KeyboardBacklightLevel(level) => {
                SmcInterface::keyboard_backlight_level(&emitter, *level)
                    .await
                    .map_err(to_platform)
            }
        }
    }
}

// ============================================================================
// logind
// ============================================================================

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// Take an inhibitor lock; it is held until the fd is closed
    fn inhibit(&self, what: &str, who: &str, why: &str, mode: &str) -> zbus::Result<OwnedFd>;

    /// `true` before suspend, `false` after resume
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

async fn take_delay_lock(proxy: &LogindManagerProxy<'_>) -> Option<OwnedFd> {
    match proxy
        .inhibit(
            "sleep",
            "asus-smcd",
            "Switch off the keyboard backlight",
            "delay",
        )
        .await
    {
        Ok(fd) => {
            debug!("Holding sleep delay lock");
            Some(fd)
        }
        Err(e) => {
            warn!("No sleep delay lock, suspend may race the backlight: {}", e);
            None
        }
    }
}

/// Map `PrepareForSleep` to power transitions until the engine stops
///
/// A delay lock keeps logind waiting until the off transition is written.
pub async fn watch_sleep(engine: EngineHandle) -> zbus::Result<()> {
    let conn = Connection::system().await?;
    let proxy = LogindManagerProxy::new(&conn).await?;
    let mut signals = proxy.receive_prepare_for_sleep().await?;
    let mut gate = SleepGate::new(take_delay_lock(&proxy).await);
    info!("Watching logind PrepareForSleep");

    while let Some(signal) = signals.next().await {
        let start = match signal.args() {
            Ok(args) => args.start,
            Err(e) => {
                warn!("Bad PrepareForSleep signal: {}", e);
                continue;
            }
        };
        debug!("PrepareForSleep({})", start);
        if gate
            .prepare_for_sleep(&engine, start, || take_delay_lock(&proxy))
            .await
            .is_err()
        {
            break;
        }
    }
    Ok(())
}

//! Daemon wiring: binds the engine's collaborators to the running system
//!
//! - firmware: `acpi_call` ([`acpi_call::AcpiCallBridge`])
//! - store: sled database under the user data dir
//! - input: uinput keyboard, falling back to the log
//! - display: first sysfs backlight device
//! - telemetry + notifications: D-Bus service (feature `dbus`), otherwise the
//!   log and stdin

pub mod acpi_call;
#[cfg(feature = "dbus")]
pub mod dbus;
pub mod display;
pub mod sinks;
pub mod sleep;
pub mod stdin;
pub mod uinput;

use std::sync::Arc;

use anyhow::{Context, Result};
use asus_smc_platform::{DisplayParameters, InputReportSink, Platform, SledStore};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::config::SmcConfig;
use crate::engine::{Engine, EngineHandle};

use self::acpi_call::AcpiCallBridge;
use self::display::{NoDisplay, SysfsBacklight};
use self::sinks::{LogEventSink, LogInputSink};
use self::uinput::UinputKeyboard;

const VIRTUAL_KEYBOARD_NAME: &str = "Asus ATK Hotkeys";

/// Collaborators shared by every front end
struct CommonParts {
    firmware: Arc<AcpiCallBridge>,
    store: Arc<SledStore>,
    input: Arc<dyn InputReportSink>,
    display: Arc<dyn DisplayParameters>,
}

fn common_parts(config: &SmcConfig) -> Result<CommonParts> {
    let firmware = AcpiCallBridge::new(&config.firmware);
    if !firmware.is_available() {
        warn!(
            "{} not found; load the acpi_call module for firmware access",
            config.firmware.call_path.display()
        );
    }

    let store_path = config.store_path();
    let store = SledStore::open(&store_path)
        .with_context(|| format!("open state store at {}", store_path.display()))?;

    let input: Arc<dyn InputReportSink> = match UinputKeyboard::new(VIRTUAL_KEYBOARD_NAME) {
        Ok(kb) => Arc::new(kb),
        Err(e) => {
            warn!("No uinput access ({}), logging key events instead", e);
            Arc::new(LogInputSink)
        }
    };

    let display: Arc<dyn DisplayParameters> = match SysfsBacklight::discover() {
        Some(b) => Arc::new(b),
        None => Arc::new(NoDisplay),
    };

    Ok(CommonParts {
        firmware: Arc::new(firmware),
        store: Arc::new(store),
        input,
        display,
    })
}

/// Ctrl-C as an awaitable
fn shutdown_signal() -> Result<Arc<Notify>> {
    let notify = Arc::new(Notify::new());
    let handler_notify = Arc::clone(&notify);
    ctrlc::set_handler(move || handler_notify.notify_one())
        .context("install Ctrl-C handler")?;
    Ok(notify)
}

async fn stop(engine: &EngineHandle) {
    info!("Shutting down");
    engine.shutdown().await;
}

/// Run the daemon until Ctrl-C (or stdin EOF without D-Bus)
#[cfg(feature = "dbus")]
pub async fn run(config: SmcConfig) -> Result<()> {
    use asus_smc_platform::{Subscriber, SubscriberId};

    use self::dbus::{DbusTelemetry, SharedKeys, SignalSubscriber, SmcInterface};

    let parts = common_parts(&config)?;
    let shutdown = shutdown_signal()?;

    let conn = zbus::connection::Builder::session()?
        .name(dbus::BUS_NAME)?
        .build()
        .await
        .context("connect to session D-Bus")?;

    let keys = SharedKeys::default();
    let platform = Platform {
        firmware: parts.firmware,
        store: parts.store,
        input: parts.input,
        events: Arc::new(LogEventSink),
        telemetry: Arc::new(DbusTelemetry::new(conn.clone(), Arc::clone(&keys))),
        display: parts.display,
    };

    let engine = Engine::start(platform, config).await;

    conn.object_server()
        .at(dbus::OBJECT_PATH, SmcInterface::new(engine.clone(), keys, conn.clone()))
        .await
        .context("register D-Bus object")?;
    info!("D-Bus: {} on session bus", dbus::BUS_NAME);

    let signals: Arc<dyn Subscriber> = Arc::new(SignalSubscriber::new(conn.clone()));
    engine.attach_subscriber(SubscriberId(1), Arc::clone(&signals)).await?;

    let sleep_engine = engine.clone();
    tokio::spawn(async move {
        if let Err(e) = dbus::watch_sleep(sleep_engine).await {
            warn!("Suspend/resume tracking unavailable: {}", e);
        }
    });

    info!("Ready. Ctrl+C to stop.");
    shutdown.notified().await;
    stop(&engine).await;
    drop(signals);
    drop(conn);
    Ok(())
}

/// Run the daemon until Ctrl-C or stdin EOF
#[cfg(not(feature = "dbus"))]
pub async fn run(config: SmcConfig) -> Result<()> {
    use self::sinks::LogTelemetry;

    let parts = common_parts(&config)?;
    let shutdown = shutdown_signal()?;

    let platform = Platform {
        firmware: parts.firmware,
        store: parts.store,
        input: parts.input,
        events: Arc::new(LogEventSink),
        telemetry: Arc::new(LogTelemetry),
        display: parts.display,
    };

    let engine = Engine::start(platform, config).await;
    info!("Reading notification codes from stdin. Ctrl+C to stop.");

    tokio::select! {
        _ = stdin::run(engine.clone()) => {}
        _ = shutdown.notified() => {}
    }
    stop(&engine).await;
    Ok(())
}

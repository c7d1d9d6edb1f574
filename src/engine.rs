//! Serialized event engine
//!
//! One tokio task owns every piece of mutable state and is the only caller of
//! the firmware bridge. Everything else talks to it through [`EngineHandle`],
//! which queues a command and waits for the reply:
//!
//! ```text
//! [D-Bus / stdin / logind / tests]
//!              |  EngineHandle (mpsc + oneshot)
//!        [engine task] ── ALS timer (same select loop)
//!              |
//!   [firmware, store, input, events, telemetry, display]
//! ```
//!
//! The lux cell is the only state read outside the task.

use std::sync::Arc;

use asus_smc_platform::protocol::{hid, key, method};
use asus_smc_platform::{
    KeyValue, Platform, Subscriber, SubscriberId, SubscriberMessage, UserEvent,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::als::{self, AlsPoller, LuxCell};
use crate::backlight::{clamp_level, KeyboardBacklight};
use crate::capabilities::Capabilities;
use crate::codes::{classify, Action, Classified};
use crate::config::{BacklightMode, PersistPolicy, SmcConfig};
use crate::error::SmcError;
use crate::input::tap;
use crate::panel::PanelBacklight;
use crate::power::{PowerCoordinator, PowerState};
use crate::registry::{Registry, WriteOutcome};
use crate::subscribers::SubscriberSet;

/// Pending command capacity
const COMMAND_QUEUE_SIZE: usize = 64;

/// Requests sent directly by peer drivers instead of as notification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMessage {
    Sleep,
    AirplaneMode,
    TouchpadToggle,
    DisplayOff,
}

impl ServiceMessage {
    pub const ALL: [ServiceMessage; 4] = [
        ServiceMessage::Sleep,
        ServiceMessage::AirplaneMode,
        ServiceMessage::TouchpadToggle,
        ServiceMessage::DisplayOff,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServiceMessage::Sleep => "sleep",
            ServiceMessage::AirplaneMode => "airplane-mode",
            ServiceMessage::TouchpadToggle => "touchpad-toggle",
            ServiceMessage::DisplayOff => "display-off",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    fn action(&self) -> Action {
        match self {
            ServiceMessage::Sleep => Action::Sleep,
            ServiceMessage::AirplaneMode => Action::AirplaneMode,
            ServiceMessage::TouchpadToggle => Action::TouchpadToggle,
            ServiceMessage::DisplayOff => Action::DisplayToggle,
        }
    }
}

/// Point-in-time view of the engine state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub capabilities: Capabilities,
    pub backlight_level: u8,
    pub backlight_mode: BacklightMode,
    pub persist_policy: PersistPolicy,
    pub touchpad_enabled: bool,
    pub als_enabled: bool,
    pub lux: u32,
    pub panel_on: bool,
    pub power: PowerState,
    pub telemetry_attached: bool,
    pub subscribers: usize,
    /// A HID keyboard driver has attached at least once
    pub hid_keyboard: bool,
    pub hid_drivers: usize,
}

enum Command {
    Notify {
        code: u32,
        reply: oneshot::Sender<()>,
    },
    DeviceNotification {
        raw: u32,
        reply: oneshot::Sender<()>,
    },
    Service {
        message: ServiceMessage,
        reply: oneshot::Sender<()>,
    },
    SetPowerState {
        state: PowerState,
        reply: oneshot::Sender<()>,
    },
    SetBacklight {
        level: i64,
        badge: bool,
        persist: bool,
        reply: oneshot::Sender<u8>,
    },
    ReadKey {
        name: String,
        reply: oneshot::Sender<Result<KeyValue, SmcError>>,
    },
    WriteKey {
        name: String,
        value: KeyValue,
        reply: oneshot::Sender<Result<(), SmcError>>,
    },
    Attach {
        id: SubscriberId,
        subscriber: Arc<dyn Subscriber>,
        reply: oneshot::Sender<bool>,
    },
    Detach {
        id: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    AttachHidDriver {
        id: SubscriberId,
        driver: Arc<dyn Subscriber>,
        reply: oneshot::Sender<bool>,
    },
    DetachHidDriver {
        id: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable handle to a running engine
///
/// Every method waits until the engine has fully processed the request. Once
/// the engine has stopped they fail with [`SmcError::EngineStopped`].
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    lux: LuxCell,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SmcError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SmcError::EngineStopped)?;
        rx.await.map_err(|_| SmcError::EngineStopped)
    }

    /// Dispatch an already decoded notification code
    pub async fn notify(&self, code: u32) -> Result<(), SmcError> {
        self.request(|reply| Command::Notify { code, reply }).await
    }

    /// Handle a raw device notification, decoding it first when required
    pub async fn device_notification(&self, raw: u32) -> Result<(), SmcError> {
        self.request(|reply| Command::DeviceNotification { raw, reply })
            .await
    }

    pub async fn service_message(&self, message: ServiceMessage) -> Result<(), SmcError> {
        self.request(|reply| Command::Service { message, reply })
            .await
    }

    /// Run a power transition; resolves after the backlight write
    pub async fn set_power_state(&self, state: PowerState) -> Result<(), SmcError> {
        self.request(|reply| Command::SetPowerState { state, reply })
            .await
    }

    /// Set the keyboard backlight level, returning the clamped level
    pub async fn set_backlight_level(
        &self,
        level: i64,
        badge: bool,
        persist: bool,
    ) -> Result<u8, SmcError> {
        self.request(|reply| Command::SetBacklight {
            level,
            badge,
            persist,
            reply,
        })
        .await
    }

    /// Read a registry key
    ///
    /// `ALV0` is served from the lux cell without a round trip.
    pub async fn read_key(&self, name: &str) -> Result<KeyValue, SmcError> {
        if name == key::ALV0 {
            return Ok(KeyValue::UInt32(self.lux.load()));
        }
        let name = name.to_string();
        self.request(|reply| Command::ReadKey { name, reply })
            .await?
    }

    pub async fn write_key(&self, name: &str, value: KeyValue) -> Result<(), SmcError> {
        let name = name.to_string();
        self.request(|reply| Command::WriteKey { name, value, reply })
            .await?
    }

    /// Attach a subscriber; only a weak handle is kept
    pub async fn attach_subscriber(
        &self,
        id: SubscriberId,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<bool, SmcError> {
        self.request(|reply| Command::Attach {
            id,
            subscriber,
            reply,
        })
        .await
    }

    pub async fn detach_subscriber(&self, id: SubscriberId) -> Result<bool, SmcError> {
        self.request(|reply| Command::Detach { id, reply }).await
    }

    /// Attach a HID keyboard driver; it receives `LKSB` level writes
    pub async fn attach_hid_driver(
        &self,
        id: SubscriberId,
        driver: Arc<dyn Subscriber>,
    ) -> Result<bool, SmcError> {
        self.request(|reply| Command::AttachHidDriver { id, driver, reply })
            .await
    }

    pub async fn detach_hid_driver(&self, id: SubscriberId) -> Result<bool, SmcError> {
        self.request(|reply| Command::DetachHidDriver { id, reply })
            .await
    }

    pub async fn status(&self) -> Result<EngineStatus, SmcError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Latest lux sample
    pub fn lux(&self) -> u32 {
        self.lux.load()
    }

    /// Stop the engine. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) => {}
            Err(_) => debug!("Engine already stopped"),
        }
    }

    /// Whether the engine task has exited
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Engine state, owned by the engine task
pub struct Engine {
    platform: Platform,
    config: SmcConfig,
    capabilities: Capabilities,
    backlight: KeyboardBacklight,
    power: PowerCoordinator,
    panel: PanelBacklight,
    registry: Registry,
    subscribers: SubscriberSet,
    hid_drivers: SubscriberSet,
    hid_keyboard: bool,
    poller: AlsPoller,
    lux: LuxCell,
    touchpad_enabled: bool,
    als_enabled: bool,
    stopped: bool,
}

impl Engine {
    fn new(platform: Platform, config: SmcConfig) -> Self {
        let lux = LuxCell::new();
        Self {
            backlight: KeyboardBacklight::new(
                &platform,
                false,
                config.default_backlight_level,
                config.storage_timeout(),
            ),
            power: PowerCoordinator::new(config.persist_policy, config.backlight_mode),
            panel: PanelBacklight::new(),
            registry: Registry::new(lux.clone()),
            subscribers: SubscriberSet::new(),
            hid_drivers: SubscriberSet::new(),
            hid_keyboard: false,
            poller: AlsPoller::new(config.poll_interval()),
            capabilities: Capabilities::default(),
            lux,
            touchpad_enabled: true,
            als_enabled: false,
            stopped: false,
            platform,
            config,
        }
    }

    /// Spawn the engine task and wait for start-up to finish
    pub async fn start(platform: Platform, config: SmcConfig) -> EngineHandle {
        let engine = Self::new(platform, config);
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let handle = EngineHandle {
            tx,
            lux: engine.lux.clone(),
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(engine.run(rx, ready_tx));
        if ready_rx.await.is_err() {
            warn!("Engine exited during start-up");
        }
        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, ready: oneshot::Sender<()>) {
        self.start_up().await;
        let _ = ready.send(());

        loop {
            let deadline = self.poller.deadline();
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.shut_down(&mut rx).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        self.shut_down(&mut rx).await;
                        break;
                    }
                },
                _ = wait_until(deadline) => self.poll_sensor().await,
            }
        }
        info!("Engine stopped");
    }

    async fn start_up(&mut self) {
        let firmware = Arc::clone(&self.platform.firmware);

        match firmware.evaluate(method::INIT, &[1]).await {
            Ok(_) => debug!("ATK device initialized"),
            Err(e) if e.is_unsupported() => debug!("No INIT method"),
            Err(e) => warn!("ATK init failed: {}", e),
        }

        self.capabilities = Capabilities::probe(firmware.as_ref()).await;
        info!("ATK capabilities: {}", self.capabilities);

        if self.capabilities.ambient_light {
            self.als_enabled = true;
            self.write_als_state().await;
        }

        self.registry.attach(self.platform.telemetry.as_ref()).await;

        self.backlight = KeyboardBacklight::new(
            &self.platform,
            self.capabilities.keyboard_backlight,
            self.config.default_backlight_level,
            self.config.storage_timeout(),
        );
        if self.backlight.is_supported() && self.config.backlight_mode == BacklightMode::Firmware {
            let level = self.backlight.restore_from_storage().await;
            self.backlight.set_level(level as i64, false, false).await;
            info!("Keyboard backlight restored to level {}", level);
        }

        if self.capabilities.ambient_light && self.registry.is_attached() {
            self.poller.schedule();
            debug!("ALS poller every {:?}", self.config.poll_interval());
        }
    }

    /// Tear down whatever start-up managed to set up
    async fn shut_down(&mut self, rx: &mut mpsc::Receiver<Command>) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.poller.cancel();
        self.registry.detach(self.platform.telemetry.as_ref()).await;
        self.subscribers.clear();
        self.hid_drivers.clear();

        rx.close();
        let mut dropped = 0;
        while let Ok(cmd) = rx.try_recv() {
            drop(cmd);
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} pending commands", dropped);
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Notify { code, reply } => {
                self.dispatch(code).await;
                let _ = reply.send(());
            }
            Command::DeviceNotification { raw, reply } => {
                self.device_notification(raw).await;
                let _ = reply.send(());
            }
            Command::Service { message, reply } => {
                debug!("Service message {:?}", message);
                self.perform(message.action()).await;
                let _ = reply.send(());
            }
            Command::SetPowerState { state, reply } => {
                self.power.transition(state, &mut self.backlight).await;
                let _ = reply.send(());
            }
            Command::SetBacklight {
                level,
                badge,
                persist,
                reply,
            } => {
                self.backlight.set_level(level, badge, persist).await;
                let _ = reply.send(self.backlight.level());
            }
            Command::ReadKey { name, reply } => {
                let _ = reply.send(self.registry.read(&name, self.backlight.level()));
            }
            Command::WriteKey { name, value, reply } => {
                let result = self.write_key(&name, value).await;
                let _ = reply.send(result);
            }
            Command::Attach {
                id,
                subscriber,
                reply,
            } => {
                let _ = reply.send(self.subscribers.attach(id, &subscriber));
            }
            Command::Detach { id, reply } => {
                let _ = reply.send(self.subscribers.detach(id));
            }
            Command::AttachHidDriver { id, driver, reply } => {
                let added = self.hid_drivers.attach(id, &driver);
                if added {
                    info!("HID keyboard driver {} connected", driver.name());
                    self.hid_keyboard = true;
                }
                let _ = reply.send(added);
            }
            Command::DetachHidDriver { id, reply } => {
                let removed = self.hid_drivers.detach(id);
                if removed {
                    info!("HID keyboard driver {} disconnected", id);
                }
                let _ = reply.send(removed);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            // Handled by the loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn device_notification(&mut self, raw: u32) {
        if self.capabilities.direct_messaging {
            self.dispatch(raw).await;
            return;
        }

        match self
            .platform
            .firmware
            .evaluate_integer(method::WED, &[raw as u64])
            .await
        {
            Ok(code) => match u32::try_from(code) {
                Ok(code) => {
                    debug!("Decoded notification 0x{:X} -> 0x{:02X}", raw, code);
                    self.dispatch(code).await;
                }
                Err(_) => warn!("Notification 0x{:X} decoded to out-of-range 0x{:X}", raw, code),
            },
            Err(e) => warn!("Failed to decode notification 0x{:X}: {}", raw, e),
        }
    }

    async fn dispatch(&mut self, code: u32) {
        match classify(code) {
            Classified::Action(action) => {
                debug!("Notification 0x{:02X}: {}", code, action);
                self.perform(action).await;
            }
            Classified::Ignored(what) => debug!("Notification 0x{:02X} ignored ({})", code, what),
            Classified::Unknown => info!("Unknown notification code 0x{:02X}", code),
        }
    }

    async fn perform(&mut self, action: Action) {
        match action {
            Action::VolumeUp
            | Action::VolumeDown
            | Action::Mute
            | Action::PreviousTrack
            | Action::NextTrack
            | Action::PlayPause
            | Action::VideoMirror
            | Action::BrightnessDown
            | Action::BrightnessUp => {
                if let Some((page, usage)) = action.key_usage() {
                    tap(self.platform.input.as_ref(), page, usage, 1).await;
                }
            }
            Action::DisplayToggle => {
                self.panel
                    .toggle(
                        self.platform.display.as_ref(),
                        self.platform.input.as_ref(),
                    )
                    .await;
            }
            Action::TouchpadToggle => {
                self.touchpad_enabled = !self.touchpad_enabled;
                info!(
                    "Touchpad {}",
                    if self.touchpad_enabled { "enabled" } else { "disabled" }
                );
                let message = SubscriberMessage::TouchpadStatusChanged(self.touchpad_enabled);
                self.subscribers.broadcast(&message).await;
            }
            Action::Sleep => self.send_event(UserEvent::Sleep).await,
            Action::AirplaneMode => self.send_event(UserEvent::AirplaneMode).await,
            Action::AlsToggle => {
                if !self.capabilities.ambient_light {
                    debug!("ALS toggle without a sensor");
                    return;
                }
                self.als_enabled = !self.als_enabled;
                self.write_als_state().await;
            }
            Action::KeyboardBacklightUp | Action::KeyboardBacklightDown => {
                self.step_backlight(action == Action::KeyboardBacklightUp)
                    .await;
            }
        }
    }

    async fn step_backlight(&mut self, up: bool) {
        if self.config.backlight_mode == BacklightMode::HidKeys {
            let usage = if up {
                hid::TC_ILLUMINATION_UP
            } else {
                hid::TC_ILLUMINATION_DOWN
            };
            tap(self.platform.input.as_ref(), hid::PAGE_TOP_CASE, usage, 1).await;
            return;
        }

        let persist = self.config.persist_policy == PersistPolicy::EveryStep;
        if up {
            self.backlight.step_up(persist).await;
        } else {
            self.backlight.step_down(persist).await;
        }
    }

    async fn send_event(&self, event: UserEvent) {
        if let Err(e) = self.platform.events.send(event).await {
            warn!("Failed to send {:?}: {}", event, e);
        }
    }

    async fn write_als_state(&self) {
        let arg = u64::from(self.als_enabled);
        match self.platform.firmware.evaluate(method::ALSC, &[arg]).await {
            Ok(_) => info!(
                "Ambient light sensor {}",
                if self.als_enabled { "on" } else { "off" }
            ),
            Err(e) => warn!("Failed to switch ambient light sensor: {}", e),
        }
    }

    async fn write_key(&mut self, name: &str, value: KeyValue) -> Result<(), SmcError> {
        match self.registry.write(name, value)? {
            WriteOutcome::Stored => {}
            WriteOutcome::SetBacklight(level) => {
                self.backlight.set_level(level as i64, false, true).await;
                let message = SubscriberMessage::KeyboardBacklightLevel(clamp_level(level as i64));
                self.hid_drivers.broadcast(&message).await;
            }
        }
        Ok(())
    }

    async fn poll_sensor(&mut self) {
        if !(self.capabilities.ambient_light && self.registry.is_attached()) {
            self.poller.cancel();
            return;
        }
        let lux = als::refresh(
            self.platform.firmware.as_ref(),
            self.platform.telemetry.as_ref(),
            &self.lux,
        )
        .await;
        debug!("ALS sample {}", lux);
        self.poller.schedule();
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            capabilities: self.capabilities,
            backlight_level: self.backlight.level(),
            backlight_mode: self.config.backlight_mode,
            persist_policy: self.config.persist_policy,
            touchpad_enabled: self.touchpad_enabled,
            als_enabled: self.als_enabled,
            lux: self.lux.load(),
            panel_on: self.panel.is_on(),
            power: self.power.state(),
            telemetry_attached: self.registry.is_attached(),
            subscribers: self.subscribers.len(),
            hid_keyboard: self.hid_keyboard,
            hid_drivers: self.hid_drivers.len(),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

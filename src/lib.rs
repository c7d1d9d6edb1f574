//! Hotkey, keyboard backlight and ambient light mediation for ASUS ATK laptops
//!
//! The [`engine`] receives notification codes from the ATK firmware device,
//! turns them into key taps, user events and state changes, and keeps the
//! keyboard backlight level, ambient light sample and touchpad/panel state in
//! sync with the telemetry registry. All collaborators are traits from
//! [`asus_smc_platform`]; the [`daemon`] module binds them to the running
//! system.

pub mod als;
pub mod backlight;
pub mod capabilities;
pub mod codes;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod input;
pub mod panel;
pub mod power;
pub mod registry;
pub mod subscribers;

pub use asus_smc_platform as platform;
pub use capabilities::Capabilities;
pub use codes::{classify, Action, Classified};
pub use config::{BacklightMode, PersistPolicy, SmcConfig};
pub use engine::{Engine, EngineHandle, EngineStatus, ServiceMessage};
pub use error::SmcError;
pub use power::PowerState;

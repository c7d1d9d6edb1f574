//! Firmware capability snapshot, probed once at start-up

use std::fmt;

use asus_smc_platform::protocol::method;
use asus_smc_platform::FirmwareBridge;
use serde::Serialize;
use tracing::{debug, warn};

/// What the ATK device supports
///
/// Built by [`Capabilities::probe`] and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    /// `DMES`: notifications arrive already decoded
    pub direct_messaging: bool,
    /// `_WED`: raw notifications can be decoded
    pub event_decoding: bool,
    /// `SKBV`: keyboard backlight control
    pub keyboard_backlight: bool,
    /// `ALSC` and `ALSS`: ambient light sensor
    pub ambient_light: bool,
}

impl Capabilities {
    /// Everything present
    pub const ALL: Self = Self {
        direct_messaging: true,
        event_decoding: true,
        keyboard_backlight: true,
        ambient_light: true,
    };

    /// Probe the firmware for each capability
    ///
    /// Only `Unsupported` means absent; any other probe error is logged and
    /// also treated as absent.
    pub async fn probe(firmware: &dyn FirmwareBridge) -> Self {
        let caps = Self {
            direct_messaging: has_method(firmware, method::DMES).await,
            event_decoding: has_method(firmware, method::WED).await,
            keyboard_backlight: has_method(firmware, method::SKBV).await,
            ambient_light: has_method(firmware, method::ALSC).await
                && has_method(firmware, method::ALSS).await,
        };
        debug!("Capabilities: {}", caps);
        caps
    }
}

async fn has_method(firmware: &dyn FirmwareBridge, name: &str) -> bool {
    match firmware.validate(name).await {
        Ok(()) => true,
        Err(e) if e.is_unsupported() => false,
        Err(e) => {
            warn!("Probing {} ({}) failed: {}", name, method::describe(name), e);
            false
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.direct_messaging {
            names.push("dmes");
        }
        if self.event_decoding {
            names.push("wed");
        }
        if self.keyboard_backlight {
            names.push("kbl");
        }
        if self.ambient_light {
            names.push("als");
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

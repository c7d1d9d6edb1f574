//! Panel backlight toggle
//!
//! There is no direct panel power control, so "off" is emulated by stepping
//! the brightness all the way down and "on" by stepping back up to the cached
//! level.

use asus_smc_platform::protocol::hid;
use asus_smc_platform::{DisplayParameters, InputReportSink};
use tracing::{debug, info};

use crate::input::tap;

/// Brightness steps between fully dark and fully bright
pub const PANEL_STEPS: usize = 16;

/// Number of brightness-up steps that restore `percent`
pub fn steps_for_percent(percent: u8) -> usize {
    let percent = percent.min(100) as usize;
    (percent * PANEL_STEPS).div_ceil(100)
}

/// Panel on/off state with the brightness cached at the last switch-off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelBacklight {
    on: bool,
    cached_percent: u8,
}

impl Default for PanelBacklight {
    fn default() -> Self {
        Self {
            on: true,
            cached_percent: 100,
        }
    }
}

impl PanelBacklight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn cached_percent(&self) -> u8 {
        self.cached_percent
    }

    /// Switch the panel off or back on
    ///
    /// When switching off, the current brightness is read first; if that read
    /// fails the previous cache is kept.
    pub async fn toggle(&mut self, display: &dyn DisplayParameters, input: &dyn InputReportSink) {
        if self.on {
            match display.brightness().await {
                Ok(b) => {
                    self.cached_percent = b.percent();
                    debug!("Panel brightness {}%", self.cached_percent);
                }
                Err(e) => debug!("Panel brightness unavailable: {}", e),
            }
            tap(input, hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN, PANEL_STEPS).await;
        } else {
            let steps = steps_for_percent(self.cached_percent);
            tap(input, hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP, steps).await;
        }

        self.on = !self.on;
        info!("Panel backlight {}", if self.on { "on" } else { "off" });
    }
}

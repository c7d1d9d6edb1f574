//! Power transition coordinator
//!
//! Suspend turns the keyboard backlight off without announcing or persisting
//! the zero; resume restores the persisted level and re-applies it.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::backlight::KeyboardBacklight;
use crate::config::{BacklightMode, PersistPolicy};

/// System power state as seen by this component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Off,
    On,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => f.write_str("off"),
            PowerState::On => f.write_str("on"),
        }
    }
}

/// Two-state machine driving the backlight across suspend and resume
#[derive(Debug)]
pub struct PowerCoordinator {
    state: PowerState,
    policy: PersistPolicy,
    mode: BacklightMode,
}

impl PowerCoordinator {
    pub fn new(policy: PersistPolicy, mode: BacklightMode) -> Self {
        Self {
            state: PowerState::On,
            policy,
            mode,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Enter `target`, running its entry action
    ///
    /// Returns once the hardware write has been issued. Entering the current
    /// state runs the entry action again.
    pub async fn transition(&mut self, target: PowerState, backlight: &mut KeyboardBacklight) {
        let previous = self.state;
        self.state = target;
        info!("Power {} -> {}", previous, target);

        if self.mode == BacklightMode::HidKeys || !backlight.is_supported() {
            debug!("Power transition leaves keyboard backlight alone");
            return;
        }

        match target {
            PowerState::Off => {
                if self.policy == PersistPolicy::OnSuspend && previous == PowerState::On {
                    backlight.save().await;
                }
                backlight.set_level(0, false, false).await;
            }
            PowerState::On => {
                let level = backlight.restore_from_storage().await;
                backlight.set_level(level as i64, false, false).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asus_smc_platform::mock::MockPlatform;
    use asus_smc_platform::protocol::STORE_KEY_KEYBOARD_BACKLIGHT;
    use std::time::Duration;

    fn backlight(mock: &MockPlatform) -> KeyboardBacklight {
        KeyboardBacklight::new(&mock.platform(), true, 16, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_off_on_restores_persisted_level() {
        let mock = MockPlatform::new();
        mock.store.seed(STORE_KEY_KEYBOARD_BACKLIGHT, &[9, 0]).await;
        let mut kbl = backlight(&mock);
        let mut power = PowerCoordinator::new(PersistPolicy::Explicit, BacklightMode::Firmware);

        power.transition(PowerState::Off, &mut kbl).await;
        power.transition(PowerState::On, &mut kbl).await;

        assert_eq!(mock.firmware.backlight_writes(), vec![0, 144]);
        assert!(mock.events.events().is_empty());
        assert!(mock.store.writes().is_empty());
        assert_eq!(power.state(), PowerState::On);
    }

    #[tokio::test]
    async fn test_on_suspend_policy_saves_before_off() {
        let mock = MockPlatform::new();
        let mut kbl = backlight(&mock);
        kbl.set_level(6, true, false).await;
        let mut power = PowerCoordinator::new(PersistPolicy::OnSuspend, BacklightMode::Firmware);

        power.transition(PowerState::Off, &mut kbl).await;
        power.transition(PowerState::Off, &mut kbl).await;
        assert_eq!(
            mock.store.writes(),
            vec![(STORE_KEY_KEYBOARD_BACKLIGHT.to_string(), vec![6, 0])]
        );

        power.transition(PowerState::On, &mut kbl).await;
        assert_eq!(kbl.level(), 6);
    }

    #[tokio::test]
    async fn test_hid_keys_mode_skips_backlight() {
        let mock = MockPlatform::new();
        let mut kbl = backlight(&mock);
        let mut power = PowerCoordinator::new(PersistPolicy::Explicit, BacklightMode::HidKeys);

        power.transition(PowerState::Off, &mut kbl).await;
        assert_eq!(power.state(), PowerState::Off);
        assert!(mock.firmware.calls().is_empty());
    }
}

//! Virtual hotkey keyboard using evdev/uinput
//!
//! Consumer and top-case usages are translated to the matching Linux key
//! codes, so desktop environments handle them like any laptop hotkey.

use async_trait::async_trait;
use asus_smc_platform::protocol::hid;
use asus_smc_platform::{InputReportSink, KeyReport, PlatformError};
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key,
};
use parking_lot::Mutex;
use tracing::debug;

/// Every usage the engine can post, with its key code
const USAGE_KEYS: &[(u16, u16, Key)] = &[
    (hid::PAGE_CONSUMER, hid::CSMR_VOLUME_INCREMENT, Key::KEY_VOLUMEUP),
    (hid::PAGE_CONSUMER, hid::CSMR_VOLUME_DECREMENT, Key::KEY_VOLUMEDOWN),
    (hid::PAGE_CONSUMER, hid::CSMR_MUTE, Key::KEY_MUTE),
    (hid::PAGE_CONSUMER, hid::CSMR_SCAN_NEXT_TRACK, Key::KEY_NEXTSONG),
    (hid::PAGE_CONSUMER, hid::CSMR_SCAN_PREVIOUS_TRACK, Key::KEY_PREVIOUSSONG),
    (hid::PAGE_CONSUMER, hid::CSMR_PLAY_OR_PAUSE, Key::KEY_PLAYPAUSE),
    (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP, Key::KEY_BRIGHTNESSUP),
    (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN, Key::KEY_BRIGHTNESSDOWN),
    (hid::PAGE_TOP_CASE, hid::TC_VIDEO_MIRROR, Key::KEY_SWITCHVIDEOMODE),
    (hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_TOGGLE, Key::KEY_KBDILLUMTOGGLE),
    (hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_UP, Key::KEY_KBDILLUMUP),
    (hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_DOWN, Key::KEY_KBDILLUMDOWN),
];

/// Key code for a usage
pub fn key_for_usage(page: u16, usage: u16) -> Option<Key> {
    USAGE_KEYS
        .iter()
        .find(|(p, u, _)| *p == page && *u == usage)
        .map(|(_, _, key)| *key)
}

/// uinput keyboard exposing the hotkeys
pub struct UinputKeyboard {
    device: Mutex<VirtualDevice>,
}

impl UinputKeyboard {
    /// Create the virtual device
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest`)
    pub fn new(name: &str) -> std::io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for (_, _, key) in USAGE_KEYS {
            keys.insert(*key);
        }

        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .with_keys(&keys)?
            .build()?;
        debug!("Created virtual keyboard {:?}", name);

        Ok(Self {
            device: Mutex::new(device),
        })
    }
}

#[async_trait]
impl InputReportSink for UinputKeyboard {
    async fn post(&self, report: KeyReport) -> Result<(), PlatformError> {
        let key = key_for_usage(report.page, report.usage).ok_or_else(|| {
            PlatformError::InvalidValue {
                method: "uinput".into(),
                detail: format!("no key for usage 0x{:02X}:0x{:02X}", report.page, report.usage),
            }
        })?;
        let event = InputEvent::new_now(EventType::KEY, key.code(), i32::from(report.pressed));
        self.device.lock().emit(&[event])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Action;

    #[test]
    fn test_every_tap_action_has_a_key() {
        let actions = [
            Action::VolumeUp,
            Action::VolumeDown,
            Action::Mute,
            Action::PreviousTrack,
            Action::NextTrack,
            Action::PlayPause,
            Action::VideoMirror,
            Action::BrightnessDown,
            Action::BrightnessUp,
        ];
        for action in actions {
            let (page, usage) = action.key_usage().unwrap();
            assert!(key_for_usage(page, usage).is_some(), "{action} has no key");
        }
    }

    #[test]
    fn test_illumination_keys() {
        assert_eq!(
            key_for_usage(hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_UP),
            Some(Key::KEY_KBDILLUMUP)
        );
        assert_eq!(key_for_usage(hid::PAGE_CONSUMER, 0x01), None);
    }
}

//! Notification code table
//!
//! Maps the one-byte codes raised by the ATK device to semantic actions.
//! Exact codes are looked up first; the two brightness ranges are only checked
//! when no exact entry matched.

use std::fmt;
use std::ops::RangeInclusive;

use asus_smc_platform::protocol::hid;

/// Panel brightness up codes (inclusive)
pub const BRIGHTNESS_UP: RangeInclusive<u32> = 0x10..=0x1F;

/// Panel brightness down codes (inclusive)
pub const BRIGHTNESS_DOWN: RangeInclusive<u32> = 0x20..=0x2F;

/// Semantic action behind a notification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    VolumeUp,
    VolumeDown,
    Mute,
    PreviousTrack,
    NextTrack,
    PlayPause,
    /// Panel backlight off/on
    DisplayToggle,
    VideoMirror,
    TouchpadToggle,
    Sleep,
    /// Ambient light sensor on/off
    AlsToggle,
    AirplaneMode,
    KeyboardBacklightDown,
    KeyboardBacklightUp,
    BrightnessDown,
    BrightnessUp,
}

impl Action {
    /// Key usage posted for actions that are plain key taps
    pub fn key_usage(&self) -> Option<(u16, u16)> {
        match self {
            Action::VolumeUp => Some((hid::PAGE_CONSUMER, hid::CSMR_VOLUME_INCREMENT)),
            Action::VolumeDown => Some((hid::PAGE_CONSUMER, hid::CSMR_VOLUME_DECREMENT)),
            Action::Mute => Some((hid::PAGE_CONSUMER, hid::CSMR_MUTE)),
            Action::PreviousTrack => Some((hid::PAGE_CONSUMER, hid::CSMR_SCAN_PREVIOUS_TRACK)),
            Action::NextTrack => Some((hid::PAGE_CONSUMER, hid::CSMR_SCAN_NEXT_TRACK)),
            Action::PlayPause => Some((hid::PAGE_CONSUMER, hid::CSMR_PLAY_OR_PAUSE)),
            Action::VideoMirror => Some((hid::PAGE_TOP_CASE, hid::TC_VIDEO_MIRROR)),
            Action::BrightnessDown => Some((hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN)),
            Action::BrightnessUp => Some((hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP)),
            Action::DisplayToggle
            | Action::TouchpadToggle
            | Action::Sleep
            | Action::AlsToggle
            | Action::AirplaneMode
            | Action::KeyboardBacklightDown
            | Action::KeyboardBacklightUp => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::VolumeUp => "volume-up",
            Action::VolumeDown => "volume-down",
            Action::Mute => "mute",
            Action::PreviousTrack => "previous-track",
            Action::NextTrack => "next-track",
            Action::PlayPause => "play-pause",
            Action::DisplayToggle => "display-toggle",
            Action::VideoMirror => "video-mirror",
            Action::TouchpadToggle => "touchpad-toggle",
            Action::Sleep => "sleep",
            Action::AlsToggle => "als-toggle",
            Action::AirplaneMode => "airplane-mode",
            Action::KeyboardBacklightDown => "keyboard-backlight-down",
            Action::KeyboardBacklightUp => "keyboard-backlight-up",
            Action::BrightnessDown => "brightness-down",
            Action::BrightnessUp => "brightness-up",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    Action(Action),
    /// Known code that deliberately does nothing
    Ignored(&'static str),
    Unknown,
}

/// One row of the code table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: u32,
    pub class: Classified,
}

const fn act(code: u32, action: Action) -> CodeEntry {
    CodeEntry {
        code,
        class: Classified::Action(action),
    }
}

const fn ignore(code: u32, why: &'static str) -> CodeEntry {
    CodeEntry {
        code,
        class: Classified::Ignored(why),
    }
}

/// All exact codes
pub const CODE_TABLE: &[CodeEntry] = &[
    ignore(0x57, "AC disconnected"),
    ignore(0x58, "AC connected"),
    act(0x30, Action::VolumeUp),
    act(0x31, Action::VolumeDown),
    act(0x32, Action::Mute),
    // Media keys, two encodings each
    act(0x40, Action::PreviousTrack),
    act(0x8A, Action::PreviousTrack),
    act(0x41, Action::NextTrack),
    act(0x82, Action::NextTrack),
    act(0x45, Action::PlayPause),
    act(0x5C, Action::PlayPause),
    // Hardwired on, hardwired off, Fn+F7
    act(0x33, Action::DisplayToggle),
    act(0x34, Action::DisplayToggle),
    act(0x35, Action::DisplayToggle),
    act(0x61, Action::VideoMirror),
    act(0x6B, Action::TouchpadToggle),
    act(0x5E, Action::Sleep),
    act(0x7A, Action::AlsToggle),
    act(0x7D, Action::AirplaneMode),
    ignore(0xC6, "ALS notification"),
    ignore(0xC7, "ALS notification"),
    act(0xC5, Action::KeyboardBacklightDown),
    act(0xC4, Action::KeyboardBacklightUp),
];

/// Classify a raw notification code
pub fn classify(code: u32) -> Classified {
    if let Some(entry) = CODE_TABLE.iter().find(|e| e.code == code) {
        return entry.class;
    }
    if BRIGHTNESS_DOWN.contains(&code) {
        Classified::Action(Action::BrightnessDown)
    } else if BRIGHTNESS_UP.contains(&code) {
        Classified::Action(Action::BrightnessUp)
    } else {
        Classified::Unknown
    }
}

/// Parse a code written as decimal or `0x`-prefixed hex
pub fn parse_code(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

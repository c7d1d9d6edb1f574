//! Firmware, HID and registry constants for the ATK platform device

/// ATK ACPI method names
pub mod method {
    /// Device initialization, called once with argument 1
    pub const INIT: &str = "INIT";
    /// Direct notification messaging (presence means codes need no decoding)
    pub const DMES: &str = "DMES";
    /// Decode a raw WMI notification into a key code
    pub const WED: &str = "_WED";
    /// Set keyboard backlight (argument: scaled 0-255 value)
    pub const SKBV: &str = "SKBV";
    /// Ambient light sensor control (argument: 1 = on, 0 = off)
    pub const ALSC: &str = "ALSC";
    /// Ambient light sensor status (returns lux)
    pub const ALSS: &str = "ALSS";

    /// Get a short description of a method
    pub fn describe(name: &str) -> &'static str {
        match name {
            INIT => "device init",
            DMES => "direct messaging",
            WED => "WMI event decode",
            SKBV => "keyboard backlight",
            ALSC => "ALS control",
            ALSS => "ALS status",
            _ => "unknown",
        }
    }
}

/// HID usage pages and usages posted to the virtual keyboard
pub mod hid {
    /// Consumer usage page
    pub const PAGE_CONSUMER: u16 = 0x000C;
    /// Apple vendor top-case usage page
    pub const PAGE_TOP_CASE: u16 = 0x00FF;

    // Consumer page
    pub const CSMR_SCAN_NEXT_TRACK: u16 = 0xB5;
    pub const CSMR_SCAN_PREVIOUS_TRACK: u16 = 0xB6;
    pub const CSMR_PLAY_OR_PAUSE: u16 = 0xCD;
    pub const CSMR_MUTE: u16 = 0xE2;
    pub const CSMR_VOLUME_INCREMENT: u16 = 0xE9;
    pub const CSMR_VOLUME_DECREMENT: u16 = 0xEA;

    // Top-case page
    pub const TC_BRIGHTNESS_UP: u16 = 0x04;
    pub const TC_BRIGHTNESS_DOWN: u16 = 0x05;
    pub const TC_VIDEO_MIRROR: u16 = 0x06;
    pub const TC_ILLUMINATION_TOGGLE: u16 = 0x07;
    pub const TC_ILLUMINATION_UP: u16 = 0x08;
    pub const TC_ILLUMINATION_DOWN: u16 = 0x09;
}

/// Registry key names exposed to the telemetry host
pub mod key {
    pub const AL: &str = "AL! ";
    pub const ALI0: &str = "ALI0";
    pub const ALI1: &str = "ALI1";
    pub const ALRV: &str = "ALRV";
    pub const ALV0: &str = "ALV0";
    pub const ALV1: &str = "ALV1";
    pub const LKSB: &str = "LKSB";
    pub const LKSS: &str = "LKSS";
    pub const MSLD: &str = "MSLD";
}

/// Durable store key for the keyboard backlight level (2-byte little-endian)
pub const STORE_KEY_KEYBOARD_BACKLIGHT: &str = "AsusKeyboardBacklight";

/// Lux value published when the sensor read fails
pub const LUX_INVALID: u32 = 0xFFFF_FFFF;

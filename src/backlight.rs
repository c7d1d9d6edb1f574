//! Keyboard backlight state machine
//!
//! Owns the 0-16 backlight level. Every level change writes the scaled value
//! (`min(level * 16, 255)`) to the firmware; badging and persisting are
//! independent side effects chosen by the caller.

use std::sync::Arc;
use std::time::Duration;

use asus_smc_platform::protocol::{method, STORE_KEY_KEYBOARD_BACKLIGHT};
use asus_smc_platform::{EventSink, FirmwareBridge, KeyValueStore, Platform, UserEvent};
use tracing::{debug, warn};

/// Highest backlight level
pub const MAX_LEVEL: u8 = 16;

/// Clamp any requested level into `[0, MAX_LEVEL]`
pub fn clamp_level(level: i64) -> u8 {
    level.clamp(0, MAX_LEVEL as i64) as u8
}

/// Hardware value for a level: `min(level * 16, 255)`
pub fn scaled(level: u8) -> u8 {
    (level as u16 * 16).min(255) as u8
}

/// Stored form of a level (2-byte little-endian)
pub fn encode_level(level: u8) -> [u8; 2] {
    (level as u16).to_le_bytes()
}

/// Decode a stored level; values longer than 2 bytes are rejected
pub fn decode_level(bytes: &[u8]) -> Option<u8> {
    let raw = match bytes {
        [lo] => *lo as u16,
        [lo, hi] => u16::from_le_bytes([*lo, *hi]),
        _ => return None,
    };
    Some(clamp_level(raw as i64))
}

/// Keyboard backlight level with persistence
pub struct KeyboardBacklight {
    level: u8,
    supported: bool,
    default_level: u8,
    storage_timeout: Duration,
    firmware: Arc<dyn FirmwareBridge>,
    store: Arc<dyn KeyValueStore>,
    events: Arc<dyn EventSink>,
}

impl KeyboardBacklight {
    /// Create the state machine
    ///
    /// # Arguments
    /// * `supported` - Whether the firmware exposes `SKBV`
    /// * `default_level` - Level used when nothing can be restored
    /// * `storage_timeout` - Bound on the store lookup in `restore_from_storage`
    pub fn new(
        platform: &Platform,
        supported: bool,
        default_level: u8,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            level: clamp_level(default_level as i64),
            supported,
            default_level: clamp_level(default_level as i64),
            storage_timeout,
            firmware: Arc::clone(&platform.firmware),
            store: Arc::clone(&platform.store),
            events: Arc::clone(&platform.events),
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Set the level
    ///
    /// Clamps `level`, optionally badges and persists it, then always writes
    /// the scaled value to the firmware. A no-op without backlight support.
    pub async fn set_level(&mut self, level: i64, badge: bool, persist: bool) {
        if !self.supported {
            debug!("Keyboard backlight unsupported, ignoring level {}", level);
            return;
        }

        let level = clamp_level(level);
        self.level = level;
        let value = scaled(level);

        if badge {
            if let Err(e) = self
                .events
                .send(UserEvent::KeyboardBacklight { value })
                .await
            {
                debug!("Backlight badge not delivered: {}", e);
            }
        }

        if persist {
            self.save().await;
        }

        if let Err(e) = self.firmware.evaluate(method::SKBV, &[value as u64]).await {
            warn!("Failed to set keyboard backlight to {}: {}", value, e);
        } else {
            debug!("Keyboard backlight level {} (0x{:02X})", level, value);
        }
    }

    /// One level up, clamped at 16; always badges
    pub async fn step_up(&mut self, persist: bool) {
        let next = self.level as i64 + 1;
        self.set_level(next, true, persist).await;
    }

    /// One level down, clamped at 0; always badges
    pub async fn step_down(&mut self, persist: bool) {
        let next = self.level as i64 - 1;
        self.set_level(next, true, persist).await;
    }

    /// Write the current level to durable storage
    pub async fn save(&self) {
        if let Err(e) = self
            .store
            .set(STORE_KEY_KEYBOARD_BACKLIGHT, &encode_level(self.level))
            .await
        {
            warn!("Failed to persist keyboard backlight level: {}", e);
        }
    }

    /// Read the persisted level
    ///
    /// Waits at most `storage_timeout` for the store. Any failure (timeout,
    /// read error, missing or malformed value) yields the default level.
    pub async fn restore_from_storage(&self) -> u8 {
        let lookup = self.store.get(STORE_KEY_KEYBOARD_BACKLIGHT);
        match tokio::time::timeout(self.storage_timeout, lookup).await {
            Ok(Ok(Some(bytes))) => match decode_level(&bytes) {
                Some(level) => {
                    debug!("Keyboard backlight level from store: {}", level);
                    level
                }
                None => {
                    warn!(
                        "Stored keyboard backlight value has {} bytes, using {}",
                        bytes.len(),
                        self.default_level
                    );
                    self.default_level
                }
            },
            Ok(Ok(None)) => {
                warn!(
                    "Keyboard backlight level not found in store, using {}",
                    self.default_level
                );
                self.default_level
            }
            Ok(Err(e)) => {
                warn!("Store read failed ({}), using {}", e, self.default_level);
                self.default_level
            }
            Err(_) => {
                warn!(
                    "Store not available after {:?}, using {}",
                    self.storage_timeout, self.default_level
                );
                self.default_level
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asus_smc_platform::mock::MockPlatform;

    fn backlight(mock: &MockPlatform) -> KeyboardBacklight {
        KeyboardBacklight::new(&mock.platform(), true, 16, Duration::from_secs(5))
    }

    #[test]
    fn test_clamp_and_scale() {
        assert_eq!(clamp_level(-5), 0);
        assert_eq!(clamp_level(1_000_000), 16);
        assert_eq!(clamp_level(9), 9);
        assert_eq!(scaled(0), 0);
        assert_eq!(scaled(9), 144);
        assert_eq!(scaled(15), 240);
        assert_eq!(scaled(16), 255);
    }

    #[test]
    fn test_decode_level() {
        assert_eq!(decode_level(&encode_level(9)), Some(9));
        assert_eq!(decode_level(&[7]), Some(7));
        assert_eq!(decode_level(&[0xFF, 0x00]), Some(16));
        assert_eq!(decode_level(&[]), None);
        assert_eq!(decode_level(&[1, 2, 3]), None);
    }

    #[tokio::test]
    async fn test_set_level_side_effects() {
        let mock = MockPlatform::new();
        let mut kbl = backlight(&mock);

        kbl.set_level(9, false, false).await;
        assert_eq!(mock.firmware.backlight_writes(), vec![144]);
        assert!(mock.events.badges().is_empty());
        assert!(mock.store.writes().is_empty());

        kbl.set_level(20, true, true).await;
        assert_eq!(kbl.level(), 16);
        assert_eq!(mock.events.badges(), vec![255]);
        assert_eq!(
            mock.store.writes(),
            vec![(STORE_KEY_KEYBOARD_BACKLIGHT.to_string(), vec![16, 0])]
        );
    }

    #[tokio::test]
    async fn test_persist_roundtrip() {
        let mock = MockPlatform::new();
        let mut kbl = backlight(&mock);
        kbl.set_level(5, true, true).await;
        assert_eq!(kbl.restore_from_storage().await, 5);
    }

    #[tokio::test]
    async fn test_restore_defaults() {
        let mock = MockPlatform::new();
        let kbl = backlight(&mock);
        assert_eq!(kbl.restore_from_storage().await, 16);

        mock.store.set_fail_reads(true);
        assert_eq!(kbl.restore_from_storage().await, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_times_out() {
        let mock = MockPlatform::new();
        mock.store.seed(STORE_KEY_KEYBOARD_BACKLIGHT, &[3, 0]).await;
        mock.store.set_hang_reads(true);
        let kbl = backlight(&mock);

        let start = tokio::time::Instant::now();
        assert_eq!(kbl.restore_from_storage().await, 16);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unsupported_is_noop() {
        let mock = MockPlatform::new();
        let mut kbl = KeyboardBacklight::new(&mock.platform(), false, 16, Duration::from_secs(5));
        kbl.step_down(true).await;
        kbl.set_level(3, true, true).await;
        assert_eq!(kbl.level(), 16);
        assert!(mock.firmware.calls().is_empty());
        assert!(mock.events.events().is_empty());
        assert!(mock.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_firmware_failure_keeps_level() {
        let mock = MockPlatform::new();
        mock.firmware.remove_method(method::SKBV);
        let mut kbl = backlight(&mock);
        kbl.set_level(4, true, false).await;
        assert_eq!(kbl.level(), 4);
        assert_eq!(mock.events.badges(), vec![64]);
    }
}

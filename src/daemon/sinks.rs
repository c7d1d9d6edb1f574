//! Logging collaborators
//!
//! Used when no richer consumer is available: events and samples end up in
//! the log instead of being dropped.

use async_trait::async_trait;
use asus_smc_platform::{
    EventSink, InputReportSink, KeyDescriptor, KeyReport, PlatformError, SampleEvent,
    TelemetryHost, UserEvent,
};
use tracing::{debug, info};

/// Input sink that only logs key transitions
pub struct LogInputSink;

#[async_trait]
impl InputReportSink for LogInputSink {
    async fn post(&self, report: KeyReport) -> Result<(), PlatformError> {
        if report.pressed {
            info!("Key 0x{:02X}:0x{:02X}", report.page, report.usage);
        }
        Ok(())
    }
}

/// User event sink writing one log line per event
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn send(&self, event: UserEvent) -> Result<(), PlatformError> {
        match event {
            UserEvent::KeyboardBacklight { value } => {
                info!("Keyboard backlight {}%", value as u32 * 100 / 255)
            }
            UserEvent::Sleep => info!("Sleep requested"),
            UserEvent::AirplaneMode => info!("Airplane mode toggled"),
        }
        Ok(())
    }
}

/// Telemetry host that accepts the key table and logs samples
pub struct LogTelemetry;

#[async_trait]
impl TelemetryHost for LogTelemetry {
    async fn attach(&self, keys: &[KeyDescriptor]) -> Result<(), PlatformError> {
        for key in keys {
            debug!(
                "Key {:?} {} {}",
                key.name,
                key.flags,
                key.value_type.name()
            );
        }
        Ok(())
    }

    async fn detach(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn post_interrupt(&self, event: SampleEvent) -> Result<(), PlatformError> {
        debug!("Sample {:?}", event);
        Ok(())
    }
}

//! Ambient light sensor state
//!
//! [`LuxCell`] is the one piece of state read outside the engine loop: the
//! registry serves `ALV0` straight from it. The poller itself is just a
//! schedule; the engine loop owns the timer and calls [`refresh`] on expiry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asus_smc_platform::protocol::{method, LUX_INVALID};
use asus_smc_platform::{FirmwareBridge, SampleEvent, TelemetryHost};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Latest ambient lux, shared between the engine and registry readers
///
/// Written with `Release`, read with `Acquire`. Holds either a verbatim
/// firmware value or [`LUX_INVALID`].
#[derive(Debug, Clone)]
pub struct LuxCell(Arc<AtomicU32>);

impl LuxCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(LUX_INVALID)))
    }

    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn store(&self, lux: u32) {
        self.0.store(lux, Ordering::Release);
    }
}

impl Default for LuxCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Poller schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Scheduled(Instant),
}

/// Fixed-interval poller schedule
#[derive(Debug)]
pub struct AlsPoller {
    interval: Duration,
    state: PollState,
}

impl AlsPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Next firing, if scheduled
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PollState::Idle => None,
            PollState::Scheduled(at) => Some(at),
        }
    }

    /// Schedule the next firing one interval from now
    pub fn schedule(&mut self) {
        self.state = PollState::Scheduled(Instant::now() + self.interval);
    }

    pub fn cancel(&mut self) {
        self.state = PollState::Idle;
    }
}

/// One poller firing: read `ALSS`, publish, raise the interrupt
///
/// A failed read publishes [`LUX_INVALID`]. Returns the published value.
pub async fn refresh(
    firmware: &dyn FirmwareBridge,
    telemetry: &dyn TelemetryHost,
    cell: &LuxCell,
) -> u32 {
    let lux = match firmware.evaluate_integer(method::ALSS, &[]).await {
        Ok(v) => u32::try_from(v).unwrap_or_else(|_| {
            warn!("ALS value 0x{:X} out of range", v);
            LUX_INVALID
        }),
        Err(e) => {
            debug!("ALS read failed: {}", e);
            LUX_INVALID
        }
    };

    cell.store(lux);

    if let Err(e) = telemetry
        .post_interrupt(SampleEvent::AmbientLightChanged { lux })
        .await
    {
        warn!("Failed to signal ALS sample: {}", e);
    }

    lux
}

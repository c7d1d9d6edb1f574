//! Suspend handshake
//!
//! logind only waits for a sleep transition while someone holds a delay
//! lock. [`SleepGate`] keeps that lock until the off transition has been
//! written, and takes a fresh one on resume.

use std::future::Future;

use tracing::debug;

use crate::engine::EngineHandle;
use crate::error::SmcError;
use crate::power::PowerState;

/// Delay lock holder for one `PrepareForSleep` stream
pub struct SleepGate<L> {
    lock: Option<L>,
}

impl<L> SleepGate<L> {
    pub fn new(lock: Option<L>) -> Self {
        Self { lock }
    }

    pub fn is_held(&self) -> bool {
        self.lock.is_some()
    }

    /// Handle `PrepareForSleep(start)`
    ///
    /// On suspend the lock is dropped after the engine acknowledged the off
    /// transition, even when that failed. On resume `acquire` runs first so a
    /// quick re-suspend is covered too.
    pub async fn prepare_for_sleep<F, Fut>(
        &mut self,
        engine: &EngineHandle,
        start: bool,
        acquire: F,
    ) -> Result<(), SmcError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<L>>,
    {
        if start {
            let result = engine.set_power_state(PowerState::Off).await;
            if self.lock.take().is_some() {
                debug!("Released sleep delay lock");
            }
            result
        } else {
            if self.lock.is_none() {
                self.lock = acquire().await;
            }
            engine.set_power_state(PowerState::On).await
        }
    }
}

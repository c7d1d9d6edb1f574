//! Platform collaborator interfaces for the ASUS ATK event mediation engine
//!
//! The engine never talks to hardware directly. Everything it consumes is one
//! of the traits below:
//!
//! - [`FirmwareBridge`]: evaluates ATK ACPI methods
//! - [`KeyValueStore`]: durable storage for the keyboard backlight level
//! - [`InputReportSink`]: virtual keyboard receiving consumer/top-case usages
//! - [`EventSink`]: user-space events (badges, sleep, airplane mode)
//! - [`TelemetryHost`]: external sensor/key registry consumer
//! - [`DisplayParameters`]: current panel brightness
//! - [`Subscriber`]: a consumer of broadcast messages
//!
//! Concrete stores live in [`store`]; recording doubles for tests live in
//! `mock` (feature `mock`).

pub mod error;
pub mod protocol;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::PlatformError;
pub use store::{MemoryStore, SledStore};
pub use types::{
    FirmwareValue, KeyDescriptor, KeyFlags, KeyReport, KeyValue, PanelBrightness, SampleEvent,
    SubscriberId, SubscriberMessage, UserEvent, ValueType,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Executes named methods on the ATK platform device
///
/// Implementations must not be called concurrently; the engine guarantees
/// that all calls come from its single serialized context.
#[async_trait]
pub trait FirmwareBridge: Send + Sync {
    /// Evaluate a method with integer arguments
    ///
    /// # Arguments
    /// * `method` - Method name (e.g. `protocol::method::SKBV`)
    /// * `args` - Integer arguments, in order
    async fn evaluate(&self, method: &str, args: &[u64]) -> Result<FirmwareValue, PlatformError>;

    /// Check that a method exists
    ///
    /// `Err(PlatformError::Unsupported)` means the capability is absent.
    async fn validate(&self, method: &str) -> Result<(), PlatformError>;

    /// Evaluate a method and require an integer result
    async fn evaluate_integer(&self, method: &str, args: &[u64]) -> Result<u64, PlatformError> {
        self.evaluate(method, args).await?.as_integer(method)
    }
}

/// Durable key/value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError>;

    /// Write a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), PlatformError>;
}

/// Virtual keyboard receiving key transitions
#[async_trait]
pub trait InputReportSink: Send + Sync {
    async fn post(&self, report: KeyReport) -> Result<(), PlatformError>;
}

/// User-space event channel
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: UserEvent) -> Result<(), PlatformError>;
}

/// External telemetry consumer of the key registry
#[async_trait]
pub trait TelemetryHost: Send + Sync {
    /// Declare the full key table. Called once; failure leaves the registry inert.
    async fn attach(&self, keys: &[KeyDescriptor]) -> Result<(), PlatformError>;

    /// Withdraw the key table
    async fn detach(&self) -> Result<(), PlatformError>;

    /// Raise an out-of-band signal (e.g. new sensor sample)
    async fn post_interrupt(&self, event: SampleEvent) -> Result<(), PlatformError>;
}

/// Source of the current panel brightness
#[async_trait]
pub trait DisplayParameters: Send + Sync {
    async fn brightness(&self) -> Result<PanelBrightness, PlatformError>;
}

/// Consumer of broadcast messages
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Deliver one message
    async fn deliver(&self, message: &SubscriberMessage) -> Result<(), PlatformError>;
}

/// Bundle of every collaborator the engine needs
#[derive(Clone)]
pub struct Platform {
    pub firmware: Arc<dyn FirmwareBridge>,
    pub store: Arc<dyn KeyValueStore>,
    pub input: Arc<dyn InputReportSink>,
    pub events: Arc<dyn EventSink>,
    pub telemetry: Arc<dyn TelemetryHost>,
    pub display: Arc<dyn DisplayParameters>,
}

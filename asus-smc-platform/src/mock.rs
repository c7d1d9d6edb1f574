//! Recording test doubles for every collaborator trait
//!
//! Enabled with the `mock` feature. Each double records what it was asked to
//! do and can be scripted to fail, so tests can assert on observable side
//! effects only.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::protocol::method;
use crate::types::{
    FirmwareValue, KeyDescriptor, KeyReport, PanelBrightness, SampleEvent, SubscriberMessage,
    UserEvent,
};
use crate::{
    DisplayParameters, EventSink, FirmwareBridge, InputReportSink, KeyValueStore, MemoryStore,
    Platform, Subscriber, TelemetryHost,
};

// ============================================================================
// Firmware
// ============================================================================

/// One recorded firmware evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareCall {
    pub method: String,
    pub args: Vec<u64>,
}

/// Scriptable firmware bridge
///
/// Methods not in the supported set report `Unsupported`. Supported methods
/// return their scripted response, or `FirmwareValue::Nothing`.
#[derive(Default)]
pub struct MockFirmware {
    supported: Mutex<HashSet<String>>,
    responses: Mutex<HashMap<String, Result<FirmwareValue, PlatformError>>>,
    calls: Mutex<Vec<FirmwareCall>>,
    latency: Mutex<Option<Duration>>,
    in_call: AtomicBool,
    overlaps: AtomicUsize,
}

impl MockFirmware {
    /// Firmware supporting no methods at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Firmware supporting exactly `methods`
    pub fn with_methods(methods: &[&str]) -> Self {
        let fw = Self::new();
        fw.supported
            .lock()
            .extend(methods.iter().map(|m| m.to_string()));
        fw
    }

    /// Firmware with every ATK method, direct messaging included
    pub fn full() -> Self {
        Self::with_methods(&[
            method::INIT,
            method::DMES,
            method::WED,
            method::SKBV,
            method::ALSC,
            method::ALSS,
        ])
    }

    /// Remove a method from the supported set
    pub fn remove_method(&self, name: &str) {
        self.supported.lock().remove(name);
    }

    /// Script the result of a method
    pub fn set_response(&self, name: &str, result: Result<FirmwareValue, PlatformError>) {
        self.responses.lock().insert(name.to_string(), result);
    }

    /// Script the lux value returned by `ALSS`
    pub fn set_lux(&self, lux: u32) {
        self.set_response(method::ALSS, Ok(FirmwareValue::Integer(lux as u64)));
    }

    /// Make every evaluation take `latency` (exposes overlapping callers)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// All recorded evaluations, in order
    pub fn calls(&self) -> Vec<FirmwareCall> {
        self.calls.lock().clone()
    }

    /// Arguments of every recorded call to `name`
    pub fn calls_to(&self, name: &str) -> Vec<Vec<u64>> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == name)
            .map(|c| c.args.clone())
            .collect()
    }

    /// Values written to the keyboard backlight, in order
    pub fn backlight_writes(&self) -> Vec<u64> {
        self.calls_to(method::SKBV)
            .into_iter()
            .filter_map(|args| args.first().copied())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of evaluations that started while another was in flight
    pub fn overlapping_calls(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirmwareBridge for MockFirmware {
    async fn evaluate(&self, name: &str, args: &[u64]) -> Result<FirmwareValue, PlatformError> {
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        self.calls.lock().push(FirmwareCall {
            method: name.to_string(),
            args: args.to_vec(),
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let result = if !self.supported.lock().contains(name) {
            Err(PlatformError::Unsupported(name.to_string()))
        } else {
            self.responses
                .lock()
                .get(name)
                .cloned()
                .unwrap_or(Ok(FirmwareValue::Nothing))
        };

        self.in_call.store(false, Ordering::SeqCst);
        result
    }

    async fn validate(&self, name: &str) -> Result<(), PlatformError> {
        if self.supported.lock().contains(name) {
            Ok(())
        } else {
            Err(PlatformError::Unsupported(name.to_string()))
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-memory store with failure injection
#[derive(Default)]
pub struct MockStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    hang_reads: AtomicBool,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording it as a write
    pub async fn seed(&self, key: &str, value: &[u8]) {
        let _ = self.inner.set(key, value).await;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make reads never complete
    pub fn set_hang_reads(&self, hang: bool) {
        self.hang_reads.store(hang, Ordering::SeqCst);
    }

    /// All successful writes, in order
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
        if self.hang_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PlatformError::Storage("read failure injected".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PlatformError::Storage("write failure injected".into()));
        }
        self.inner.set(key, value).await?;
        self.writes.lock().push((key.to_string(), value.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Virtual keyboard that records every report
#[derive(Default)]
pub struct RecordingInput {
    reports: Mutex<Vec<KeyReport>>,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<KeyReport> {
        self.reports.lock().clone()
    }

    /// Usages of press reports only, in order
    pub fn presses(&self) -> Vec<(u16, u16)> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.pressed)
            .map(|r| (r.page, r.usage))
            .collect()
    }

    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

#[async_trait]
impl InputReportSink for RecordingInput {
    async fn post(&self, report: KeyReport) -> Result<(), PlatformError> {
        self.reports.lock().push(report);
        Ok(())
    }
}

/// Event sink that records every event
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<UserEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UserEvent> {
        self.events.lock().clone()
    }

    /// Scaled values of every backlight badge, in order
    pub fn badges(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UserEvent::KeyboardBacklight { value } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEvents {
    async fn send(&self, event: UserEvent) -> Result<(), PlatformError> {
        self.events.lock().push(event);
        Ok(())
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Telemetry host that records attachment and interrupts
#[derive(Default)]
pub struct MockTelemetry {
    fail_attach: AtomicBool,
    attached: Mutex<Option<Vec<KeyDescriptor>>>,
    interrupts: Mutex<Vec<SampleEvent>>,
    detach_count: AtomicUsize,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that refuses attachment
    pub fn unavailable() -> Self {
        let host = Self::new();
        host.fail_attach.store(true, Ordering::SeqCst);
        host
    }

    pub fn attached_keys(&self) -> Option<Vec<KeyDescriptor>> {
        self.attached.lock().clone()
    }

    pub fn interrupts(&self) -> Vec<SampleEvent> {
        self.interrupts.lock().clone()
    }

    pub fn detach_count(&self) -> usize {
        self.detach_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryHost for MockTelemetry {
    async fn attach(&self, keys: &[KeyDescriptor]) -> Result<(), PlatformError> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("telemetry host".into()));
        }
        *self.attached.lock() = Some(keys.to_vec());
        Ok(())
    }

    async fn detach(&self) -> Result<(), PlatformError> {
        self.detach_count.fetch_add(1, Ordering::SeqCst);
        *self.attached.lock() = None;
        Ok(())
    }

    async fn post_interrupt(&self, event: SampleEvent) -> Result<(), PlatformError> {
        self.interrupts.lock().push(event);
        Ok(())
    }
}

// ============================================================================
// Display
// ============================================================================

/// Display parameter source with a settable brightness
pub struct MockDisplay {
    brightness: Mutex<Result<PanelBrightness, PlatformError>>,
    reads: AtomicUsize,
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self {
            brightness: Mutex::new(Ok(PanelBrightness {
                value: 1024,
                max: 1024,
            })),
            reads: AtomicUsize::new(0),
        }
    }
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_brightness(&self, result: Result<PanelBrightness, PlatformError>) {
        *self.brightness.lock() = result;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DisplayParameters for MockDisplay {
    async fn brightness(&self) -> Result<PanelBrightness, PlatformError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.brightness.lock().clone()
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Subscriber that records delivered messages
pub struct RecordingSubscriber {
    name: String,
    messages: Mutex<Vec<SubscriberMessage>>,
    fail: AtomicBool,
}

impl RecordingSubscriber {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            messages: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<SubscriberMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &SubscriberMessage) -> Result<(), PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable(self.name.clone()));
        }
        self.messages.lock().push(*message);
        Ok(())
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Every double, with typed access for assertions
pub struct MockPlatform {
    pub firmware: Arc<MockFirmware>,
    pub store: Arc<MockStore>,
    pub input: Arc<RecordingInput>,
    pub events: Arc<RecordingEvents>,
    pub telemetry: Arc<MockTelemetry>,
    pub display: Arc<MockDisplay>,
}

impl MockPlatform {
    /// Fully capable platform with an attachable telemetry host
    pub fn new() -> Self {
        Self::with_firmware(MockFirmware::full())
    }

    pub fn with_firmware(firmware: MockFirmware) -> Self {
        Self {
            firmware: Arc::new(firmware),
            store: Arc::new(MockStore::new()),
            input: Arc::new(RecordingInput::new()),
            events: Arc::new(RecordingEvents::new()),
            telemetry: Arc::new(MockTelemetry::new()),
            display: Arc::new(MockDisplay::new()),
        }
    }

    /// Trait-object view handed to the engine
    pub fn platform(&self) -> Platform {
        Platform {
            firmware: self.firmware.clone(),
            store: self.store.clone(),
            input: self.input.clone(),
            events: self.events.clone(),
            telemetry: self.telemetry.clone(),
            display: self.display.clone(),
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_method() {
        let fw = MockFirmware::with_methods(&[method::SKBV]);
        assert!(fw.validate(method::SKBV).await.is_ok());
        let err = fw.evaluate(method::ALSS, &[]).await.unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(fw.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_lux() {
        let fw = MockFirmware::full();
        fw.set_lux(300);
        assert_eq!(fw.evaluate_integer(method::ALSS, &[]).await, Ok(300));
    }
}

//! Integration tests for engine start-up, the ALS poller, the key registry
//! and shutdown.
//!
//! Timer tests run on a paused clock so poll intervals are exact.

use std::sync::Arc;
use std::time::Duration;

use asus_smc::platform::mock::{MockFirmware, MockPlatform, MockTelemetry};
use asus_smc::platform::protocol::{key, method, LUX_INVALID};
use asus_smc::platform::{KeyValue, PlatformError, SampleEvent};
use asus_smc::{Engine, SmcConfig, SmcError};

fn als_reads(mock: &MockPlatform) -> usize {
    mock.firmware.calls_to(method::ALSS).len()
}

// ── Start-up ──

#[tokio::test]
async fn attach_publishes_full_key_table() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    let keys = mock.telemetry.attached_keys().unwrap();
    let names: Vec<_> = keys.iter().map(|k| k.name).collect();
    assert_eq!(
        names,
        vec![
            key::AL,
            key::ALI0,
            key::ALI1,
            key::ALRV,
            key::ALV0,
            key::ALV1,
            key::LKSB,
            key::LKSS,
            key::MSLD
        ]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn missing_init_still_starts() {
    let mock = MockPlatform::with_firmware(MockFirmware::with_methods(&[method::SKBV]));
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    let status = engine.status().await.unwrap();
    assert!(status.capabilities.keyboard_backlight);
    assert!(!status.capabilities.ambient_light);
    assert!(!status.als_enabled);
    assert_eq!(mock.firmware.backlight_writes(), vec![255]);
    engine.shutdown().await;
}

// ── ALS poller ──

#[tokio::test(start_paused = true)]
async fn poller_reads_once_per_interval() {
    let mock = MockPlatform::new();
    mock.firmware.set_lux(300);
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;
    assert_eq!(als_reads(&mock), 0);
    assert_eq!(engine.lux(), LUX_INVALID);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(als_reads(&mock), 1);
    assert_eq!(engine.lux(), 300);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(als_reads(&mock), 2);
    assert_eq!(
        mock.telemetry.interrupts(),
        vec![
            SampleEvent::AmbientLightChanged { lux: 300 },
            SampleEvent::AmbientLightChanged { lux: 300 }
        ]
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn custom_poll_interval() {
    let mock = MockPlatform::new();
    let config = SmcConfig {
        poll_interval_ms: 250,
        ..SmcConfig::default()
    };
    let engine = Engine::start(mock.platform(), config).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(als_reads(&mock), 4);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_read_publishes_sentinel_and_keeps_polling() {
    let mock = MockPlatform::new();
    mock.firmware.set_lux(120);
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.lux(), 120);

    mock.firmware
        .set_response(method::ALSS, Err(PlatformError::Io("bus error".into())));
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(engine.lux(), LUX_INVALID);
    assert_eq!(
        engine.read_key(key::ALV0).await,
        Ok(KeyValue::UInt32(LUX_INVALID))
    );

    mock.firmware.set_lux(45);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(engine.lux(), 45);
    assert_eq!(als_reads(&mock), 3);
    assert_eq!(
        mock.telemetry.interrupts().last(),
        Some(&SampleEvent::AmbientLightChanged { lux: 45 })
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn lux_read_matches_status() {
    let mock = MockPlatform::new();
    mock.firmware.set_lux(0x1234);
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(engine.read_key(key::ALV0).await, Ok(KeyValue::UInt32(0x1234)));
    assert_eq!(engine.status().await.unwrap().lux, 0x1234);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn inert_registry_never_polls() {
    let mut mock = MockPlatform::new();
    mock.telemetry = Arc::new(MockTelemetry::unavailable());
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    tokio::time::sleep(Duration::from_secs(5)).await;

    let status = engine.status().await.unwrap();
    assert!(!status.telemetry_attached);
    assert_eq!(als_reads(&mock), 0);
    assert!(mock.telemetry.interrupts().is_empty());
    assert_eq!(engine.read_key(key::ALRV).await, Ok(KeyValue::UInt16(1)));
    assert_eq!(engine.read_key(key::ALV0).await, Ok(KeyValue::UInt32(LUX_INVALID)));
    engine.shutdown().await;
    assert_eq!(mock.telemetry.detach_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn no_sensor_never_polls() {
    let mock = MockPlatform::with_firmware(MockFirmware::with_methods(&[
        method::INIT,
        method::SKBV,
        method::ALSC,
    ]));
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(als_reads(&mock), 0);
    assert!(mock.firmware.calls_to(method::ALSC).is_empty());
    engine.shutdown().await;
}

// ── Registry through the handle ──

#[tokio::test]
async fn registry_errors_surface_to_callers() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    assert_eq!(
        engine.read_key("ZZZZ").await,
        Err(SmcError::UnknownKey("ZZZZ".into()))
    );
    assert_eq!(
        engine.write_key(key::ALRV, KeyValue::UInt16(2)).await,
        Err(SmcError::ReadOnlyKey(key::ALRV.into()))
    );
    assert_eq!(
        engine.write_key(key::ALV0, KeyValue::UInt32(7)).await,
        Err(SmcError::NoSetter(key::ALV0.into()))
    );
    assert!(matches!(
        engine.write_key(key::LKSB, KeyValue::UInt16(3)).await,
        Err(SmcError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.write_key(key::ALI0, KeyValue::Data(vec![0; 4])).await,
        Err(SmcError::ReadOnlyKey(_))
    ));
    engine.shutdown().await;
}

#[tokio::test]
async fn static_keys_read_back_and_accept_writes() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    assert_eq!(
        engine.read_key(key::ALI0).await,
        Ok(KeyValue::Data(vec![7, 1, 6, 0]))
    );
    assert_eq!(engine.read_key(key::AL).await, Ok(KeyValue::UInt16(0)));

    engine.write_key(key::AL, KeyValue::UInt16(5)).await.unwrap();
    engine
        .write_key(key::LKSS, KeyValue::Data(vec![1, 2]))
        .await
        .unwrap();

    assert_eq!(engine.read_key(key::AL).await, Ok(KeyValue::UInt16(5)));
    assert_eq!(engine.read_key(key::LKSS).await, Ok(KeyValue::Data(vec![1, 2])));
    assert_eq!(mock.firmware.backlight_writes().len(), 1);
    engine.shutdown().await;
}

// ── Serialization ──

#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_overlap_firmware_calls() {
    let mock = MockPlatform::new();
    mock.firmware.set_latency(Duration::from_millis(20));
    mock.firmware.set_lux(10);
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.notify(0xC4).await.unwrap();
            engine.notify(0x6B).await.unwrap();
            engine.device_notification(0xC5).await.unwrap();
            engine.set_backlight_level(i, true, false).await.unwrap();
        }));
    }
    for task in futures::future::join_all(tasks).await {
        task.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(mock.firmware.overlapping_calls(), 0);
    assert!(als_reads(&mock) >= 1);
    // 8 x (step up, DMES step down, explicit set)
    assert_eq!(mock.firmware.backlight_writes().len(), 1 + 8 * 3);
    assert_eq!(mock.events.badges().len(), 8 * 3);
    engine.shutdown().await;
}

// ── Shutdown ──

#[tokio::test]
async fn shutdown_is_idempotent() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;
    let other = engine.clone();

    engine.shutdown().await;
    other.shutdown().await;
    engine.shutdown().await;

    assert!(engine.is_stopped());
    assert_eq!(mock.telemetry.detach_count(), 1);
    assert!(mock.telemetry.attached_keys().is_none());
    assert_eq!(engine.status().await, Err(SmcError::EngineStopped));
    assert_eq!(engine.notify(0xC4).await, Err(SmcError::EngineStopped));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_poller() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(als_reads(&mock), 1);

    engine.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(als_reads(&mock), 1);
}

#[tokio::test]
async fn dropping_every_handle_stops_the_engine() {
    let mock = MockPlatform::new();
    let engine = Engine::start(mock.platform(), SmcConfig::default()).await;
    drop(engine);

    for _ in 0..100 {
        if mock.telemetry.detach_count() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(mock.telemetry.detach_count(), 1);
}

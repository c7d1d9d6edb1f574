//! Integration tests for notification dispatch.
//!
//! Every test starts a real engine over the recording doubles and drives it
//! only through `EngineHandle`, asserting on what the collaborators saw.

use std::sync::Arc;

use asus_smc::platform::mock::{MockFirmware, MockPlatform, RecordingSubscriber};
use asus_smc::platform::protocol::{hid, method};
use asus_smc::platform::{
    FirmwareValue, KeyReport, PanelBrightness, Subscriber, SubscriberId, SubscriberMessage,
    UserEvent,
};
use asus_smc::codes::CODE_TABLE;
use asus_smc::{BacklightMode, Classified, Engine, EngineHandle, ServiceMessage, SmcConfig};

async fn start(mock: &MockPlatform) -> EngineHandle {
    start_with(mock, SmcConfig::default()).await
}

async fn start_with(mock: &MockPlatform, config: SmcConfig) -> EngineHandle {
    let engine = Engine::start(mock.platform(), config).await;
    mock.firmware.clear_calls();
    mock.input.clear();
    mock.events.clear();
    engine
}

// ── Key taps ──

#[tokio::test]
async fn media_key_posts_press_then_release() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;

    engine.notify(0x30).await.unwrap();

    assert_eq!(
        mock.input.reports(),
        vec![
            KeyReport::press(hid::PAGE_CONSUMER, hid::CSMR_VOLUME_INCREMENT),
            KeyReport::release(hid::PAGE_CONSUMER, hid::CSMR_VOLUME_INCREMENT),
        ]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn alternate_codes_have_identical_effects() {
    for (a, b) in [(0x40, 0x8A), (0x41, 0x82), (0x45, 0x5C)] {
        let mock_a = MockPlatform::new();
        let mock_b = MockPlatform::new();
        let engine_a = start(&mock_a).await;
        let engine_b = start(&mock_b).await;

        engine_a.notify(a).await.unwrap();
        engine_b.notify(b).await.unwrap();

        assert_eq!(mock_a.input.reports(), mock_b.input.reports());
        assert_eq!(mock_a.input.reports().len(), 2);
        engine_a.shutdown().await;
        engine_b.shutdown().await;
    }
}

#[tokio::test]
async fn brightness_ranges_are_inclusive() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;

    for code in [0x10, 0x1F, 0x20, 0x2F] {
        engine.notify(code).await.unwrap();
    }

    assert_eq!(
        mock.input.presses(),
        vec![
            (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP),
            (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP),
            (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN),
            (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN),
        ]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn video_mirror_uses_top_case_page() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    engine.notify(0x61).await.unwrap();
    assert_eq!(
        mock.input.presses(),
        vec![(hid::PAGE_TOP_CASE, hid::TC_VIDEO_MIRROR)]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn ignored_and_unknown_codes_change_nothing() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    let before = engine.status().await.unwrap();

    for code in [0x57, 0x58, 0xC6, 0xC7, 0x00, 0xFE, 0x1234] {
        engine.notify(code).await.unwrap();
    }

    assert_eq!(engine.status().await.unwrap(), before);
    assert!(mock.firmware.calls().is_empty());
    assert!(mock.input.reports().is_empty());
    assert!(mock.events.events().is_empty());
    engine.shutdown().await;
}

// ── User events ──

#[tokio::test]
async fn sleep_and_airplane_mode_send_events() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;

    engine.notify(0x5E).await.unwrap();
    engine.notify(0x7D).await.unwrap();

    assert_eq!(
        mock.events.events(),
        vec![UserEvent::Sleep, UserEvent::AirplaneMode]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn service_messages_route_like_codes() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    let sub = RecordingSubscriber::new("hid");
    let sub_dyn: Arc<dyn Subscriber> = sub.clone();
    engine.attach_subscriber(SubscriberId(1), sub_dyn).await.unwrap();

    engine.service_message(ServiceMessage::Sleep).await.unwrap();
    engine
        .service_message(ServiceMessage::AirplaneMode)
        .await
        .unwrap();
    engine
        .service_message(ServiceMessage::TouchpadToggle)
        .await
        .unwrap();
    engine
        .service_message(ServiceMessage::DisplayOff)
        .await
        .unwrap();

    assert_eq!(
        mock.events.events(),
        vec![UserEvent::Sleep, UserEvent::AirplaneMode]
    );
    assert_eq!(
        sub.messages(),
        vec![SubscriberMessage::TouchpadStatusChanged(false)]
    );
    assert!(!engine.status().await.unwrap().panel_on);
    assert_eq!(ServiceMessage::from_name("display-off"), Some(ServiceMessage::DisplayOff));
    engine.shutdown().await;
}

// ── Touchpad and subscribers ──

#[tokio::test]
async fn touchpad_toggled_twice_broadcasts_both_states() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    let a = RecordingSubscriber::new("a");
    let b = RecordingSubscriber::new("b");
    let a_dyn: Arc<dyn Subscriber> = a.clone();
    let b_dyn: Arc<dyn Subscriber> = b.clone();
    engine.attach_subscriber(SubscriberId(1), a_dyn).await.unwrap();
    engine.attach_subscriber(SubscriberId(2), b_dyn).await.unwrap();

    engine.notify(0x6B).await.unwrap();
    engine.notify(0x6B).await.unwrap();

    let expected = vec![
        SubscriberMessage::TouchpadStatusChanged(false),
        SubscriberMessage::TouchpadStatusChanged(true),
    ];
    assert_eq!(a.messages(), expected);
    assert_eq!(b.messages(), expected);
    assert!(engine.status().await.unwrap().touchpad_enabled);
    engine.shutdown().await;
}

#[tokio::test]
async fn detached_subscriber_receives_nothing() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    let a = RecordingSubscriber::new("a");
    let b = RecordingSubscriber::new("b");
    let a_dyn: Arc<dyn Subscriber> = a.clone();
    let b_dyn: Arc<dyn Subscriber> = b.clone();

    assert!(engine.attach_subscriber(SubscriberId(1), a_dyn.clone()).await.unwrap());
    assert!(!engine.attach_subscriber(SubscriberId(1), a_dyn).await.unwrap());
    assert!(engine.attach_subscriber(SubscriberId(2), b_dyn).await.unwrap());
    assert!(engine.detach_subscriber(SubscriberId(1)).await.unwrap());

    engine.notify(0x6B).await.unwrap();

    assert!(a.messages().is_empty());
    assert_eq!(b.messages().len(), 1);
    assert_eq!(engine.status().await.unwrap().subscribers, 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn failing_and_dropped_subscribers_are_tolerated() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;
    let bad = RecordingSubscriber::new("bad");
    bad.set_fail(true);
    let good = RecordingSubscriber::new("good");
    let bad_dyn: Arc<dyn Subscriber> = bad.clone();
    let good_dyn: Arc<dyn Subscriber> = good.clone();
    engine.attach_subscriber(SubscriberId(1), bad_dyn).await.unwrap();
    engine
        .attach_subscriber(SubscriberId(2), RecordingSubscriber::new("gone"))
        .await
        .unwrap();
    engine.attach_subscriber(SubscriberId(3), good_dyn).await.unwrap();

    engine.notify(0x6B).await.unwrap();

    assert_eq!(good.messages().len(), 1);
    // The dropped one is pruned during the broadcast
    assert_eq!(engine.status().await.unwrap().subscribers, 2);
    engine.shutdown().await;
}

// ── ALS toggle ──

#[tokio::test]
async fn als_toggle_flips_and_writes_state() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;

    engine.notify(0x7A).await.unwrap();
    engine.notify(0x7A).await.unwrap();

    assert_eq!(mock.firmware.calls_to(method::ALSC), vec![vec![0], vec![1]]);
    assert!(engine.status().await.unwrap().als_enabled);
    engine.shutdown().await;
}

#[tokio::test]
async fn als_toggle_without_sensor_is_noop() {
    let mock = MockPlatform::with_firmware(MockFirmware::with_methods(&[
        method::INIT,
        method::SKBV,
    ]));
    let engine = start(&mock).await;

    engine.notify(0x7A).await.unwrap();

    assert!(mock.firmware.calls().is_empty());
    assert!(!engine.status().await.unwrap().als_enabled);
    engine.shutdown().await;
}

// ── Panel toggle ──

#[tokio::test]
async fn display_toggle_replays_brightness() {
    let mock = MockPlatform::new();
    mock.display.set_brightness(Ok(PanelBrightness {
        value: 768,
        max: 1024,
    }));
    let engine = start(&mock).await;

    engine.notify(0x35).await.unwrap();
    let off = mock.input.presses();
    assert_eq!(off.len(), 16);
    assert!(off
        .iter()
        .all(|p| *p == (hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_DOWN)));
    assert!(!engine.status().await.unwrap().panel_on);

    mock.input.clear();
    engine.notify(0x33).await.unwrap();
    assert_eq!(
        mock.input.presses(),
        vec![(hid::PAGE_TOP_CASE, hid::TC_BRIGHTNESS_UP); 12]
    );
    assert!(engine.status().await.unwrap().panel_on);
    engine.shutdown().await;
}

// ── Raw notification decoding ──

#[tokio::test]
async fn raw_notification_decoded_without_direct_messaging() {
    let fw = MockFirmware::full();
    fw.remove_method(method::DMES);
    fw.set_response(method::WED, Ok(FirmwareValue::Integer(0x32)));
    let mock = MockPlatform::with_firmware(fw);
    let engine = start(&mock).await;

    engine.device_notification(0xD2).await.unwrap();

    assert_eq!(mock.firmware.calls_to(method::WED), vec![vec![0xD2]]);
    assert_eq!(
        mock.input.presses(),
        vec![(hid::PAGE_CONSUMER, hid::CSMR_MUTE)]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn raw_notification_direct_with_dmes() {
    let mock = MockPlatform::new();
    let engine = start(&mock).await;

    engine.device_notification(0x32).await.unwrap();

    assert!(mock.firmware.calls_to(method::WED).is_empty());
    assert_eq!(
        mock.input.presses(),
        vec![(hid::PAGE_CONSUMER, hid::CSMR_MUTE)]
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn failed_decode_dispatches_nothing() {
    let fw = MockFirmware::full();
    fw.remove_method(method::DMES);
    fw.remove_method(method::WED);
    let mock = MockPlatform::with_firmware(fw);
    let engine = start(&mock).await;

    engine.device_notification(0xD2).await.unwrap();

    assert!(mock.input.reports().is_empty());
    engine.shutdown().await;
}

#[tokio::test]
async fn out_of_range_decode_dispatches_nothing() {
    let fw = MockFirmware::full();
    fw.remove_method(method::DMES);
    // Low 32 bits would read as keyboard backlight up
    fw.set_response(method::WED, Ok(FirmwareValue::Integer(0x1_0000_00C4)));
    let mock = MockPlatform::with_firmware(fw);
    let engine = start(&mock).await;
    let before = engine.status().await.unwrap();

    engine.device_notification(0xD2).await.unwrap();

    assert_eq!(mock.firmware.calls_to(method::WED), vec![vec![0xD2]]);
    assert!(mock.firmware.backlight_writes().is_empty());
    assert!(mock.events.events().is_empty());
    assert!(mock.input.reports().is_empty());
    assert_eq!(engine.status().await.unwrap(), before);
    engine.shutdown().await;
}

// ── Table coverage ──

#[tokio::test]
async fn every_table_action_has_an_effect() {
    for entry in CODE_TABLE {
        let Classified::Action(action) = entry.class else {
            continue;
        };
        let mock = MockPlatform::new();
        let engine = start(&mock).await;
        let before = engine.status().await.unwrap();

        engine.notify(entry.code).await.unwrap();

        let acted = !mock.input.reports().is_empty()
            || !mock.events.events().is_empty()
            || !mock.firmware.calls().is_empty()
            || engine.status().await.unwrap() != before;
        assert!(acted, "0x{:02X} ({}) had no effect", entry.code, action);
        engine.shutdown().await;
    }
}

// ── Legacy backlight mode ──

#[tokio::test]
async fn hid_keys_mode_forwards_illumination_keys() {
    let mock = MockPlatform::new();
    let config = SmcConfig {
        backlight_mode: BacklightMode::HidKeys,
        ..SmcConfig::default()
    };
    let engine = start_with(&mock, config).await;

    engine.notify(0xC4).await.unwrap();
    engine.notify(0xC5).await.unwrap();

    assert_eq!(
        mock.input.presses(),
        vec![
            (hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_UP),
            (hid::PAGE_TOP_CASE, hid::TC_ILLUMINATION_DOWN),
        ]
    );
    assert!(mock.firmware.backlight_writes().is_empty());
    assert!(mock.events.badges().is_empty());
    engine.shutdown().await;
}

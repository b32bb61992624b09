use super::*;
use crate::camera::{CaptureSession, FrameSource};
use crate::config::{CameraConfig, EngineConfig};
use crate::devices::{CaptureDevice, Facing};
use crate::error::DecodeError;
use crate::events::{EventFilter, EventReceiver, ScanEvent};
use crate::frame::LumaImage;
use crate::platform::{MockDevice, MockPlatform};
use crate::testing::{ean13_modules, encode_png, frame, render_linear, render_qr};
use std::time::Duration;
use tokio::time::timeout;

fn create_test_engine_config() -> EngineConfig {
    EngineConfig {
        poll_fps: Some(100),
        degraded_after_errors: 3,
        ..EngineConfig::default()
    }
}

fn back_camera() -> CaptureDevice {
    CaptureDevice {
        id: "cam1".to_string(),
        label: "Back Camera".to_string(),
        facing: Facing::Back,
        generation: 1,
    }
}

async fn open_session(platform: &Arc<MockPlatform>, mode: ScanMode) -> (CaptureSession, FrameSource) {
    let mut session = CaptureSession::new(
        platform.clone(),
        CameraConfig {
            focus_settle_ms: 0,
            ..CameraConfig::default()
        },
    );
    session.open(&back_camera(), mode).await.unwrap();
    let source = session.frame_source().unwrap();
    (session, source)
}

fn platform() -> Arc<MockPlatform> {
    Arc::new(MockPlatform::new(vec![MockDevice::new("cam1", "Back Camera")]))
}

#[test]
fn test_engine_kind_parsing() {
    assert_eq!("continuous".parse::<EngineKind>().unwrap(), EngineKind::Continuous);
    assert_eq!("Still".parse::<EngineKind>().unwrap(), EngineKind::Still);
    assert!("burst".parse::<EngineKind>().is_err());
    assert_eq!(serde_json::to_string(&EngineKind::Still).unwrap(), "\"still\"");
}

#[test]
fn test_engine_from_config() {
    let engine = DecodeEngine::from_config(&EngineConfig::default(), None);
    assert_eq!(engine.kind(), EngineKind::Continuous);
    assert_eq!(engine.allow_list(ScanMode::QrCode), &[Symbology::QrCode]);

    let still = DecodeEngine::from_config(
        &EngineConfig {
            kind: EngineKind::Still,
            ..EngineConfig::default()
        },
        None,
    );
    assert_eq!(still.kind(), EngineKind::Still);
}

#[test]
fn test_poll_interval_follows_mode() {
    let engine = ContinuousEngine::new(EngineConfig::default());
    assert_eq!(engine.poll_interval(ScanMode::QrCode), Duration::from_millis(100));
    assert_eq!(engine.poll_interval(ScanMode::BarcodeEan), Duration::from_micros(33_333));

    let pinned = ContinuousEngine::new(EngineConfig {
        poll_fps: Some(20),
        ..EngineConfig::default()
    });
    assert_eq!(pinned.poll_interval(ScanMode::QrCode), Duration::from_millis(50));

    let excessive = ContinuousEngine::new(EngineConfig {
        poll_fps: Some(2000),
        ..EngineConfig::default()
    });
    let interval = excessive.poll_interval(ScanMode::QrCode);
    assert!(interval > Duration::ZERO);
    assert_eq!(interval, Duration::from_micros(1_000_000 / MAX_POLL_FPS as u64));
}

#[tokio::test]
async fn test_excessive_poll_rate_still_delivers() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::QrCode).await;
    platform.push_frame("cam1", frame(1, render_qr("ROOM-42", 6, 480, 360)));

    let engine = ContinuousEngine::new(EngineConfig {
        poll_fps: Some(2000),
        ..EngineConfig::default()
    });
    let mut attachment = engine.attach(source, ScanMode::QrCode, Uuid::new_v4());
    let result = timeout(Duration::from_secs(5), attachment.take_receiver().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text, "ROOM-42");
}

#[tokio::test]
async fn test_large_qr_found_in_barcode_all_mode() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::BarcodeAll).await;
    // taller than the strip-shaped region of interest
    platform.push_frame("cam1", frame(1, render_qr("ROOM-42", 12, 640, 480)));

    let config = create_test_engine_config();
    assert!(!config.try_harder);
    let engine = ContinuousEngine::new(config);
    let mut attachment = engine.attach(source, ScanMode::BarcodeAll, Uuid::new_v4());
    let result = timeout(Duration::from_secs(5), attachment.take_receiver().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text, "ROOM-42");
    assert_eq!(result.format, Symbology::QrCode);
}

#[tokio::test]
async fn test_continuous_delivers_first_hit_only() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::BarcodeEan).await;

    platform.push_frame("cam1", frame(1, LumaImage::filled(640, 360, 255)));
    platform.push_frame(
        "cam1",
        frame(2, render_linear(&ean13_modules("5901234123457"), 3, 640, 360)),
    );
    platform.push_frame(
        "cam1",
        frame(3, render_linear(&ean13_modules("4006381333931"), 3, 640, 360)),
    );

    let engine = ContinuousEngine::new(create_test_engine_config());
    let attempt = Uuid::new_v4();
    let mut attachment = engine.attach(source, ScanMode::BarcodeEan, attempt);
    let receiver = attachment.take_receiver().unwrap();
    assert!(attachment.take_receiver().is_none());

    let result = timeout(Duration::from_secs(5), receiver)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text, "5901234123457");
    assert_eq!(result.format, Symbology::Ean13);
    assert_eq!(result.source, ResultSource::Live);
    assert_eq!(result.attempt_id, attempt);
}

#[tokio::test]
async fn test_roi_follows_actual_frame_size() {
    let platform = platform();
    // session negotiates 1920x1080 but the source delivers smaller frames
    let (_session, source) = open_session(&platform, ScanMode::QrCode).await;
    platform.push_frame("cam1", frame(1, render_qr("ROOM-42", 6, 480, 360)));

    let engine = ContinuousEngine::new(create_test_engine_config());
    let mut attachment = engine.attach(source, ScanMode::QrCode, Uuid::new_v4());
    let result = timeout(Duration::from_secs(5), attachment.take_receiver().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text, "ROOM-42");
    assert_eq!(result.format, Symbology::QrCode);
}

#[tokio::test]
async fn test_detach_prevents_delivery() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::BarcodeEan).await;

    let engine = ContinuousEngine::new(create_test_engine_config());
    let mut attachment = engine.attach(source, ScanMode::BarcodeEan, Uuid::new_v4());
    let receiver = attachment.take_receiver().unwrap();

    attachment.detach();
    assert!(attachment.is_detached());
    platform.push_frame(
        "cam1",
        frame(1, render_linear(&ean13_modules("5901234123457"), 3, 640, 360)),
    );

    let outcome = timeout(Duration::from_secs(1), receiver).await.unwrap();
    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_mode_isolation_on_live_frames() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::QrCode).await;
    platform.push_frame(
        "cam1",
        frame(1, render_linear(&ean13_modules("5901234123457"), 3, 640, 360)),
    );

    let engine = ContinuousEngine::new(create_test_engine_config());
    let mut attachment = engine.attach(source, ScanMode::QrCode, Uuid::new_v4());
    let receiver = attachment.take_receiver().unwrap();

    assert!(timeout(Duration::from_millis(300), receiver).await.is_err());
}

#[tokio::test]
async fn test_degraded_event_published_once() {
    let platform = platform();
    let (_session, source) = open_session(&platform, ScanMode::BarcodeEan).await;
    platform.fail_frames("cam1", 8);

    let bus = Arc::new(EventBus::new(16));
    let mut events = EventReceiver::new(
        bus.subscribe(),
        EventFilter::EventTypes(vec!["engine_degraded"]),
        "test",
    );

    let engine = ContinuousEngine::new(create_test_engine_config()).with_event_bus(bus.clone());
    let _attachment = engine.attach(source, ScanMode::BarcodeEan, Uuid::new_v4());

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        ScanEvent::EngineDegraded {
            device_id,
            consecutive_errors,
        } => {
            assert_eq!(device_id, "cam1");
            assert_eq!(consecutive_errors, 3);
        }
        other => panic!("unexpected event {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().unwrap().is_none());
}

#[tokio::test]
async fn test_closed_source_stops_poller() {
    let platform = platform();
    let (mut session, source) = open_session(&platform, ScanMode::BarcodeEan).await;

    let engine = ContinuousEngine::new(create_test_engine_config());
    let mut attachment = engine.attach(source, ScanMode::BarcodeEan, Uuid::new_v4());
    let receiver = attachment.take_receiver().unwrap();

    session.close();
    platform.push_frame(
        "cam1",
        frame(1, render_linear(&ean13_modules("5901234123457"), 3, 640, 360)),
    );
    attachment.detach();

    assert!(timeout(Duration::from_secs(1), receiver).await.unwrap().is_err());
    assert_eq!(platform.live_streams(), 0);
}

#[tokio::test]
async fn test_still_image_bytes() {
    let engine = StillImageEngine::new(EngineConfig::default());
    let attempt = Uuid::new_v4();

    let png = encode_png(&render_linear(&ean13_modules("5901234123457"), 3, 640, 240));
    let result = engine
        .decode_image(png, ScanMode::BarcodeEan, attempt)
        .await
        .unwrap();
    assert_eq!(result.text, "5901234123457");
    assert_eq!(result.source, ResultSource::Still);
    assert_eq!(result.attempt_id, attempt);

    let blank = encode_png(&LumaImage::filled(320, 240, 255));
    assert_eq!(
        engine
            .decode_image(blank, ScanMode::BarcodeAll, attempt)
            .await
            .unwrap_err(),
        DecodeError::NoCodeFound
    );

    let garbage = engine
        .decode_image(b"not an image".to_vec(), ScanMode::QrCode, attempt)
        .await
        .unwrap_err();
    assert!(matches!(garbage, DecodeError::Image { .. }));
}

#[tokio::test]
async fn test_still_frame_respects_mode() {
    let engine = StillImageEngine::new(EngineConfig::default());
    let qr = frame(7, render_qr("https://example.com/p/1", 6, 480, 480));

    assert_eq!(
        engine
            .decode_frame(qr.clone(), ScanMode::BarcodeEan, Uuid::new_v4())
            .await
            .unwrap_err(),
        DecodeError::NoCodeFound
    );

    let result = engine
        .decode_frame(qr, ScanMode::BarcodeAll, Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(result.format, Symbology::QrCode);
    assert_eq!(result.text, "https://example.com/p/1");
}

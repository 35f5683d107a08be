//! End-to-end tests against the loopback engine: media paths, device
//! enumeration sentinels, engine environment application, and enable
//! toggles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mediabridge::config::BridgeSettings;
use mediabridge::devices;
use mediabridge::engine::MediaEngine;
use mediabridge::session::{ConnectConfig, Session, SessionState};
use mediabridge::testing::{LoopbackBehavior, LoopbackEngine};
use mediabridge::types::VideoTexture;

fn valid_config() -> ConnectConfig {
    ConnectConfig {
        signaling_url: "wss://sfu.example.com/signaling".to_string(),
        channel_id: "lobby".to_string(),
        ..ConnectConfig::default()
    }
}

fn pump_until(session: &Session, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        session.dispatch_events();
        if done() {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn render_ticks_produce_capturer_frames_and_track_textures() {
    let engine = LoopbackEngine::with_behavior(LoopbackBehavior {
        tracks: vec![7],
        frame_width: 32,
        frame_height: 16,
        ..LoopbackBehavior::default()
    });
    let session = Session::create(&engine);

    let frames = Arc::new(AtomicUsize::new(0));
    let sink = frames.clone();
    session.set_on_capturer_frame(move |frame| {
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 16);
        assert_eq!(frame.data.len(), 32 * 16 * 4);
        sink.fetch_add(1, Ordering::SeqCst);
    });

    let tracks = Arc::new(Mutex::new(Vec::new()));
    let sink = tracks.clone();
    session.set_on_add_track(move |track_id, _| {
        sink.lock().unwrap().push(track_id);
    });

    session.connect(&valid_config()).unwrap();
    pump_until(&session, || session.state() == SessionState::Connected);
    pump_until(&session, || !tracks.lock().unwrap().is_empty());
    assert_eq!(*tracks.lock().unwrap(), vec![7]);

    // Drive a few frames.
    for _ in 0..3 {
        session.on_render();
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while frames.load(Ordering::SeqCst) < 3 {
        assert!(Instant::now() < deadline, "capturer frames never arrived");
        std::thread::sleep(Duration::from_millis(5));
    }

    // The received track can now be copied into a host texture.
    let mut texture = VideoTexture::new(0, 0);
    let deadline = Instant::now() + Duration::from_secs(5);
    while !session.render_track_to_texture(7, &mut texture) {
        assert!(Instant::now() < deadline, "track texture never became available");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(texture.width, 32);
    assert_eq!(texture.height, 16);
    assert_eq!(texture.data.len(), 32 * 16 * 4);

    // Unknown tracks copy nothing.
    assert!(!session.render_track_to_texture(99, &mut texture));
}

#[test]
fn video_toggle_stops_frame_production() {
    let engine = LoopbackEngine::new();
    let session = Session::create(&engine);

    let frames = Arc::new(AtomicUsize::new(0));
    let sink = frames.clone();
    session.set_on_capturer_frame(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    session.connect(&valid_config()).unwrap();
    pump_until(&session, || session.state() == SessionState::Connected);

    assert!(session.video_enabled());
    session.set_video_enabled(false);
    assert!(!session.video_enabled());

    session.on_render();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(frames.load(Ordering::SeqCst), 0);

    session.set_video_enabled(true);
    session.on_render();
    let deadline = Instant::now() + Duration::from_secs(5);
    while frames.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "frames never resumed");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn audio_toggle_gates_direct_audio() {
    let engine = LoopbackEngine::new();
    let session = Session::create(&engine);

    let callbacks = Arc::new(AtomicUsize::new(0));
    let sink = callbacks.clone();
    session.set_on_handle_audio(move |_, _, _| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    session.connect(&valid_config()).unwrap();
    pump_until(&session, || session.state() == SessionState::Connected);

    session.set_audio_enabled(false);
    session.process_audio(&[0.0; 960]);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(callbacks.load(Ordering::SeqCst), 0);

    session.set_audio_enabled(true);
    session.process_audio(&[0.0; 960]);
    let deadline = Instant::now() + Duration::from_secs(5);
    while callbacks.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "audio callback never resumed");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn device_enumeration_distinguishes_failure_from_empty() {
    let engine = LoopbackEngine::new();
    let cameras = devices::video_capturer_devices(&engine).unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].unique_id, "loopback-cam-0");
    assert!(devices::find_device(&cameras, "Loopback Camera").is_some());

    let mut engine = LoopbackEngine::new();
    engine.recording_devices = Some(Vec::new());
    engine.playout_devices = None;
    // Empty is a successful enumeration...
    assert_eq!(devices::audio_recording_devices(&engine), Some(Vec::new()));
    // ...while None is the failure sentinel.
    assert_eq!(devices::audio_playout_devices(&engine), None);
}

#[test]
fn settings_env_reaches_the_engine_before_sessions() {
    let mut settings = BridgeSettings::default();
    settings
        .engine_env
        .insert("MEDIA_ENGINE_LOG".to_string(), "verbose".to_string());
    settings
        .engine_env
        .insert("MEDIA_ENGINE_TURN".to_string(), "disabled".to_string());
    settings.validate().unwrap();

    let engine = LoopbackEngine::new();
    settings.apply_engine_env(&engine);

    let env = engine.env();
    assert_eq!(env.get("MEDIA_ENGINE_LOG"), Some(&"verbose".to_string()));
    assert_eq!(env.get("MEDIA_ENGINE_TURN"), Some(&"disabled".to_string()));

    assert!(engine.is_h264_supported());
    let _session = Session::create(&engine);
}

#[test]
fn settings_roundtrip_through_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mediabridge.toml");

    let mut settings = BridgeSettings::default();
    settings.video.default_width = 1280;
    settings.video.default_height = 720;
    settings
        .engine_env
        .insert("MEDIA_ENGINE_HWENC".to_string(), "nvcodec".to_string());
    settings.save_to_file(&path).unwrap();

    let loaded = BridgeSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded.video.default_width, 1280);
    assert_eq!(loaded.video.default_height, 720);
    assert_eq!(
        loaded.engine_env.get("MEDIA_ENGINE_HWENC"),
        Some(&"nvcodec".to_string())
    );
    loaded.validate().unwrap();
}

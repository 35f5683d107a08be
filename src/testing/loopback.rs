//! In-process loopback engine.
//!
//! Implements the full engine contract on a worker thread, with scripted
//! connection behavior: the bridge serializes a connect message, the
//! loopback parses it back, answers with success events or a rejection, and
//! guarantees the terminal disconnect event. Data channel messages are
//! echoed, pushed audio comes back through the direct handle-audio callback,
//! and render ticks produce synthetic capturer frames and per-track
//! textures.
//!
//! Events originate on the worker thread, so pumped buffering and direct
//! cross-thread delivery behave exactly as they would against a native
//! engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use uuid::Uuid;

use super::synthetic_data::synthetic_video_frame;
use crate::engine::{EngineSession, MediaEngine};
use crate::session::{ConnectMessage, EventBridge, SessionEvent};
use crate::types::{DeviceInfo, ErrorCode, VideoFrame, VideoTexture};

/// Scripted behavior of a loopback session.
#[derive(Debug, Clone)]
pub struct LoopbackBehavior {
    /// Accept the connect, or reject it with `reject_code`.
    pub accept: bool,
    pub reject_code: ErrorCode,
    pub reject_message: String,
    /// Track ids announced after a successful connect.
    pub tracks: Vec<u32>,
    /// Echo data channel messages back to the host.
    pub echo_messages: bool,
    /// Synthetic capture geometry.
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for LoopbackBehavior {
    fn default() -> Self {
        Self {
            accept: true,
            reject_code: ErrorCode::SignalingFailure,
            reject_message: "connection rejected".to_string(),
            tracks: vec![1],
            echo_messages: true,
            frame_width: 64,
            frame_height: 48,
        }
    }
}

/// Engine implementation backed by worker threads instead of native code.
pub struct LoopbackEngine {
    pub behavior: LoopbackBehavior,
    /// `None` simulates an enumeration failure (the sentinel, distinct from
    /// an empty list).
    pub video_devices: Option<Vec<DeviceInfo>>,
    pub recording_devices: Option<Vec<DeviceInfo>>,
    pub playout_devices: Option<Vec<DeviceInfo>>,
    pub h264_supported: bool,
    /// Refuse session allocation, to exercise the fatal-create path.
    pub refuse_allocation: bool,
    env: Mutex<BTreeMap<String, String>>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::with_behavior(LoopbackBehavior::default())
    }

    pub fn with_behavior(behavior: LoopbackBehavior) -> Self {
        Self {
            behavior,
            video_devices: Some(vec![DeviceInfo::new("Loopback Camera", "loopback-cam-0")]),
            recording_devices: Some(vec![DeviceInfo::new("Loopback Microphone", "loopback-mic-0")]),
            playout_devices: Some(vec![DeviceInfo::new("Loopback Speaker", "loopback-out-0")]),
            h264_supported: true,
            refuse_allocation: false,
            env: Mutex::new(BTreeMap::new()),
        }
    }

    /// Environment values applied so far, for assertions.
    pub fn env(&self) -> BTreeMap<String, String> {
        self.env.lock().expect("lock poisoned").clone()
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for LoopbackEngine {
    fn create_session(&self, bridge: Arc<EventBridge>) -> Option<Box<dyn EngineSession>> {
        if self.refuse_allocation {
            return None;
        }

        let shared = Arc::new(Shared {
            bridge,
            track_frames: Mutex::new(HashMap::new()),
            audio_enabled: AtomicBool::new(true),
            video_enabled: AtomicBool::new(true),
        });

        let (tx, rx) = unbounded();
        let worker_shared = shared.clone();
        let behavior = self.behavior.clone();
        let worker = std::thread::Builder::new()
            .name("mediabridge-loopback".to_string())
            .spawn(move || worker_loop(rx, worker_shared, behavior))
            .ok()?;

        Some(Box::new(LoopbackSession {
            tx,
            worker: Mutex::new(Some(worker)),
            shared,
        }))
    }

    fn video_capturer_devices(&self) -> Option<Vec<DeviceInfo>> {
        self.video_devices.clone()
    }

    fn audio_recording_devices(&self) -> Option<Vec<DeviceInfo>> {
        self.recording_devices.clone()
    }

    fn audio_playout_devices(&self) -> Option<Vec<DeviceInfo>> {
        self.playout_devices.clone()
    }

    fn is_h264_supported(&self) -> bool {
        self.h264_supported
    }

    fn setenv(&self, name: &str, value: &str) {
        self.env
            .lock()
            .expect("lock poisoned")
            .insert(name.to_string(), value.to_string());
    }
}

enum Command {
    Connect(String),
    Disconnect,
    Send { label: String, data: Bytes },
    Audio(Vec<f32>),
    Render,
    Stats(u64),
    Shutdown,
}

struct Shared {
    bridge: Arc<EventBridge>,
    track_frames: Mutex<HashMap<u32, VideoFrame>>,
    audio_enabled: AtomicBool,
    video_enabled: AtomicBool,
}

struct LoopbackSession {
    tx: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl EngineSession for LoopbackSession {
    fn connect(&self, message: String) {
        let _ = self.tx.send(Command::Connect(message));
    }

    fn disconnect(&self) {
        let _ = self.tx.send(Command::Disconnect);
    }

    fn send_message(&self, label: &str, data: Bytes) {
        let _ = self.tx.send(Command::Send {
            label: label.to_string(),
            data,
        });
    }

    fn process_audio(&self, samples: &[f32]) {
        let _ = self.tx.send(Command::Audio(samples.to_vec()));
    }

    fn on_render(&self) {
        let _ = self.tx.send(Command::Render);
    }

    fn copy_track_frame(&self, track_id: u32, texture: &mut VideoTexture) -> bool {
        let frames = self.shared.track_frames.lock().expect("lock poisoned");
        match frames.get(&track_id) {
            Some(frame) => {
                texture.width = frame.width;
                texture.height = frame.height;
                texture.data.clear();
                texture.data.extend_from_slice(&frame.data);
                true
            }
            None => false,
        }
    }

    fn request_stats(&self, token: u64) {
        let _ = self.tx.send(Command::Stats(token));
    }

    fn set_audio_enabled(&self, enabled: bool) {
        self.shared.audio_enabled.store(enabled, Ordering::SeqCst);
    }

    fn audio_enabled(&self) -> bool {
        self.shared.audio_enabled.load(Ordering::SeqCst)
    }

    fn set_video_enabled(&self, enabled: bool) {
        self.shared.video_enabled.store(enabled, Ordering::SeqCst);
    }

    fn video_enabled(&self) -> bool {
        self.shared.video_enabled.load(Ordering::SeqCst)
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().expect("lock poisoned").take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(rx: Receiver<Command>, shared: Arc<Shared>, behavior: LoopbackBehavior) {
    let mut established = false;
    let mut terminated = false;
    let mut connection_id = String::new();
    let mut tracks: Vec<u32> = Vec::new();
    let mut channel_labels: Vec<String> = Vec::new();
    let mut frame_sequence: u64 = 0;

    for command in rx.iter() {
        match command {
            Command::Connect(message) => match ConnectMessage::from_json(&message) {
                Err(e) => {
                    log::error!("loopback rejected malformed connect message: {}", e);
                    if !terminated {
                        shared.bridge.deliver(SessionEvent::Disconnect {
                            error_code: ErrorCode::InternalError,
                            message: format!("malformed connect message: {}", e),
                        });
                        terminated = true;
                    }
                }
                Ok(_) if !behavior.accept => {
                    if !terminated {
                        shared.bridge.deliver(SessionEvent::Disconnect {
                            error_code: behavior.reject_code,
                            message: behavior.reject_message.clone(),
                        });
                        terminated = true;
                    }
                }
                Ok(parsed) => {
                    established = true;
                    connection_id = Uuid::new_v4().to_string();
                    shared.bridge.deliver(SessionEvent::SetOffer {
                        offer: serde_json::json!({
                            "type": "offer",
                            "channel_id": parsed.channel_id,
                            "connection_id": connection_id,
                        })
                        .to_string(),
                    });
                    shared.bridge.deliver(SessionEvent::Notify {
                        message: serde_json::json!({
                            "event_type": "connection.created",
                            "connection_id": connection_id,
                            "timestamp": chrono::Utc::now().to_rfc3339(),
                        })
                        .to_string(),
                    });
                    for &track in &behavior.tracks {
                        tracks.push(track);
                        shared.bridge.deliver(SessionEvent::AddTrack {
                            track_id: track,
                            connection_id: connection_id.clone(),
                        });
                    }
                    for channel in &parsed.data_channels {
                        channel_labels.push(channel.label.clone());
                        shared.bridge.deliver(SessionEvent::DataChannelOpen {
                            label: channel.label.clone(),
                        });
                    }
                }
            },
            Command::Disconnect => {
                if !terminated {
                    for &track in &tracks {
                        shared.bridge.deliver(SessionEvent::RemoveTrack {
                            track_id: track,
                            connection_id: connection_id.clone(),
                        });
                    }
                    shared.bridge.deliver(SessionEvent::Disconnect {
                        error_code: ErrorCode::CloseSucceeded,
                        message: "disconnected".to_string(),
                    });
                    terminated = true;
                }
            }
            Command::Send { label, data } => {
                if established && !terminated && behavior.echo_messages {
                    shared.bridge.deliver(SessionEvent::Message { label, data });
                }
            }
            Command::Audio(samples) => {
                if shared.audio_enabled.load(Ordering::SeqCst) {
                    let pcm: Vec<i16> = samples
                        .iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let channels = 2;
                    shared.bridge.deliver_audio(&pcm, pcm.len() / channels, channels);
                }
            }
            Command::Render => {
                if established && !terminated && shared.video_enabled.load(Ordering::SeqCst) {
                    frame_sequence += 1;
                    let timestamp_us = chrono::Utc::now().timestamp_micros().max(0) as u64;
                    let frame = synthetic_video_frame(
                        frame_sequence,
                        timestamp_us,
                        behavior.frame_width,
                        behavior.frame_height,
                    );
                    shared.bridge.deliver_capturer_frame(&frame);
                    let mut track_frames =
                        shared.track_frames.lock().expect("lock poisoned");
                    for &track in &tracks {
                        track_frames.insert(track, frame.clone());
                    }
                }
            }
            Command::Stats(token) => {
                let report = serde_json::json!([{
                    "type": "loopback-session",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "frames_captured": frame_sequence,
                    "data_channels": channel_labels,
                    "established": established,
                }])
                .to_string();
                shared
                    .bridge
                    .deliver(SessionEvent::StatsResult { token, report });
            }
            Command::Shutdown => break,
        }
    }
}

//! The native engine boundary.
//!
//! Everything that actually moves media (signaling, ICE/DTLS, codecs,
//! jitter buffers, device I/O) lives behind these two traits. The bridge
//! never sees any of it; it only hands the engine a serialized connect
//! message and receives events back through the [`EventBridge`] it passed in
//! at session creation.
//!
//! Real deployments implement the traits over an FFI surface; the in-tree
//! [`crate::testing::LoopbackEngine`] implements them on a worker thread so
//! the full contract is exercisable offline.

use std::sync::Arc;

use bytes::Bytes;

use crate::session::EventBridge;
use crate::types::{DeviceInfo, VideoTexture};

/// Process-wide engine surface: session allocation, device enumeration and
/// global configuration.
pub trait MediaEngine: Send + Sync {
    /// Allocate one engine session. The engine keeps the bridge and produces
    /// events into it from its own threads. `None` means allocation failed;
    /// there is no recoverable path at this layer and
    /// [`crate::session::Session::create`] treats it as fatal.
    fn create_session(&self, bridge: Arc<EventBridge>) -> Option<Box<dyn EngineSession>>;

    /// Enumerate video capture devices. `None` is a failure sentinel,
    /// distinguishable from an empty list (no devices is an expected
    /// runtime condition, not a failure).
    fn video_capturer_devices(&self) -> Option<Vec<DeviceInfo>>;

    /// Enumerate audio recording devices. Sentinel semantics as above.
    fn audio_recording_devices(&self) -> Option<Vec<DeviceInfo>>;

    /// Enumerate audio playout devices. Sentinel semantics as above.
    fn audio_playout_devices(&self) -> Option<Vec<DeviceInfo>>;

    /// Whether an H.264 implementation is available on this host.
    fn is_h264_supported(&self) -> bool;

    /// Process-wide key/value configuration. Applied before any session is
    /// created; there is no teardown counterpart.
    fn setenv(&self, name: &str, value: &str);
}

/// One live engine session. All methods are non-blocking; connection
/// outcomes arrive exclusively through the event bridge.
///
/// Dropping the session destroys the engine-side handle.
pub trait EngineSession: Send {
    /// Submit the serialized connect message. No synchronous result: success
    /// events and exactly one terminal disconnect event follow via the
    /// bridge.
    fn connect(&self, message: String);

    /// Request asynchronous teardown. Safe to call repeatedly.
    fn disconnect(&self);

    /// Send a payload over an established data channel.
    fn send_message(&self, label: &str, data: Bytes);

    /// Push externally captured audio. Samples are interleaved f32 at the
    /// fixed sample-rate/channel contract in [`crate::config::AudioSettings`].
    fn process_audio(&self, samples: &[f32]);

    /// Per-frame hook, issued after the host finishes rendering a frame.
    fn on_render(&self);

    /// Copy the latest frame of a received track into a host-owned texture.
    /// Returns false when the track is unknown or has produced no frame yet.
    fn copy_track_frame(&self, track_id: u32, texture: &mut VideoTexture) -> bool;

    /// Request a statistics report. The engine answers once with a
    /// stats-result event carrying this token.
    fn request_stats(&self, token: u64);

    fn set_audio_enabled(&self, enabled: bool);
    fn audio_enabled(&self) -> bool;
    fn set_video_enabled(&self, enabled: bool);
    fn video_enabled(&self) -> bool;
}

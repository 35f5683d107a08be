//! Shared vocabulary types for the bridge.
//!
//! Enumerated types serialize as lowercase string tokens matching the
//! engine's fixed vocabulary. The first-declared variant of each enum is its
//! default; an unset value serializes to that variant rather than erroring.

use serde::{Deserialize, Serialize};

/// Connection role requested from the media service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Sendonly,
    Recvonly,
    Sendrecv,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sendonly => "sendonly",
            Role::Recvonly => "recvonly",
            Role::Sendrecv => "sendrecv",
        }
    }
}

/// Data channel direction, from the local peer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
}

/// Video codec requested for the session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodecType {
    #[default]
    Vp9,
    Vp8,
    H264,
    Av1,
}

/// Audio codec requested for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodecType {
    #[default]
    Opus,
    Lyra,
}

/// Codec implementation backing an encoder or decoder choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecImplementation {
    Internal,
    #[serde(rename = "openh264")]
    OpenH264,
    Nvcodec,
    Videotoolbox,
    Amf,
    Vpl,
}

/// Simulcast stream identifier requested when receiving a simulcast stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulcastRid {
    R0,
    R1,
    R2,
}

/// Simulcast stream identifier used for spotlight focus selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotlightRid {
    None,
    R0,
    R1,
    R2,
}

/// Numeric code delivered with the terminal disconnect event.
///
/// `CloseSucceeded` is the orderly-shutdown outcome; everything else maps a
/// failure class reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CloseSucceeded,
    CloseFailed,
    InternalError,
    PeerConnectionStateFailed,
    SignalingFailure,
    WebsocketHandshakeFailed,
    WebsocketOnClose,
    WebsocketOnError,
}

impl ErrorCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::CloseSucceeded)
    }
}

/// One enumerable media device: a display name and the identifier the engine
/// accepts back in a [`crate::session::ConnectConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub unique_id: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_id: unique_id.into(),
        }
    }
}

/// Opaque host texture reference handed to the engine for host-rendered
/// capture (a native texture pointer on real engines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef(pub u64);

/// A captured video frame delivered through the direct capturer-frame
/// callback. Pixel data is tightly packed BGRA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Host-owned pixel buffer a received track is copied into once per frame.
/// Layout matches [`VideoFrame`]: tightly packed BGRA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTexture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoTexture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }
}

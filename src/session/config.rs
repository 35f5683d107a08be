//! Connection configuration.
//!
//! `ConnectConfig` is a declarative value object: the host fills it in, hands
//! it to [`super::Session::connect`], and must treat it as immutable from
//! that point. Optional fields are tri-state: `None` defers the decision to
//! the remote service, `Some(false)` and `Some(true)` are distinct wire
//! states. The marshaler never substitutes defaults for omitted fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::BridgeError;
use crate::types::{
    AudioCodecType, CodecImplementation, Direction, Role, SimulcastRid, SpotlightRid, TextureRef,
    VideoCodecType,
};

/// Where outgoing video comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturerType {
    /// A capture device owned by the engine, selected by
    /// [`ConnectConfig::video_capturer_device`].
    #[default]
    CaptureDevice,
    /// A texture the host renders into. Requires
    /// [`ConnectConfig::host_texture`].
    HostTexture,
}

/// One data channel to negotiate at connect time.
///
/// The label is the channel's key; uniqueness is the service's concern, not
/// this layer's. Every reliability knob is independently tri-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChannel {
    pub label: String,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ordered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_packet_life_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_retransmits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub compress: Option<bool>,
}

impl DataChannel {
    pub fn new(label: impl Into<String>, direction: Direction) -> Self {
        Self {
            label: label.into(),
            direction,
            ordered: None,
            max_packet_life_time: None,
            max_retransmits: None,
            protocol: None,
            compress: None,
        }
    }
}

/// Forwarding filter action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Allow,
    Block,
}

/// Field a filter rule matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    ConnectionId,
    ClientId,
    Kind,
}

/// Set membership operator of a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    IsIn,
    IsNotIn,
}

/// One rule: `field operator {values}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: FilterField,
    #[serde(rename = "operator")]
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

impl FilterRule {
    pub fn new(field: FilterField, operator: FilterOperator, values: Vec<String>) -> Self {
        Self {
            field,
            operator,
            values,
        }
    }
}

/// Media forwarding filter: `rules` is a list of groups, each group a
/// conjunction, groups disjunctive: the filter matches when any group's
/// rules all match. Group order and per-group rule order are evaluation
/// priority and round-trip the wire exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingFilter {
    pub action: FilterAction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<String>,
    pub rules: Vec<Vec<FilterRule>>,
}

impl ForwardingFilter {
    pub fn new(action: FilterAction) -> Self {
        Self {
            action,
            name: None,
            priority: None,
            version: None,
            metadata: None,
            rules: Vec::new(),
        }
    }
}

/// Encoder/decoder implementation choice for one codec type. Either side may
/// be left unset to keep the engine's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecChoice {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encoder: Option<CodecImplementation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decoder: Option<CodecImplementation>,
}

/// Per-codec-type implementation preference.
///
/// Build one preference per capability source, then fold them in ascending
/// priority order with [`CodecPreference::merge`]: per codec type, the last
/// merge that specified an encoder or decoder wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecPreference {
    choices: BTreeMap<VideoCodecType, CodecChoice>,
}

impl CodecPreference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_encoder(&mut self, codec: VideoCodecType, implementation: CodecImplementation) {
        self.choices.entry(codec).or_default().encoder = Some(implementation);
    }

    pub fn set_decoder(&mut self, codec: VideoCodecType, implementation: CodecImplementation) {
        self.choices.entry(codec).or_default().decoder = Some(implementation);
    }

    pub fn get(&self, codec: VideoCodecType) -> Option<&CodecChoice> {
        self.choices.get(&codec)
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Overlay `other` onto `self`: per codec type, `other`'s encoder and
    /// decoder replace `self`'s where `other` specifies one. Idempotent.
    pub fn merge(&mut self, other: &CodecPreference) {
        for (codec, choice) in &other.choices {
            let slot = self.choices.entry(*codec).or_default();
            if choice.encoder.is_some() {
                slot.encoder = choice.encoder;
            }
            if choice.decoder.is_some() {
                slot.decoder = choice.decoder;
            }
        }
    }

    /// Deterministic iteration order (by codec type declaration order).
    pub fn iter(&self) -> impl Iterator<Item = (&VideoCodecType, &CodecChoice)> {
        self.choices.iter()
    }
}

/// Proxy used for the signaling connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub agent: Option<String>,
}

/// Everything one connection attempt needs, submitted once through
/// [`super::Session::connect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectConfig {
    /// Primary signaling endpoint. Placed first in the candidate list when
    /// non-blank; the first endpoint to establish wins, the rest are
    /// dropped by the engine.
    pub signaling_url: String,
    /// Additional endpoint candidates, tried in order after the primary.
    pub signaling_url_candidates: Vec<String>,
    pub channel_id: String,
    pub client_id: Option<String>,
    pub bundle_id: Option<String>,
    pub metadata: Option<String>,
    pub signaling_notify_metadata: Option<String>,
    pub role: Role,

    pub multistream: Option<bool>,
    pub spotlight: Option<bool>,
    pub spotlight_number: Option<u32>,
    pub spotlight_focus_rid: Option<SpotlightRid>,
    pub spotlight_unfocus_rid: Option<SpotlightRid>,
    pub simulcast: Option<bool>,
    pub simulcast_rid: Option<SimulcastRid>,

    pub capturer_type: CapturerType,
    /// Required when `capturer_type` is [`CapturerType::HostTexture`].
    pub host_texture: Option<TextureRef>,
    pub video: bool,
    pub audio: bool,
    /// Engine capture device identifier; empty selects the engine default.
    pub video_capturer_device: String,
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: u32,
    pub video_codec_type: VideoCodecType,
    pub video_vp9_params: Option<String>,
    pub video_av1_params: Option<String>,
    pub video_h264_params: Option<String>,
    pub video_bit_rate: Option<u32>,

    pub audio_codec_type: AudioCodecType,
    pub audio_bit_rate: Option<u32>,
    pub audio_streaming_language_code: Option<String>,
    /// Engine recording device identifier; empty selects the engine default.
    pub audio_recording_device: String,
    pub audio_playout_device: String,

    pub data_channel_signaling: Option<bool>,
    pub data_channel_signaling_timeout: Option<u32>,
    pub ignore_disconnect_websocket: Option<bool>,
    pub disconnect_wait_timeout: Option<u32>,

    /// Skip certificate verification on the signaling connection.
    pub insecure: bool,
    pub proxy: Option<ProxyConfig>,
    pub data_channels: Vec<DataChannel>,
    pub forwarding_filter: Option<ForwardingFilter>,
    pub codec_preference: Option<CodecPreference>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            signaling_url: String::new(),
            signaling_url_candidates: Vec::new(),
            channel_id: String::new(),
            client_id: None,
            bundle_id: None,
            metadata: None,
            signaling_notify_metadata: None,
            role: Role::Sendonly,
            multistream: None,
            spotlight: None,
            spotlight_number: None,
            spotlight_focus_rid: None,
            spotlight_unfocus_rid: None,
            simulcast: None,
            simulcast_rid: None,
            capturer_type: CapturerType::CaptureDevice,
            host_texture: None,
            video: true,
            audio: true,
            video_capturer_device: String::new(),
            video_width: 640,
            video_height: 480,
            video_fps: 30,
            video_codec_type: VideoCodecType::default(),
            video_vp9_params: None,
            video_av1_params: None,
            video_h264_params: None,
            video_bit_rate: None,
            audio_codec_type: AudioCodecType::default(),
            audio_bit_rate: None,
            audio_streaming_language_code: None,
            audio_recording_device: String::new(),
            audio_playout_device: String::new(),
            data_channel_signaling: None,
            data_channel_signaling_timeout: None,
            ignore_disconnect_websocket: None,
            disconnect_wait_timeout: None,
            insecure: false,
            proxy: None,
            data_channels: Vec::new(),
            forwarding_filter: None,
            codec_preference: None,
        }
    }
}

impl ConnectConfig {
    /// Reject malformed configurations synchronously, before any engine
    /// call. Misuse fails here, loudly, rather than as an opaque
    /// asynchronous disconnect later.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let has_endpoint = !self.signaling_url.trim().is_empty()
            || self
                .signaling_url_candidates
                .iter()
                .any(|u| !u.trim().is_empty());
        if !has_endpoint {
            return Err(BridgeError::invalid_config(
                "no signaling url: set signaling_url or signaling_url_candidates",
            ));
        }

        if self.channel_id.is_empty() {
            return Err(BridgeError::invalid_config("channel_id must not be empty"));
        }

        if self.capturer_type == CapturerType::HostTexture && self.host_texture.is_none() {
            return Err(BridgeError::invalid_config(
                "capturer_type is host-texture but no host_texture was supplied",
            ));
        }

        if self.video && (self.video_width == 0 || self.video_height == 0 || self.video_fps == 0) {
            return Err(BridgeError::invalid_config(
                "video dimensions and fps must be non-zero when video is enabled",
            ));
        }

        for channel in &self.data_channels {
            if channel.label.is_empty() {
                return Err(BridgeError::invalid_config(
                    "data channel label must not be empty",
                ));
            }
        }

        Ok(())
    }
}

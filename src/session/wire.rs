//! Wire form of the connect configuration.
//!
//! `ConnectMessage` is the single payload handed to the engine at connect
//! time. Its field names are a private contract between this layer and the
//! engine, not a portable interface; they are public here only so engine
//! implementations (the loopback engine, FFI shims) can parse what the
//! bridge produced.
//!
//! Marshaling rules:
//! - an absent optional field is omitted from the serialized message
//!   entirely: the receiver decides its own default, and this layer never
//!   substitutes one
//! - a present field round-trips its exact value
//! - endpoint candidates keep input order, primary first, blanks dropped
//! - enums serialize as lowercase tokens; an unset enum serializes as its
//!   first-declared variant

use serde::{Deserialize, Serialize};

use super::config::{CapturerType, ConnectConfig, DataChannel, ForwardingFilter, ProxyConfig};
use crate::types::{
    AudioCodecType, CodecImplementation, Role, SimulcastRid, SpotlightRid, VideoCodecType,
};

/// One entry of the serialized codec preference list, ordered by codec type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecPreferenceEntry {
    pub codec_type: VideoCodecType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encoder: Option<CodecImplementation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decoder: Option<CodecImplementation>,
}

/// The serialized connect payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectMessage {
    pub sdk_version: String,
    pub signaling_url: Vec<String>,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bundle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signaling_notify_metadata: Option<String>,
    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub multistream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spotlight: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spotlight_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spotlight_focus_rid: Option<SpotlightRid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spotlight_unfocus_rid: Option<SpotlightRid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub simulcast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub simulcast_rid: Option<SimulcastRid>,

    pub capturer_type: CapturerType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host_texture: Option<u64>,
    pub video: bool,
    pub audio: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_capturer_device: Option<String>,
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: u32,
    pub video_codec_type: VideoCodecType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_vp9_params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_av1_params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_h264_params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_bit_rate: Option<u32>,

    pub audio_codec_type: AudioCodecType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_bit_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_streaming_language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_recording_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_playout_device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data_channel_signaling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data_channel_signaling_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ignore_disconnect_websocket: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disconnect_wait_timeout: Option<u32>,

    pub insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub data_channels: Vec<DataChannel>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub forwarding_filter: Option<ForwardingFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub video_codec_preference: Vec<CodecPreferenceEntry>,
}

/// Trimmed, ordered endpoint list: primary first when non-blank, then each
/// non-blank candidate in input order. Blank entries vanish silently.
fn endpoint_list(config: &ConnectConfig) -> Vec<String> {
    let mut urls = Vec::new();
    let primary = config.signaling_url.trim();
    if !primary.is_empty() {
        urls.push(primary.to_string());
    }
    for candidate in &config.signaling_url_candidates {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            urls.push(trimmed.to_string());
        }
    }
    urls
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ConnectMessage {
    /// Build the wire message from a validated configuration.
    pub fn from_config(config: &ConnectConfig) -> Self {
        let video_codec_preference = config
            .codec_preference
            .iter()
            .flat_map(|preference| preference.iter())
            .map(|(codec, choice)| CodecPreferenceEntry {
                codec_type: *codec,
                encoder: choice.encoder,
                decoder: choice.decoder,
            })
            .collect();

        ConnectMessage {
            sdk_version: crate::VERSION.to_string(),
            signaling_url: endpoint_list(config),
            channel_id: config.channel_id.clone(),
            client_id: config.client_id.clone(),
            bundle_id: config.bundle_id.clone(),
            metadata: config.metadata.clone(),
            signaling_notify_metadata: config.signaling_notify_metadata.clone(),
            role: config.role,
            multistream: config.multistream,
            spotlight: config.spotlight,
            spotlight_number: config.spotlight_number,
            spotlight_focus_rid: config.spotlight_focus_rid,
            spotlight_unfocus_rid: config.spotlight_unfocus_rid,
            simulcast: config.simulcast,
            simulcast_rid: config.simulcast_rid,
            capturer_type: config.capturer_type,
            host_texture: config.host_texture.map(|texture| texture.0),
            video: config.video,
            audio: config.audio,
            video_capturer_device: non_empty(&config.video_capturer_device),
            video_width: config.video_width,
            video_height: config.video_height,
            video_fps: config.video_fps,
            video_codec_type: config.video_codec_type,
            video_vp9_params: config.video_vp9_params.clone(),
            video_av1_params: config.video_av1_params.clone(),
            video_h264_params: config.video_h264_params.clone(),
            video_bit_rate: config.video_bit_rate,
            audio_codec_type: config.audio_codec_type,
            audio_bit_rate: config.audio_bit_rate,
            audio_streaming_language_code: config.audio_streaming_language_code.clone(),
            audio_recording_device: non_empty(&config.audio_recording_device),
            audio_playout_device: non_empty(&config.audio_playout_device),
            data_channel_signaling: config.data_channel_signaling,
            data_channel_signaling_timeout: config.data_channel_signaling_timeout,
            ignore_disconnect_websocket: config.ignore_disconnect_websocket,
            disconnect_wait_timeout: config.disconnect_wait_timeout,
            insecure: config.insecure,
            proxy: config.proxy.clone(),
            data_channels: config.data_channels.clone(),
            forwarding_filter: config.forwarding_filter.clone(),
            video_codec_preference,
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of plain fields cannot fail to serialize.
        serde_json::to_string(self).expect("connect message serialization")
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::{
        DataChannel, FilterAction, FilterField, FilterOperator, FilterRule,
    };
    use crate::types::Direction;

    fn base_config() -> ConnectConfig {
        ConnectConfig {
            signaling_url: "wss://sfu.example.com/signaling".to_string(),
            channel_id: "lobby".to_string(),
            ..ConnectConfig::default()
        }
    }

    #[test]
    fn test_endpoint_list_primary_first_blanks_dropped() {
        let config = ConnectConfig {
            signaling_url: "wss://example/x".to_string(),
            signaling_url_candidates: vec![String::new(), " wss://example/y ".to_string()],
            channel_id: "lobby".to_string(),
            ..ConnectConfig::default()
        };
        let message = ConnectMessage::from_config(&config);
        assert_eq!(
            message.signaling_url,
            vec!["wss://example/x".to_string(), "wss://example/y".to_string()]
        );
    }

    #[test]
    fn test_unset_simulcast_emits_no_simulcast_fields() {
        let message = ConnectMessage::from_config(&base_config());
        let json: serde_json::Value = message.to_json().parse().unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("simulcast"));
        assert!(!object.contains_key("simulcast_rid"));
    }

    #[test]
    fn test_explicit_false_is_distinct_from_absent() {
        let mut config = base_config();
        config.multistream = Some(false);
        let json: serde_json::Value =
            ConnectMessage::from_config(&config).to_json().parse().unwrap();
        assert_eq!(json["multistream"], serde_json::Value::Bool(false));

        config.multistream = None;
        let json: serde_json::Value =
            ConnectMessage::from_config(&config).to_json().parse().unwrap();
        assert!(json.get("multistream").is_none());
    }

    #[test]
    fn test_data_channel_only_retransmits_present() {
        let mut channel = DataChannel::new("control", Direction::Sendrecv);
        channel.max_retransmits = Some(3);
        let mut config = base_config();
        config.data_channels.push(channel);

        let json: serde_json::Value =
            ConnectMessage::from_config(&config).to_json().parse().unwrap();
        let descriptor = &json["data_channels"][0];
        let object = descriptor.as_object().unwrap();
        assert_eq!(descriptor["max_retransmits"], 3);
        assert!(!object.contains_key("ordered"));
        assert!(!object.contains_key("max_packet_life_time"));
        assert!(!object.contains_key("protocol"));
        assert!(!object.contains_key("compress"));
    }

    #[test]
    fn test_forwarding_filter_preserves_group_and_rule_order() {
        let mut filter = ForwardingFilter::new(FilterAction::Block);
        filter.rules.push(vec![FilterRule::new(
            FilterField::ConnectionId,
            FilterOperator::IsIn,
            vec!["c1".to_string()],
        )]);
        filter.rules.push(vec![FilterRule::new(
            FilterField::Kind,
            FilterOperator::IsNotIn,
            vec!["audio".to_string()],
        )]);
        let mut config = base_config();
        config.forwarding_filter = Some(filter.clone());

        let json = ConnectMessage::from_config(&config).to_json();
        let parsed = ConnectMessage::from_json(&json).unwrap();
        assert_eq!(parsed.forwarding_filter, Some(filter));

        let value: serde_json::Value = json.parse().unwrap();
        assert_eq!(value["forwarding_filter"]["action"], "block");
        assert_eq!(
            value["forwarding_filter"]["rules"][0][0]["field"],
            "connection_id"
        );
        assert_eq!(
            value["forwarding_filter"]["rules"][1][0]["operator"],
            "is_not_in"
        );
    }

    #[test]
    fn test_empty_device_strings_are_omitted() {
        let json: serde_json::Value = ConnectMessage::from_config(&base_config())
            .to_json()
            .parse()
            .unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("video_capturer_device"));
        assert!(!object.contains_key("audio_recording_device"));
        assert!(!object.contains_key("audio_playout_device"));
    }

    #[test]
    fn test_default_codec_serializes_to_first_declared() {
        let json: serde_json::Value = ConnectMessage::from_config(&base_config())
            .to_json()
            .parse()
            .unwrap();
        assert_eq!(json["video_codec_type"], "vp9");
        assert_eq!(json["audio_codec_type"], "opus");
        assert_eq!(json["capturer_type"], "capture_device");
    }

    #[test]
    fn test_roundtrip_preserves_present_values() {
        let mut config = base_config();
        config.simulcast = Some(true);
        config.simulcast_rid = Some(crate::types::SimulcastRid::R2);
        config.video_bit_rate = Some(2500);
        config.metadata = Some("{\"token\":\"abc\"}".to_string());

        let message = ConnectMessage::from_config(&config);
        let parsed = ConnectMessage::from_json(&message.to_json()).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.simulcast, Some(true));
        assert_eq!(parsed.video_bit_rate, Some(2500));
    }
}

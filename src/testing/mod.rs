//! Testing utilities for mediabridge.
//!
//! Provides the in-process loopback engine and synthetic media data so the
//! full bridge contract can be exercised offline, without a native engine.

pub mod loopback;
pub mod synthetic_data;

pub use loopback::{LoopbackBehavior, LoopbackEngine};
pub use synthetic_data::{synthetic_audio_samples, synthetic_video_frame};

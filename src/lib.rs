//! MediaBridge: frame-driven host bindings for native SFU media engines
//!
//! This crate adapts an opaque, internally threaded media engine to a
//! synchronous host frame loop: build a [`session::ConnectConfig`], create a
//! [`session::Session`], connect, and pump [`session::Session::dispatch_events`]
//! once per frame. All signaling, transport and codec work happens inside
//! the engine behind the [`engine::MediaEngine`] boundary.
//!
//! # Features
//! - One owned engine handle per session, destroyed exactly once
//! - Lossless tri-state configuration marshaling (unset vs explicitly set)
//! - Pumped event dispatch on the host thread, direct callbacks for
//!   audio/capture paths
//! - Exactly-once terminal disconnect delivery
//! - In-process loopback engine for offline testing
//!
//! # Usage
//! ```rust
//! use mediabridge::session::{ConnectConfig, Session};
//! use mediabridge::testing::LoopbackEngine;
//!
//! let engine = LoopbackEngine::new();
//! let session = Session::create(&engine);
//! session.set_on_disconnect(|code, message| {
//!     println!("disconnected: {:?} ({})", code, message);
//! });
//!
//! let config = ConnectConfig {
//!     signaling_url: "wss://sfu.example.com/signaling".to_string(),
//!     channel_id: "lobby".to_string(),
//!     ..ConnectConfig::default()
//! };
//! session.connect(&config).unwrap();
//!
//! // ... once per host frame:
//! session.dispatch_events();
//! session.on_render();
//! ```
pub mod config;
pub mod devices;
pub mod engine;
pub mod errors;
pub mod session;
pub mod types;

// Testing utilities - loopback engine and synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::BridgeSettings;
pub use engine::{EngineSession, MediaEngine};
pub use errors::BridgeError;
pub use session::{ConnectConfig, EventBridge, Session, SessionEvent, SessionState};
pub use types::{DeviceInfo, ErrorCode, VideoFrame, VideoTexture};

/// Initialize logging for the bridge
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "mediabridge=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

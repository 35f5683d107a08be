//! Session lifecycle management.
//!
//! One [`Session`] owns one engine session handle for its whole life:
//! created exactly once, destroyed exactly once, with every callback
//! registration released no earlier than the point where the engine can no
//! longer invoke it.
//!
//! Lifecycle: `Created → Connecting → {Connected → Disconnecting} →
//! Disconnected → Disposed`. `Disconnected` is reachable straight from
//! `Connecting` when a connection attempt is rejected. Whatever the cause
//! (an explicit [`Session::disconnect`], a network failure, a rejected
//! connect), the host observes exactly one disconnect event, and that event
//! is the only termination signal it needs: the engine is the sole
//! timekeeper, so no host-side connect timeout is required.

pub mod config;
pub mod events;
pub mod wire;

pub use config::{
    CapturerType, CodecChoice, CodecPreference, ConnectConfig, DataChannel, FilterAction,
    FilterField, FilterOperator, FilterRule, ForwardingFilter, ProxyConfig,
};
pub use events::{EventBridge, EventKind, SessionEvent};
pub use wire::ConnectMessage;

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::engine::{EngineSession, MediaEngine};
use crate::errors::BridgeError;
use crate::types::{ErrorCode, VideoFrame, VideoTexture};

/// Monotonically advancing lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Disposed,
}

/// One adapter instance bound to one engine session handle.
pub struct Session {
    bridge: Arc<EventBridge>,
    engine_session: Mutex<Option<Box<dyn EngineSession>>>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Allocate the engine session handle.
    ///
    /// # Panics
    /// Panics when the engine cannot allocate a session. There is no
    /// recoverable path at this layer: a host whose engine cannot allocate
    /// is terminally misconfigured.
    pub fn create<E: MediaEngine + ?Sized>(engine: &E) -> Self {
        let bridge = Arc::new(EventBridge::new());
        let engine_session = match engine.create_session(bridge.clone()) {
            Some(session) => session,
            None => panic!("engine session allocation failed"),
        };
        log::debug!("session created");
        Session {
            bridge,
            engine_session: Mutex::new(Some(engine_session)),
            state: Mutex::new(SessionState::Created),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("lock poisoned")
    }

    /// Validate, marshal and submit the configuration. Non-blocking: every
    /// outcome, success or failure, arrives later as the single disconnect
    /// event (possibly preceded by success events).
    ///
    /// Calling this a second time on a session that is already connecting or
    /// connected is not guarded; the engine's behavior decides what happens.
    pub fn connect(&self, config: &ConnectConfig) -> Result<(), BridgeError> {
        config.validate()?;

        {
            let state = self.state.lock().expect("lock poisoned");
            match *state {
                SessionState::Disposed => {
                    return Err(BridgeError::invalid_state("session is disposed"))
                }
                SessionState::Created => {}
                other => log::warn!("connect called in state {:?}", other),
            }
        }

        let message = ConnectMessage::from_config(config).to_json();
        log::info!("connecting to channel {:?} as {}", config.channel_id, config.role.as_str());
        self.with_engine(|engine| engine.connect(message))?;
        *self.state.lock().expect("lock poisoned") = SessionState::Connecting;
        Ok(())
    }

    /// Request asynchronous teardown. Idempotent: repeated calls are no-ops
    /// and the disconnect event is never redelivered.
    pub fn disconnect(&self) {
        let request = {
            let mut state = self.state.lock().expect("lock poisoned");
            match *state {
                SessionState::Connecting | SessionState::Connected => {
                    *state = SessionState::Disconnecting;
                    true
                }
                SessionState::Disconnecting | SessionState::Disconnected => {
                    log::debug!("disconnect already requested; ignoring");
                    false
                }
                SessionState::Created => {
                    log::debug!("disconnect before connect; ignoring");
                    false
                }
                SessionState::Disposed => {
                    log::warn!("disconnect on disposed session; ignoring");
                    false
                }
            }
        };
        if request {
            if let Ok(()) = self.with_engine(|engine| engine.disconnect()) {
                log::info!("disconnect requested");
            }
        }
    }

    /// Drain buffered events and run their handlers on the calling thread,
    /// in enqueue order. Call once per host frame. Returns the number of
    /// events dispatched.
    pub fn dispatch_events(&self) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.bridge.poll() {
            self.note_event(&event);
            self.bridge.dispatch(event);
            dispatched += 1;
        }
        dispatched
    }

    /// Destroy the engine handle and release every callback registration.
    ///
    /// Contract: call only after the disconnect event has been observed.
    /// Calling earlier means engine callbacks may still be in flight; this
    /// layer cannot enforce that and logs instead. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            match *state {
                SessionState::Disposed => return,
                SessionState::Disconnected | SessionState::Created => {}
                other => log::warn!(
                    "dispose in state {:?}: the disconnect event has not been observed yet",
                    other
                ),
            }
            *state = SessionState::Disposed;
        }

        // Destroy the engine handle first; only then release the handler
        // registrations it could still have invoked.
        self.engine_session.lock().expect("lock poisoned").take();
        self.bridge.clear_handlers();
        log::debug!("session disposed");
    }

    // --- event handler registration --------------------------------------
    //
    // At most one handler per event kind; installing replaces and drops the
    // previous registration. Register before connect to avoid dropped
    // events.

    pub fn set_on_add_track(&self, handler: impl FnMut(u32, &str) + Send + 'static) {
        self.bridge.set_on_add_track(Box::new(handler));
    }

    pub fn set_on_remove_track(&self, handler: impl FnMut(u32, &str) + Send + 'static) {
        self.bridge.set_on_remove_track(Box::new(handler));
    }

    pub fn set_on_set_offer(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.bridge.set_on_set_offer(Box::new(handler));
    }

    pub fn set_on_notify(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.bridge.set_on_notify(Box::new(handler));
    }

    pub fn set_on_push(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.bridge.set_on_push(Box::new(handler));
    }

    pub fn set_on_message(&self, handler: impl FnMut(&str, &[u8]) + Send + 'static) {
        self.bridge.set_on_message(Box::new(handler));
    }

    pub fn set_on_data_channel(&self, handler: impl FnMut(&str) + Send + 'static) {
        self.bridge.set_on_data_channel(Box::new(handler));
    }

    pub fn set_on_disconnect(&self, handler: impl FnMut(ErrorCode, &str) + Send + 'static) {
        self.bridge.set_on_disconnect(Box::new(handler));
    }

    /// Direct event: invoked from engine threads, concurrently with host
    /// frame logic. Synchronize shared state yourself.
    pub fn set_on_handle_audio(&self, handler: impl Fn(&[i16], usize, usize) + Send + Sync + 'static) {
        self.bridge.set_on_handle_audio(Arc::new(handler));
    }

    /// Direct event: invoked from engine threads, concurrently with host
    /// frame logic. Synchronize shared state yourself.
    pub fn set_on_capturer_frame(&self, handler: impl Fn(&VideoFrame) + Send + Sync + 'static) {
        self.bridge.set_on_capturer_frame(Arc::new(handler));
    }

    // --- frame-loop operations -------------------------------------------

    /// Per-frame hook: call after the host finishes rendering a frame.
    pub fn on_render(&self) {
        if self.with_engine(|engine| engine.on_render()).is_err() {
            log::debug!("on_render on disposed session; ignoring");
        }
    }

    /// Copy the latest frame of a received track into a host-owned texture.
    /// Returns false when the track is unknown, frameless, or the session is
    /// disposed.
    pub fn render_track_to_texture(&self, track_id: u32, texture: &mut VideoTexture) -> bool {
        self.with_engine(|engine| engine.copy_track_frame(track_id, texture))
            .unwrap_or(false)
    }

    /// Push externally captured audio to the engine. Samples are interleaved
    /// f32 at the fixed sample-rate/channel contract.
    pub fn process_audio(&self, samples: &[f32]) {
        if self.with_engine(|engine| engine.process_audio(samples)).is_err() {
            log::debug!("process_audio on disposed session; ignoring");
        }
    }

    /// Send a payload over an established data channel.
    pub fn send_message(&self, label: &str, data: impl Into<Bytes>) -> Result<(), BridgeError> {
        let data = data.into();
        self.with_engine(|engine| {
            log::debug!("sending {} bytes on channel {:?}", data.len(), label);
            engine.send_message(label, data.clone())
        })
    }

    /// Request a statistics report. The callback is single-use: invoked at
    /// most once, on the pumping thread, and released immediately after.
    pub fn get_stats(&self, handler: impl FnOnce(&str) + Send + 'static) -> Result<(), BridgeError> {
        let guard = self.engine_session.lock().expect("lock poisoned");
        let engine = guard
            .as_ref()
            .ok_or_else(|| BridgeError::invalid_state("session is disposed"))?;
        let token = self.bridge.register_stats(Box::new(handler));
        engine.request_stats(token);
        Ok(())
    }

    pub fn audio_enabled(&self) -> bool {
        self.with_engine(|engine| engine.audio_enabled()).unwrap_or(false)
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        let _ = self.with_engine(|engine| engine.set_audio_enabled(enabled));
    }

    pub fn video_enabled(&self) -> bool {
        self.with_engine(|engine| engine.video_enabled()).unwrap_or(false)
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        let _ = self.with_engine(|engine| engine.set_video_enabled(enabled));
    }

    // ---------------------------------------------------------------------

    fn note_event(&self, event: &SessionEvent) {
        let mut state = self.state.lock().expect("lock poisoned");
        match event {
            SessionEvent::Disconnect { error_code, message } => {
                log::info!("session disconnected: {:?} ({})", error_code, message);
                *state = SessionState::Disconnected;
            }
            _ => {
                // Success events precede the terminal disconnect; the first
                // one marks the connection established.
                if *state == SessionState::Connecting {
                    log::info!("session connected");
                    *state = SessionState::Connected;
                }
            }
        }
    }

    fn with_engine<R>(
        &self,
        operation: impl FnOnce(&dyn EngineSession) -> R,
    ) -> Result<R, BridgeError> {
        let guard = self.engine_session.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(engine) => Ok(operation(engine.as_ref())),
            None => Err(BridgeError::invalid_state("session is disposed")),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let state = *self.state.lock().expect("lock poisoned");
        if state != SessionState::Disposed {
            if state != SessionState::Disconnected && state != SessionState::Created {
                log::warn!("session dropped while {:?}; disposing anyway", state);
            }
            self.dispose();
        }
    }
}

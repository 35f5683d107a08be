//! Event dispatch bridge.
//!
//! Engine threads produce events; the host consumes them. Two delivery modes
//! coexist:
//!
//! - *pumped* events are buffered in a channel and delivered, in enqueue
//!   order, only when the host drains the bridge from its frame loop
//!   (`Session::dispatch_events`), so their handlers always run on the
//!   host's own thread;
//! - *direct* events (handle-audio, capturer-frame) are invoked immediately
//!   on whichever engine thread produced them. Handlers for these must be
//!   `Sync`, and the host owns any synchronization of shared state.
//!
//! Each event kind has at most one handler. Installing a handler drops the
//! previous registration for that kind before the new one is in place, so a
//! replaced closure releases whatever it captured. The terminal disconnect
//! event is latched: no matter how many times the engine reports it, the
//! host observes it exactly once per connect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::types::{ErrorCode, VideoFrame};

/// A pumped event as produced by the engine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    AddTrack { track_id: u32, connection_id: String },
    RemoveTrack { track_id: u32, connection_id: String },
    SetOffer { offer: String },
    Notify { message: String },
    Push { message: String },
    Message { label: String, data: Bytes },
    DataChannelOpen { label: String },
    Disconnect { error_code: ErrorCode, message: String },
    StatsResult { token: u64, report: String },
}

/// Event kinds, covering pumped and direct delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AddTrack,
    RemoveTrack,
    SetOffer,
    Notify,
    Push,
    Message,
    DataChannelOpen,
    Disconnect,
    StatsResult,
    HandleAudio,
    CapturerFrame,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::AddTrack { .. } => EventKind::AddTrack,
            SessionEvent::RemoveTrack { .. } => EventKind::RemoveTrack,
            SessionEvent::SetOffer { .. } => EventKind::SetOffer,
            SessionEvent::Notify { .. } => EventKind::Notify,
            SessionEvent::Push { .. } => EventKind::Push,
            SessionEvent::Message { .. } => EventKind::Message,
            SessionEvent::DataChannelOpen { .. } => EventKind::DataChannelOpen,
            SessionEvent::Disconnect { .. } => EventKind::Disconnect,
            SessionEvent::StatsResult { .. } => EventKind::StatsResult,
        }
    }
}

pub type TrackHandler = Box<dyn FnMut(u32, &str) + Send>;
pub type TextHandler = Box<dyn FnMut(&str) + Send>;
pub type MessageHandler = Box<dyn FnMut(&str, &[u8]) + Send>;
pub type DisconnectHandler = Box<dyn FnMut(ErrorCode, &str) + Send>;
pub type StatsHandler = Box<dyn FnOnce(&str) + Send>;
pub type AudioHandler = Arc<dyn Fn(&[i16], usize, usize) + Send + Sync>;
pub type FrameHandler = Arc<dyn Fn(&VideoFrame) + Send + Sync>;

/// One registration slot. Installing drops the previous occupant.
///
/// Pumped dispatch takes the handler out, invokes it unlocked, and restores
/// it afterwards. A handler may therefore re-register its own kind without
/// deadlocking; in that case the new registration wins and the in-flight
/// closure is dropped on restore.
struct Slot<T> {
    inner: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    fn install(&self, handler: T) {
        let mut guard = self.inner.lock().expect("lock poisoned");
        *guard = Some(handler);
    }

    fn take(&self) -> Option<T> {
        self.inner.lock().expect("lock poisoned").take()
    }

    fn restore(&self, handler: T) {
        let mut guard = self.inner.lock().expect("lock poisoned");
        if guard.is_none() {
            *guard = Some(handler);
        }
    }

    fn clear(&self) {
        self.inner.lock().expect("lock poisoned").take();
    }
}

impl<T: Clone> Slot<T> {
    fn get(&self) -> Option<T> {
        self.inner.lock().expect("lock poisoned").clone()
    }
}

struct Handlers {
    add_track: Slot<TrackHandler>,
    remove_track: Slot<TrackHandler>,
    set_offer: Slot<TextHandler>,
    notify: Slot<TextHandler>,
    push: Slot<TextHandler>,
    message: Slot<MessageHandler>,
    data_channel_open: Slot<TextHandler>,
    disconnect: Slot<DisconnectHandler>,
    handle_audio: Slot<AudioHandler>,
    capturer_frame: Slot<FrameHandler>,
}

impl Handlers {
    fn new() -> Self {
        Self {
            add_track: Slot::new(),
            remove_track: Slot::new(),
            set_offer: Slot::new(),
            notify: Slot::new(),
            push: Slot::new(),
            message: Slot::new(),
            data_channel_open: Slot::new(),
            disconnect: Slot::new(),
            handle_audio: Slot::new(),
            capturer_frame: Slot::new(),
        }
    }
}

/// The producer/consumer bridge between engine threads and the host frame
/// loop. Engines hold an `Arc<EventBridge>` and call the `deliver*`
/// producers; the owning [`super::Session`] drains and dispatches.
pub struct EventBridge {
    queue_tx: Sender<SessionEvent>,
    queue_rx: Receiver<SessionEvent>,
    handlers: Handlers,
    disconnect_delivered: AtomicBool,
    stats: Mutex<HashMap<u64, StatsHandler>>,
    next_stats_token: AtomicU64,
}

impl EventBridge {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            queue_tx,
            queue_rx,
            handlers: Handlers::new(),
            disconnect_delivered: AtomicBool::new(false),
            stats: Mutex::new(HashMap::new()),
            next_stats_token: AtomicU64::new(1),
        }
    }

    // --- engine-facing producers -----------------------------------------

    /// Enqueue a pumped event. Delivered on the next pump, in enqueue order.
    pub fn deliver(&self, event: SessionEvent) {
        log::trace!("event enqueued: {:?}", event.kind());
        let _ = self.queue_tx.send(event);
    }

    /// Direct delivery of rendered audio, invoked on the producing engine
    /// thread. `samples` is interleaved, `frames * channels` long.
    pub fn deliver_audio(&self, samples: &[i16], frames: usize, channels: usize) {
        if let Some(handler) = self.handlers.handle_audio.get() {
            handler(samples, frames, channels);
        }
    }

    /// Direct delivery of a locally captured frame, invoked on the
    /// producing engine thread.
    pub fn deliver_capturer_frame(&self, frame: &VideoFrame) {
        if let Some(handler) = self.handlers.capturer_frame.get() {
            handler(frame);
        }
    }

    // --- host-facing registration (via Session) --------------------------

    pub(crate) fn set_on_add_track(&self, handler: TrackHandler) {
        self.handlers.add_track.install(handler);
    }

    pub(crate) fn set_on_remove_track(&self, handler: TrackHandler) {
        self.handlers.remove_track.install(handler);
    }

    pub(crate) fn set_on_set_offer(&self, handler: TextHandler) {
        self.handlers.set_offer.install(handler);
    }

    pub(crate) fn set_on_notify(&self, handler: TextHandler) {
        self.handlers.notify.install(handler);
    }

    pub(crate) fn set_on_push(&self, handler: TextHandler) {
        self.handlers.push.install(handler);
    }

    pub(crate) fn set_on_message(&self, handler: MessageHandler) {
        self.handlers.message.install(handler);
    }

    pub(crate) fn set_on_data_channel(&self, handler: TextHandler) {
        self.handlers.data_channel_open.install(handler);
    }

    pub(crate) fn set_on_disconnect(&self, handler: DisconnectHandler) {
        self.handlers.disconnect.install(handler);
    }

    pub(crate) fn set_on_handle_audio(&self, handler: AudioHandler) {
        self.handlers.handle_audio.install(handler);
    }

    pub(crate) fn set_on_capturer_frame(&self, handler: FrameHandler) {
        self.handlers.capturer_frame.install(handler);
    }

    /// Register a single-use stats callback and mint its token. The slot is
    /// removed and released the moment the matching stats-result event is
    /// dispatched; it never touches the long-lived registry.
    pub(crate) fn register_stats(&self, handler: StatsHandler) -> u64 {
        let token = self.next_stats_token.fetch_add(1, Ordering::Relaxed);
        self.stats
            .lock()
            .expect("lock poisoned")
            .insert(token, handler);
        token
    }

    // --- pump ------------------------------------------------------------

    /// Pop the next pumped event, filtering duplicate terminal disconnects.
    /// Returns `None` when the buffer is drained.
    pub(crate) fn poll(&self) -> Option<SessionEvent> {
        while let Ok(event) = self.queue_rx.try_recv() {
            if matches!(event, SessionEvent::Disconnect { .. })
                && self.disconnect_delivered.swap(true, Ordering::SeqCst)
            {
                log::debug!("dropping duplicate disconnect event");
                continue;
            }
            return Some(event);
        }
        None
    }

    /// Invoke the handler registered for this event's kind, if any. Events
    /// with no registered handler are dropped silently; registering first
    /// is the host's side of the contract.
    pub(crate) fn dispatch(&self, event: SessionEvent) {
        match event {
            SessionEvent::AddTrack {
                track_id,
                connection_id,
            } => Self::call_track(&self.handlers.add_track, track_id, &connection_id),
            SessionEvent::RemoveTrack {
                track_id,
                connection_id,
            } => Self::call_track(&self.handlers.remove_track, track_id, &connection_id),
            SessionEvent::SetOffer { offer } => Self::call_text(&self.handlers.set_offer, &offer),
            SessionEvent::Notify { message } => Self::call_text(&self.handlers.notify, &message),
            SessionEvent::Push { message } => Self::call_text(&self.handlers.push, &message),
            SessionEvent::Message { label, data } => {
                if let Some(mut handler) = self.handlers.message.take() {
                    handler(&label, &data);
                    self.handlers.message.restore(handler);
                }
            }
            SessionEvent::DataChannelOpen { label } => {
                Self::call_text(&self.handlers.data_channel_open, &label)
            }
            SessionEvent::Disconnect {
                error_code,
                message,
            } => {
                // Terminal: the latch guarantees this runs at most once, so
                // the handler is released right after delivery instead of
                // being restored.
                if let Some(mut handler) = self.handlers.disconnect.take() {
                    handler(error_code, &message);
                }
            }
            SessionEvent::StatsResult { token, report } => {
                let handler = self.stats.lock().expect("lock poisoned").remove(&token);
                match handler {
                    Some(handler) => handler(&report),
                    None => log::warn!("stats result for unknown token {}", token),
                }
            }
        }
    }

    /// Whether the terminal disconnect event has been observed by the host.
    pub(crate) fn disconnect_delivered(&self) -> bool {
        self.disconnect_delivered.load(Ordering::SeqCst)
    }

    /// Drop every registration, long-lived and one-shot. Called during
    /// dispose, after the engine handle is gone.
    pub(crate) fn clear_handlers(&self) {
        self.handlers.add_track.clear();
        self.handlers.remove_track.clear();
        self.handlers.set_offer.clear();
        self.handlers.notify.clear();
        self.handlers.push.clear();
        self.handlers.message.clear();
        self.handlers.data_channel_open.clear();
        self.handlers.disconnect.clear();
        self.handlers.handle_audio.clear();
        self.handlers.capturer_frame.clear();
        self.stats.lock().expect("lock poisoned").clear();
    }

    fn call_track(slot: &Slot<TrackHandler>, track_id: u32, connection_id: &str) {
        if let Some(mut handler) = slot.take() {
            handler(track_id, connection_id);
            slot.restore(handler);
        }
    }

    fn call_text(slot: &Slot<TextHandler>, text: &str) {
        if let Some(mut handler) = slot.take() {
            handler(text);
            slot.restore(handler);
        }
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_replacing_handler_drops_previous() {
        let bridge = EventBridge::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let probe = DropProbe(drops.clone());
        bridge.set_on_notify(Box::new(move |_| {
            let _ = &probe;
        }));
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        bridge.set_on_notify(Box::new(|_| {}));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pumped_events_in_order() {
        let bridge = EventBridge::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bridge.set_on_notify(Box::new(move |message| {
            sink.lock().unwrap().push(message.to_string());
        }));

        for i in 0..4 {
            bridge.deliver(SessionEvent::Notify {
                message: format!("n{}", i),
            });
        }
        while let Some(event) = bridge.poll() {
            bridge.dispatch(event);
        }

        assert_eq!(*seen.lock().unwrap(), vec!["n0", "n1", "n2", "n3"]);
    }

    #[test]
    fn test_disconnect_latched_once() {
        let bridge = EventBridge::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        bridge.set_on_disconnect(Box::new(move |_, _| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..3 {
            bridge.deliver(SessionEvent::Disconnect {
                error_code: ErrorCode::CloseSucceeded,
                message: "bye".to_string(),
            });
        }
        while let Some(event) = bridge.poll() {
            bridge.dispatch(event);
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bridge.disconnect_delivered());
    }

    #[test]
    fn test_stats_slot_is_single_use() {
        let bridge = EventBridge::new();
        let drops = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let probe = DropProbe(drops.clone());
        let sink = calls.clone();
        let token = bridge.register_stats(Box::new(move |_| {
            let _ = &probe;
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.dispatch(SessionEvent::StatsResult {
            token,
            report: "[]".to_string(),
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // A second result for the same token finds no slot.
        bridge.dispatch(SessionEvent::StatsResult {
            token,
            report: "[]".to_string(),
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unhandled_events_are_dropped_silently() {
        let bridge = EventBridge::new();
        bridge.deliver(SessionEvent::Push {
            message: "{}".to_string(),
        });
        while let Some(event) = bridge.poll() {
            bridge.dispatch(event);
        }
    }

    #[test]
    fn test_direct_audio_uses_current_handler() {
        let bridge = EventBridge::new();
        let total = Arc::new(AtomicUsize::new(0));
        let sink = total.clone();
        bridge.set_on_handle_audio(Arc::new(move |samples, _, _| {
            sink.fetch_add(samples.len(), Ordering::SeqCst);
        }));

        bridge.deliver_audio(&[0i16; 480], 240, 2);
        assert_eq!(total.load(Ordering::SeqCst), 480);

        bridge.clear_handlers();
        bridge.deliver_audio(&[0i16; 480], 240, 2);
        assert_eq!(total.load(Ordering::SeqCst), 480);
    }
}

//! Delivery of session events to the host listener.
//!
//! Events may be published from any thread. They are queued in publish
//! order and handed to the listener on a single delivery thread, so the
//! listener never runs concurrently with itself and never runs on the
//! thread that published the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use livecast_ipc::{SessionEvent, WireEvent};

/// Callback receiving encoded events on the delivery thread.
pub type EventListener = Box<dyn FnMut(WireEvent) + Send + 'static>;

enum BridgeMessage {
    Publish(SessionEvent),
    Subscribe(EventListener),
    Unsubscribe,
    Shutdown,
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Events accepted by [`EventBridge::publish`].
    pub published: u64,

    /// Events handed to a listener.
    pub delivered: u64,

    /// Events discarded because no listener was registered.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Forwards session events to at most one listener.
pub struct EventBridge {
    tx: Sender<BridgeMessage>,
    counters: Arc<Counters>,
    delivery_thread: Mutex<Option<JoinHandle<()>>>,
    delivery_thread_id: Option<ThreadId>,
}

impl EventBridge {
    /// Start a bridge with its delivery thread.
    pub fn new(thread_name: &str) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(Counters::default());

        let loop_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || delivery_loop(rx, loop_counters));

        let (delivery_thread, delivery_thread_id) = match handle {
            Ok(handle) => {
                let id = handle.thread().id();
                (Some(handle), Some(id))
            }
            Err(e) => {
                warn!("Failed to spawn event delivery thread: {}", e);
                (None, None)
            }
        };

        Self {
            tx,
            counters,
            delivery_thread: Mutex::new(delivery_thread),
            delivery_thread_id,
        }
    }

    /// Register the listener, replacing any previous one.
    pub fn subscribe(&self, listener: impl FnMut(WireEvent) + Send + 'static) {
        self.send(BridgeMessage::Subscribe(Box::new(listener)));
    }

    /// Remove the listener. Later events are dropped until a new one
    /// subscribes.
    pub fn unsubscribe(&self) {
        self.send(BridgeMessage::Unsubscribe);
    }

    /// Queue an event for delivery. Never blocks.
    pub fn publish(&self, event: SessionEvent) {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.send(BridgeMessage::Publish(event));
    }

    /// Current delivery counters.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    fn send(&self, message: BridgeMessage) {
        if self.tx.send(message).is_err() {
            warn!("Event delivery thread is gone, message dropped");
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        let _ = self.tx.send(BridgeMessage::Shutdown);

        // A listener that drops the last session handle ends up here on the
        // delivery thread itself; joining would deadlock.
        if self.delivery_thread_id == Some(thread::current().id()) {
            return;
        }

        if let Some(handle) = self.delivery_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

fn delivery_loop(rx: Receiver<BridgeMessage>, counters: Arc<Counters>) {
    debug!("Event delivery loop starting");
    let mut listener: Option<EventListener> = None;

    for message in rx.iter() {
        match message {
            BridgeMessage::Publish(event) => match listener.as_mut() {
                Some(listener) => {
                    listener(event.to_wire());
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    debug!(kind = event.kind(), "No listener, dropping event");
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            BridgeMessage::Subscribe(new_listener) => {
                if listener.replace(new_listener).is_some() {
                    info!("Event listener replaced");
                } else {
                    info!("Event listener registered");
                }
            }
            BridgeMessage::Unsubscribe => {
                if listener.take().is_some() {
                    info!("Event listener removed");
                }
            }
            BridgeMessage::Shutdown => break,
        }
    }

    debug!("Event delivery loop stopped");
}

/// Listener forwarding events into a channel.
///
/// Full or closed channels lose the event with a warning rather than stall
/// delivery.
pub fn channel_listener(tx: Sender<WireEvent>) -> impl FnMut(WireEvent) + Send + 'static {
    move |event| match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("Event channel full, event dropped"),
        Err(TrySendError::Disconnected(_)) => debug!("Event channel closed, event dropped"),
    }
}

//! Host method-call surface for the live broadcast client.
//!
//! The host application talks to the broadcaster through named method calls
//! with JSON arguments and listens for flat key/value events. This crate
//! owns the current [`BroadcastSession`], replaces it once it has ended,
//! and keeps the host's event listener attached across sessions.

mod commands;
mod config;

pub use commands::{CommandError, CommandResult, INVALID_ARGUMENTS, NOT_IMPLEMENTED};
pub use config::HostConfig;

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use livecast_devices::DeviceDiscovery;
use livecast_engine::{channel_listener, BroadcastSession, MediaEngine, SessionOptions};
use livecast_ipc::{SessionState, WireEvent};

/// Capacity of the channel returned by [`BroadcasterHost::listen`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

const DEFAULT_LOG_FILTER: &str =
    "livecast_host=info,livecast_engine=info,livecast_devices=info,livecast_encoder=info";

/// Initialize logging.
///
/// Uses `filter` when given, then `RUST_LOG`, then a default. Does nothing
/// if a global subscriber is already installed.
pub fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<WireEvent>, Receiver<WireEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}

/// Broadcaster state shared with the host's method-call handler.
pub struct BroadcasterHost {
    media: Arc<dyn MediaEngine>,
    discovery: Arc<dyn DeviceDiscovery>,
    options: SessionOptions,
    session: Mutex<BroadcastSession>,
    event_tx: Mutex<Option<Sender<WireEvent>>>,
}

impl BroadcasterHost {
    pub fn new(
        media: Arc<dyn MediaEngine>,
        discovery: Arc<dyn DeviceDiscovery>,
        config: &HostConfig,
    ) -> Self {
        let options = config.session.clone();
        let session = BroadcastSession::new(Arc::clone(&media), Arc::clone(&discovery), options.clone());

        info!("Broadcaster host ready");

        Self {
            media,
            discovery,
            options,
            session: Mutex::new(session),
            event_tx: Mutex::new(None),
        }
    }

    /// Start receiving session events. Replaces any earlier listener.
    pub fn listen(&self) -> Receiver<WireEvent> {
        let (tx, rx) = event_channel();
        *self.event_tx.lock() = Some(tx.clone());
        self.session.lock().subscribe(channel_listener(tx));
        rx
    }

    /// Stop receiving session events.
    pub fn cancel(&self) {
        *self.event_tx.lock() = None;
        self.session.lock().unsubscribe();
    }

    /// State of the current session.
    pub fn state(&self) -> SessionState {
        self.session.lock().state()
    }

    /// A fresh idle session wired to the current listener.
    fn new_session(&self) -> BroadcastSession {
        let session = BroadcastSession::new(
            Arc::clone(&self.media),
            Arc::clone(&self.discovery),
            self.options.clone(),
        );

        if let Some(tx) = self.event_tx.lock().clone() {
            session.subscribe(channel_listener(tx));
        }

        session
    }
}

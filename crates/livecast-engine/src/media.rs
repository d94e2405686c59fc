//! Boundary to the platform media engine.
//!
//! The media engine captures, encodes and transmits. The session drives it
//! through [`MediaEngine`] and learns about its progress through
//! [`MediaEvents`], which may be invoked from any thread.

use std::sync::Weak;

use tracing::debug;
use url::Url;

use livecast_devices::ExchangeTicket;
use livecast_encoder::EncoderConfig;
use livecast_ipc::{BroadcastQuality, ConnectionState, DeviceDescriptor, NetworkHealth, RetryState};

use crate::MediaResult;

/// Asynchronous notifications from the media engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCallback {
    /// Connection to the ingest endpoint changed.
    StateChanged(ConnectionState),

    /// Reconnect loop changed state.
    RetryStateChanged(RetryState),

    /// Periodic health report.
    TransmissionStats {
        quality: BroadcastQuality,
        network: NetworkHealth,
    },

    /// The engine hit an error. Fatal errors end the broadcast.
    Error { message: String, fatal: bool },

    /// A device exchange started with [`MediaEngine::exchange_device`]
    /// finished.
    ExchangeCompleted {
        ticket: ExchangeTicket,
        result: Result<(), String>,
    },

    /// Media duration in seconds.
    Duration(f64),

    /// Seek finished at this position, in seconds.
    SeekedToTime(f64),
}

/// Commands understood by a platform media engine.
///
/// Methods are called with the session lock held and must not block on,
/// or synchronously invoke, the [`MediaEvents`] handle they were given.
/// Results of long operations are reported through that handle later.
pub trait MediaEngine: Send + Sync {
    /// Build a capture and encode pipeline for the devices.
    fn prepare(
        &self,
        config: &EncoderConfig,
        devices: &[DeviceDescriptor],
        events: MediaEvents,
    ) -> MediaResult<()>;

    /// Begin transmitting to the ingest endpoint.
    ///
    /// Success only means the attempt started; the engine reports
    /// [`ConnectionState::Connected`] once media is flowing.
    fn start(&self, endpoint: &Url, stream_key: &str) -> MediaResult<()>;

    /// Stop transmitting.
    fn stop(&self);

    /// Swap one attached device for another. Completion is reported with
    /// [`MediaCallback::ExchangeCompleted`] carrying the same ticket.
    fn exchange_device(
        &self,
        ticket: ExchangeTicket,
        current: &DeviceDescriptor,
        replacement: &DeviceDescriptor,
    ) -> MediaResult<()>;

    /// Set a microphone's input gain.
    fn set_gain(&self, device: &DeviceDescriptor, gain: f32);

    /// Embed a text payload in the outgoing stream.
    fn send_timed_metadata(&self, payload: &str) -> MediaResult<()>;

    /// Tear down the pipeline built by [`prepare`](Self::prepare).
    fn release(&self);
}

/// Receives callbacks on behalf of a session.
pub(crate) trait CallbackSink: Send + Sync {
    fn on_media_callback(&self, epoch: u64, callback: MediaCallback);
}

/// Handle the media engine uses to report back to its session.
///
/// The handle does not keep the session alive. Callbacks delivered after
/// the session stopped, was disposed or dropped are discarded.
#[derive(Clone)]
pub struct MediaEvents {
    sink: Weak<dyn CallbackSink>,
    epoch: u64,
}

impl MediaEvents {
    pub(crate) fn new(sink: Weak<dyn CallbackSink>, epoch: u64) -> Self {
        Self { sink, epoch }
    }

    /// A handle attached to no session. Every callback is discarded.
    pub fn detached() -> Self {
        let sink: Weak<dyn CallbackSink> = Weak::<Detached>::new();
        Self { sink, epoch: 0 }
    }

    /// Deliver a callback.
    pub fn deliver(&self, callback: MediaCallback) {
        match self.sink.upgrade() {
            Some(sink) => sink.on_media_callback(self.epoch, callback),
            None => debug!(?callback, "Session gone, dropping media callback"),
        }
    }
}

impl std::fmt::Debug for MediaEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaEvents")
            .field("epoch", &self.epoch)
            .field("attached", &(self.sink.strong_count() > 0))
            .finish()
    }
}

struct Detached;

impl CallbackSink for Detached {
    fn on_media_callback(&self, _epoch: u64, _callback: MediaCallback) {}
}

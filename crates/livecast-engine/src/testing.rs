//! Scripted media engine for session tests.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use url::Url;

use livecast_devices::ExchangeTicket;
use livecast_encoder::EncoderConfig;
use livecast_ipc::DeviceDescriptor;

use crate::error::MediaError;
use crate::media::{MediaCallback, MediaEngine, MediaEvents};
use crate::MediaResult;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Prepare(EncoderConfig, Vec<String>),
    Start(String, String),
    Stop,
    Exchange(ExchangeTicket, String, String),
    SetGain(String, f32),
    Metadata(String),
    Release,
}

/// Records every command and replays callbacks on demand.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    calls: Mutex<Vec<EngineCall>>,
    events: Mutex<Option<MediaEvents>>,
    pub fail_prepare: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_exchange: AtomicBool,
}

impl ScriptedEngine {
    /// Deliver a callback through the handle given at prepare, as the
    /// platform engine would from its own thread.
    pub fn emit(&self, callback: MediaCallback) {
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.deliver(callback);
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

impl MediaEngine for ScriptedEngine {
    fn prepare(
        &self,
        config: &EncoderConfig,
        devices: &[DeviceDescriptor],
        events: MediaEvents,
    ) -> MediaResult<()> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(MediaError::Rejected("capture session unavailable".into()));
        }
        let ids = devices.iter().map(|device| device.id.clone()).collect();
        self.record(EngineCall::Prepare(config.clone(), ids));
        *self.events.lock() = Some(events);
        Ok(())
    }

    fn start(&self, endpoint: &Url, stream_key: &str) -> MediaResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(MediaError::Rejected("ingest refused the stream".into()));
        }
        self.record(EngineCall::Start(endpoint.to_string(), stream_key.to_string()));
        Ok(())
    }

    fn stop(&self) {
        self.record(EngineCall::Stop);
    }

    fn exchange_device(
        &self,
        ticket: ExchangeTicket,
        current: &DeviceDescriptor,
        replacement: &DeviceDescriptor,
    ) -> MediaResult<()> {
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(MediaError::NotPrepared);
        }
        self.record(EngineCall::Exchange(
            ticket,
            current.id.clone(),
            replacement.id.clone(),
        ));
        Ok(())
    }

    fn set_gain(&self, device: &DeviceDescriptor, gain: f32) {
        self.record(EngineCall::SetGain(device.id.clone(), gain));
    }

    fn send_timed_metadata(&self, payload: &str) -> MediaResult<()> {
        self.record(EngineCall::Metadata(payload.to_string()));
        Ok(())
    }

    fn release(&self) {
        self.record(EngineCall::Release);
    }
}

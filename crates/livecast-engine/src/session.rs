//! Broadcast session lifecycle.
//!
//! A session moves `Idle -> PreviewReady -> Broadcasting -> Stopped`, may
//! fall into `Error` from any live state, and ends in `Disposed`. `Stopped`
//! and `Error` are terminal: broadcasting again takes a new session.
//!
//! Commands and media engine callbacks are serialized by one lock. The
//! engine reports asynchronously, so every callback is checked against the
//! epoch it was issued under and discarded once the session has moved on.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use livecast_devices::{
    select_camera, select_default, AttachedDevice, DeviceDiscovery, DeviceError, DeviceRegistry,
    ExchangeOutcome, ExchangeTicket, MUTED_GAIN, UNITY_GAIN,
};
use livecast_encoder::{EncoderConfig, EncoderOverrides};
use livecast_ipc::{
    methods, ConnectionState, DeviceDescriptor, DeviceType, ErrorTag, Facing, PreviewRequest,
    RetryState, SessionEvent, SessionState, WireEvent,
};

use crate::bridge::{BridgeStats, EventBridge};
use crate::error::SessionError;
use crate::media::{CallbackSink, MediaCallback, MediaEngine, MediaEvents};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::options::SessionOptions;
use crate::SessionResult;

const INGEST_SCHEMES: &[&str] = &["rtmp", "rtmps"];

/// Outcome of [`BroadcastSession::switch_camera`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSwitch {
    /// The requested camera is already attached.
    AlreadyActive,

    /// The media engine is swapping cameras. The previous camera stays
    /// attached until the engine confirms this ticket.
    Pending(ExchangeTicket),
}

#[derive(Default)]
struct Credentials {
    endpoint: String,
    stream_key: String,
}

struct SessionCore {
    state: SessionState,
    epoch: u64,
    registry: DeviceRegistry,
    config: Option<EncoderConfig>,
    credentials: Credentials,
    muted: bool,
    start_pending: bool,
    engine_prepared: bool,
}

struct SessionInner {
    core: Mutex<SessionCore>,
    media: Arc<dyn MediaEngine>,
    bridge: EventBridge,
    metrics: SessionMetrics,
    options: SessionOptions,
}

/// One broadcast session.
///
/// Every method may be called from any thread. Events are delivered to the
/// subscribed listener on the session's delivery thread.
pub struct BroadcastSession {
    inner: Arc<SessionInner>,
}

impl BroadcastSession {
    /// Create an idle session.
    pub fn new(
        media: Arc<dyn MediaEngine>,
        discovery: Arc<dyn DeviceDiscovery>,
        options: SessionOptions,
    ) -> Self {
        let bridge = EventBridge::new(&options.delivery_thread_name);

        let core = SessionCore {
            state: SessionState::Idle,
            epoch: 0,
            registry: DeviceRegistry::new(discovery),
            config: None,
            credentials: Credentials::default(),
            muted: false,
            start_pending: false,
            engine_prepared: false,
        };

        Self {
            inner: Arc::new(SessionInner {
                core: Mutex::new(core),
                media,
                bridge,
                metrics: SessionMetrics::new(),
                options,
            }),
        }
    }

    /// Register the event listener, replacing any previous one.
    pub fn subscribe(&self, listener: impl FnMut(WireEvent) + Send + 'static) {
        self.inner.bridge.subscribe(listener);
    }

    /// Remove the event listener.
    pub fn unsubscribe(&self) {
        self.inner.bridge.unsubscribe();
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    /// Whether the microphone is muted. Tracks the last mute command even
    /// when no microphone is attached.
    pub fn is_muted(&self) -> bool {
        self.inner.core.lock().muted
    }

    /// Encoder configuration built at preview.
    pub fn encoder_config(&self) -> Option<EncoderConfig> {
        self.inner.core.lock().config.clone()
    }

    pub fn attached_devices(&self) -> Vec<AttachedDevice> {
        self.inner.core.lock().registry.attached_devices()
    }

    /// Ticket of the camera switch awaiting confirmation, if any.
    pub fn pending_camera_switch(&self) -> Option<ExchangeTicket> {
        self.inner
            .core
            .lock()
            .registry
            .pending_exchange()
            .map(|pending| pending.ticket)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn bridge_stats(&self) -> BridgeStats {
        self.inner.bridge.stats()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Build the encoder configuration, attach devices and prepare the
    /// media engine.
    pub fn start_preview(&self, request: PreviewRequest) -> SessionResult<()> {
        self.start_preview_with(request, None)
    }

    /// [`start_preview`](Self::start_preview) with encoder overrides.
    #[instrument(
        name = "start_preview",
        skip(self, request, overrides),
        fields(quality = %request.quality)
    )]
    pub fn start_preview_with(
        &self,
        request: PreviewRequest,
        overrides: Option<&EncoderOverrides>,
    ) -> SessionResult<()> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if !core.state.is_idle() {
            return Err(SessionError::not_ready(methods::START_PREVIEW, core.state));
        }

        let quality = if request.quality.trim().is_empty() {
            inner.options.default_quality.as_str()
        } else {
            request.quality.as_str()
        };

        let mut overrides = overrides.cloned().unwrap_or_default();
        overrides.auto_reconnect = request
            .auto_reconnect
            .or(overrides.auto_reconnect)
            .or(Some(inner.options.auto_reconnect));

        let config = livecast_encoder::build_named(quality, Some(&overrides))?;

        let devices = match inner.attach_devices(&mut core) {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Preview failed: {}", e);
                core.registry.release_all();
                return Err(e);
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let sink: Weak<dyn CallbackSink> = weak;
        let events = MediaEvents::new(sink, core.epoch);

        if let Err(e) = inner.media.prepare(&config, &devices, events) {
            error!("Media engine failed to prepare: {}", e);
            core.registry.release_all();
            return Err(e.into());
        }

        core.engine_prepared = true;
        core.config = Some(config);
        core.credentials = Credentials {
            endpoint: request.endpoint,
            stream_key: request.stream_key,
        };

        inner.transition(&mut core, SessionState::PreviewReady);
        info!(devices = devices.len(), "Preview ready");
        Ok(())
    }

    /// Begin transmitting with the credentials given at preview.
    ///
    /// The session reaches `Broadcasting` once the media engine reports the
    /// connection. Calling this again while starting or live does nothing.
    #[instrument(name = "start_broadcast", skip(self))]
    pub fn start_broadcast(&self) -> SessionResult<()> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        match core.state {
            SessionState::Broadcasting => {
                debug!("Already broadcasting, ignoring start");
                return Ok(());
            }
            SessionState::PreviewReady if core.start_pending => {
                debug!("Start already pending, ignoring start");
                return Ok(());
            }
            SessionState::PreviewReady => {}
            state => return Err(SessionError::not_ready(methods::START_BROADCAST, state)),
        }

        let endpoint = parse_endpoint(&core.credentials)?;
        let started = inner
            .media
            .start(&endpoint, core.credentials.stream_key.trim());

        match started {
            Ok(()) => {
                core.start_pending = true;
                info!(endpoint = %endpoint, "Broadcast starting");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                inner.fail(&mut core, message.clone());
                Err(SessionError::Transmission(message))
            }
        }
    }

    /// End the broadcast and release devices. Does nothing unless a preview
    /// or broadcast is running.
    #[instrument(name = "stop_broadcast", skip(self))]
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if !core.state.accepts_device_commands() {
            debug!(state = core.state.name(), "Nothing to stop, ignoring stop");
            return;
        }

        info!("Stopping broadcast");
        inner.media.stop();
        inner.teardown(&mut core);
        inner.transition(&mut core, SessionState::Stopped);
    }

    /// Release everything the session holds. Valid in every state.
    #[instrument(name = "dispose_session", skip(self))]
    pub fn dispose(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if core.state == SessionState::Disposed {
            return;
        }

        if core.start_pending || core.state.is_broadcasting() {
            inner.media.stop();
        }
        inner.teardown(&mut core);
        inner.transition(&mut core, SessionState::Disposed);
        info!("Session disposed");
    }

    /// Flip the mute state. Returns the new state.
    pub fn toggle_mute(&self) -> SessionResult<bool> {
        let mut core = self.inner.core.lock();
        let muted = !core.muted;
        self.inner.apply_mute(&mut core, muted)?;
        Ok(muted)
    }

    pub fn set_muted(&self, muted: bool) -> SessionResult<()> {
        let mut core = self.inner.core.lock();
        self.inner.apply_mute(&mut core, muted)
    }

    /// Swap to the camera facing the requested way.
    ///
    /// The swap completes asynchronously. If the media engine refuses it,
    /// an `EXCHANGE_FAILED` error event is published and the previous
    /// camera stays attached.
    #[instrument(name = "switch_camera", skip(self), fields(facing = facing.name()))]
    pub fn switch_camera(&self, facing: Facing) -> SessionResult<CameraSwitch> {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if !core.state.accepts_device_commands() {
            return Err(SessionError::not_ready(methods::CHANGE_CAMERA, core.state));
        }
        if core.registry.pending_exchange().is_some() {
            return Err(DeviceError::ExchangeInProgress.into());
        }

        let cameras = core.registry.enumerate(DeviceType::Camera)?;
        let target = select_camera(&cameras, facing)
            .cloned()
            .ok_or(DeviceError::NoMatchingDevice(facing))?;

        if core
            .registry
            .attached(DeviceType::Camera)
            .is_some_and(|camera| camera.id() == target.id)
        {
            debug!(id = %target.id, "Camera already active");
            return Ok(CameraSwitch::AlreadyActive);
        }

        let pending = core.registry.begin_exchange(target)?;
        if let Err(e) =
            inner
                .media
                .exchange_device(pending.ticket, &pending.current, &pending.replacement)
        {
            core.registry.abort_exchange(pending.ticket);
            return Err(DeviceError::ExchangeFailed(e.to_string()).into());
        }

        info!(to = %pending.replacement.id, "Camera switch requested");
        Ok(CameraSwitch::Pending(pending.ticket))
    }

    /// Embed a text payload in the live stream.
    pub fn send_metadata(&self, payload: &str) -> SessionResult<()> {
        let core = self.inner.core.lock();

        if !core.state.is_broadcasting() {
            return Err(SessionError::not_ready(
                methods::SEND_TIME_METADATA,
                core.state,
            ));
        }

        self.inner.media.send_timed_metadata(payload)?;
        debug!(bytes = payload.len(), "Timed metadata sent");
        Ok(())
    }

    /// Supported zoom range as `(min, max)`.
    pub fn camera_zoom_range(&self) -> SessionResult<(f64, f64)> {
        Err(SessionError::Unsupported("camera zoom"))
    }

    pub fn zoom_camera(&self, _factor: f64) -> SessionResult<()> {
        Err(SessionError::Unsupported("camera zoom"))
    }
}

impl Drop for BroadcastSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl SessionInner {
    fn attach_devices(&self, core: &mut SessionCore) -> SessionResult<Vec<DeviceDescriptor>> {
        let cameras = core.registry.enumerate(DeviceType::Camera)?;
        let camera = select_default(&cameras, self.options.preferred_camera)
            .cloned()
            .ok_or_else(|| DeviceError::DeviceUnavailable {
                device_type: DeviceType::Camera,
                reason: "no camera present".to_string(),
            })?;

        let mut devices = vec![core.registry.attach(camera)?.descriptor];

        match self.attach_microphone(core) {
            Ok(Some(microphone)) => devices.push(microphone),
            Ok(None) => debug!("No microphone present"),
            Err(e) if self.options.require_microphone => return Err(e),
            Err(e) => warn!("Continuing without microphone: {}", e),
        }

        Ok(devices)
    }

    fn attach_microphone(&self, core: &mut SessionCore) -> SessionResult<Option<DeviceDescriptor>> {
        let microphone = core
            .registry
            .enumerate(DeviceType::Microphone)?
            .into_iter()
            .next();

        match microphone {
            Some(microphone) => Ok(Some(core.registry.attach(microphone)?.descriptor)),
            None if self.options.require_microphone => Err(DeviceError::DeviceUnavailable {
                device_type: DeviceType::Microphone,
                reason: "no microphone present".to_string(),
            }
            .into()),
            None => Ok(None),
        }
    }

    fn apply_mute(&self, core: &mut SessionCore, muted: bool) -> SessionResult<()> {
        if !core.state.accepts_device_commands() {
            return Err(SessionError::not_ready(methods::MUTE, core.state));
        }

        core.muted = muted;
        let gain = if muted { MUTED_GAIN } else { UNITY_GAIN };
        if let Some(microphone) = core.registry.set_gain(gain) {
            self.media.set_gain(&microphone.descriptor, gain);
        }

        info!(muted, "Microphone {}", if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    /// Release engine resources and devices, and retire the current epoch.
    fn teardown(&self, core: &mut SessionCore) {
        core.start_pending = false;
        if core.engine_prepared {
            self.media.release();
            core.engine_prepared = false;
        }
        core.registry.release_all();
        core.epoch += 1;
        self.metrics.stop();
    }

    fn on_connection_state(&self, core: &mut SessionCore, connection: ConnectionState) {
        debug!(connection = connection.message(), "Connection state changed");

        match connection {
            ConnectionState::Connected if core.start_pending => {
                core.start_pending = false;
                self.metrics.start();
                self.transition(core, SessionState::Broadcasting);
                info!("Broadcast live");
            }
            ConnectionState::Disconnected if core.start_pending => {
                self.fail(core, "connection lost before the broadcast started".to_string());
            }
            ConnectionState::Disconnected if core.state.is_broadcasting() => {
                if core.config.as_ref().is_some_and(|config| config.auto_reconnect) {
                    info!("Connection lost, waiting for the media engine to reconnect");
                } else {
                    self.fail(core, "connection lost".to_string());
                }
            }
            ConnectionState::Error => self.fail(core, connection.message().to_string()),
            _ => {}
        }
    }

    fn on_retry_state(&self, core: &mut SessionCore, retry: RetryState) {
        if retry == RetryState::Retrying {
            self.metrics.record_retry();
        }

        self.publish(SessionEvent::RetryStateChanged(retry));

        if retry.is_exhausted() {
            self.fail(core, "reconnect attempts exhausted".to_string());
        }
    }

    fn on_exchange_completed(
        &self,
        core: &mut SessionCore,
        ticket: ExchangeTicket,
        result: Result<(), String>,
    ) {
        match core.registry.complete_exchange(ticket, result) {
            ExchangeOutcome::Applied(device) => {
                if device.descriptor.device_type == DeviceType::Microphone && device.is_muted() {
                    self.media.set_gain(&device.descriptor, device.gain);
                }
            }
            ExchangeOutcome::Failed(e) => {
                self.publish(SessionEvent::error(ErrorTag::ExchangeFailed, e.to_string()));
            }
            ExchangeOutcome::Stale => {}
        }
    }

    fn fail(&self, core: &mut SessionCore, message: String) {
        error!("Broadcast failed: {}", message);
        self.metrics.record_error();
        self.metrics.stop();
        core.start_pending = false;

        self.publish(SessionEvent::error(ErrorTag::TransmissionError, message));
        self.transition(core, SessionState::Error);
    }

    fn transition(&self, core: &mut SessionCore, new_state: SessionState) {
        let previous = std::mem::replace(&mut core.state, new_state);

        debug!(
            previous = previous.name(),
            current = new_state.name(),
            "State transition"
        );

        self.publish(SessionEvent::StateChanged(new_state));
    }

    fn publish(&self, event: SessionEvent) {
        self.bridge.publish(event);
    }
}

impl CallbackSink for SessionInner {
    fn on_media_callback(&self, epoch: u64, callback: MediaCallback) {
        let mut core = self.core.lock();

        if epoch != core.epoch {
            debug!(epoch, current = core.epoch, ?callback, "Ignoring stale media callback");
            return;
        }
        if core.state.is_terminal() {
            debug!(state = core.state.name(), ?callback, "Ignoring media callback");
            return;
        }

        match callback {
            MediaCallback::StateChanged(connection) => self.on_connection_state(&mut core, connection),
            MediaCallback::RetryStateChanged(retry) => self.on_retry_state(&mut core, retry),
            MediaCallback::TransmissionStats { quality, network } => {
                self.metrics.record_stats(quality, network);
                if self
                    .metrics
                    .check_network(self.options.network_warning_threshold)
                    .is_some()
                {
                    warn!(
                        quality = quality.wire_name(),
                        network = network.wire_name(),
                        "Poor network health"
                    );
                }
                self.publish(SessionEvent::TransmissionStats { quality, network });
            }
            MediaCallback::Error {
                message,
                fatal: true,
            } => self.fail(&mut core, message),
            MediaCallback::Error {
                message,
                fatal: false,
            } => {
                warn!("Media engine error: {}", message);
                self.metrics.record_error();
                self.publish(SessionEvent::error(ErrorTag::TransmissionError, message));
            }
            MediaCallback::ExchangeCompleted { ticket, result } => {
                self.on_exchange_completed(&mut core, ticket, result)
            }
            MediaCallback::Duration(seconds) => self.publish(SessionEvent::Duration(seconds)),
            MediaCallback::SeekedToTime(seconds) => {
                self.publish(SessionEvent::SeekedToTime(seconds))
            }
        }
    }
}

fn parse_endpoint(credentials: &Credentials) -> SessionResult<Url> {
    let endpoint = credentials.endpoint.trim();
    if endpoint.is_empty() {
        return Err(SessionError::MissingCredentials("ingest endpoint"));
    }
    if credentials.stream_key.trim().is_empty() {
        return Err(SessionError::MissingCredentials("stream key"));
    }

    let url = Url::parse(endpoint)
        .map_err(|e| SessionError::InvalidConfig(format!("ingest endpoint: {e}")))?;

    if !INGEST_SCHEMES.contains(&url.scheme()) {
        return Err(SessionError::InvalidConfig(format!(
            "unsupported ingest scheme {:?}",
            url.scheme()
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::Receiver;

    use livecast_devices::{Authorization, StaticDiscovery};
    use livecast_ipc::{BroadcastQuality, NetworkHealth};

    use crate::bridge::channel_listener;
    use crate::testing::{EngineCall, ScriptedEngine};

    const TIMEOUT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    struct Harness {
        session: BroadcastSession,
        engine: Arc<ScriptedEngine>,
        discovery: Arc<StaticDiscovery>,
        events: Receiver<WireEvent>,
    }

    impl Harness {
        fn next_event(&self) -> WireEvent {
            self.events.recv_timeout(TIMEOUT).unwrap()
        }

        fn next_state(&self) -> String {
            self.next_event().get_str("state").unwrap().to_string()
        }

        fn assert_quiet(&self) {
            assert!(self.events.recv_timeout(QUIET).is_err());
        }

        fn camera(&self) -> String {
            self.session
                .attached_devices()
                .into_iter()
                .find(|device| device.descriptor.device_type == DeviceType::Camera)
                .map(|device| device.descriptor.id)
                .unwrap()
        }

        fn go_live(&self, request: PreviewRequest) {
            self.session.start_preview(request).unwrap();
            self.session.start_broadcast().unwrap();
            self.engine
                .emit(MediaCallback::StateChanged(ConnectionState::Connected));
            assert_eq!(self.next_state(), "PREVIEW_READY");
            assert_eq!(self.next_state(), "BROADCASTING");
        }
    }

    fn all_devices() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::camera("cam-back", Facing::Back, "Back Camera"),
            DeviceDescriptor::camera("cam-front", Facing::Front, "Front Camera"),
            DeviceDescriptor::microphone("mic-0", "Built-in Microphone"),
        ]
    }

    fn harness_with(devices: Vec<DeviceDescriptor>, options: SessionOptions) -> Harness {
        let engine = Arc::new(ScriptedEngine::default());
        let discovery = Arc::new(StaticDiscovery::new(devices));
        let session = BroadcastSession::new(engine.clone(), discovery.clone(), options);

        let (tx, rx) = crossbeam_channel::unbounded();
        session.subscribe(channel_listener(tx));

        Harness {
            session,
            engine,
            discovery,
            events: rx,
        }
    }

    fn harness() -> Harness {
        harness_with(all_devices(), SessionOptions::default())
    }

    fn request(quality: &str) -> PreviewRequest {
        PreviewRequest {
            endpoint: "rtmps://ingest.example.net:443/app/".to_string(),
            stream_key: "sk_test_key".to_string(),
            quality: quality.to_string(),
            auto_reconnect: None,
        }
    }

    #[test]
    fn test_preview_then_broadcast() {
        let h = harness();

        h.session.start_preview(request("720")).unwrap();
        assert_eq!(h.session.state(), SessionState::PreviewReady);

        h.session.start_broadcast().unwrap();
        assert_eq!(h.session.state(), SessionState::PreviewReady);

        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Connected));
        assert_eq!(h.session.state(), SessionState::Broadcasting);

        h.engine.emit(MediaCallback::TransmissionStats {
            quality: BroadcastQuality::High,
            network: NetworkHealth::Excellent,
        });

        assert_eq!(h.next_state(), "PREVIEW_READY");
        assert_eq!(h.next_state(), "BROADCASTING");
        let stats = h.next_event();
        assert_eq!(stats.get_str("quality"), Some("HIGH"));
        assert_eq!(stats.get_str("network"), Some("EXCELLENT"));

        assert!(h.engine.calls().contains(&EngineCall::Start(
            "rtmps://ingest.example.net:443/app/".to_string(),
            "sk_test_key".to_string()
        )));
        assert_eq!(h.session.metrics().stats_reports, 1);
    }

    #[test]
    fn test_preview_uses_requested_preset() {
        let h = harness();
        h.session.start_preview(request("360")).unwrap();

        let expected = livecast_encoder::build_named("360", None).unwrap();
        assert_eq!(h.session.encoder_config(), Some(expected.clone()));
        assert_eq!(expected.video_width, 640);
        assert_eq!(expected.max_bitrate, 1_000_000);

        let prepared = h.engine.calls().into_iter().find_map(|call| match call {
            EngineCall::Prepare(config, devices) => Some((config, devices)),
            _ => None,
        });
        assert_eq!(
            prepared,
            Some((expected, vec!["cam-back".to_string(), "mic-0".to_string()]))
        );
    }

    #[test]
    fn test_preview_auto_reconnect_from_request() {
        let h = harness();
        let mut preview = request("720");
        preview.auto_reconnect = Some(true);
        h.session.start_preview(preview).unwrap();

        assert!(h.session.encoder_config().unwrap().auto_reconnect);
    }

    #[test]
    fn test_preview_twice_is_rejected() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();

        let err = h.session.start_preview(request("720")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::SessionNotReady);
        assert_eq!(h.session.state(), SessionState::PreviewReady);
    }

    #[test]
    fn test_invalid_overrides_leave_session_idle() {
        let h = harness();
        let overrides = EncoderOverrides {
            target_framerate: Some(120),
            ..Default::default()
        };

        let err = h
            .session
            .start_preview_with(request("720"), Some(&overrides))
            .unwrap_err();
        assert_eq!(err.tag(), ErrorTag::InvalidConfig);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.attached_devices().is_empty());
    }

    #[test]
    fn test_start_broadcast_before_preview_is_rejected() {
        let h = harness();

        let err = h.session.start_broadcast().unwrap_err();
        assert!(matches!(
            err,
            SessionError::SessionNotReady {
                state: SessionState::Idle,
                ..
            }
        ));
        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.engine.count(|call| matches!(call, EngineCall::Start(..))), 0);
        h.assert_quiet();
    }

    #[test]
    fn test_start_broadcast_is_idempotent() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();

        h.session.start_broadcast().unwrap();
        h.session.start_broadcast().unwrap();
        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Connected));
        h.session.start_broadcast().unwrap();

        assert_eq!(h.engine.count(|call| matches!(call, EngineCall::Start(..))), 1);
        assert_eq!(h.next_state(), "PREVIEW_READY");
        assert_eq!(h.next_state(), "BROADCASTING");
        h.assert_quiet();
    }

    #[test]
    fn test_missing_credentials() {
        let h = harness();
        let mut preview = request("720");
        preview.stream_key = "  ".to_string();
        h.session.start_preview(preview).unwrap();

        let err = h.session.start_broadcast().unwrap_err();
        assert_eq!(err.tag(), ErrorTag::MissingCredentials);
        assert_eq!(h.session.state(), SessionState::PreviewReady);
    }

    #[test]
    fn test_rejects_non_rtmp_endpoint() {
        let h = harness();
        let mut preview = request("720");
        preview.endpoint = "https://ingest.example.net/app".to_string();
        h.session.start_preview(preview).unwrap();

        let err = h.session.start_broadcast().unwrap_err();
        assert_eq!(err.tag(), ErrorTag::InvalidConfig);
        assert_eq!(h.session.state(), SessionState::PreviewReady);
    }

    #[test]
    fn test_engine_start_failure_is_fatal() {
        let h = harness();
        h.engine.fail_start.store(true, std::sync::atomic::Ordering::SeqCst);
        h.session.start_preview(request("720")).unwrap();

        let err = h.session.start_broadcast().unwrap_err();
        assert_eq!(err.tag(), ErrorTag::TransmissionError);
        assert_eq!(h.session.state(), SessionState::Error);

        assert_eq!(h.next_state(), "PREVIEW_READY");
        assert_eq!(h.next_event().get_str("error"), Some("TRANSMISSION_ERROR"));
        assert_eq!(h.next_state(), "ERROR");
    }

    #[test]
    fn test_prepare_failure_rolls_back_devices() {
        let h = harness();
        h.engine
            .fail_prepare
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let err = h.session.start_preview(request("720")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::TransmissionError);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.attached_devices().is_empty());
    }

    #[test]
    fn test_stop_twice_publishes_one_stopped() {
        let h = harness();
        h.go_live(request("720"));

        h.session.stop();
        h.session.stop();

        assert_eq!(h.session.state(), SessionState::Stopped);
        assert_eq!(h.next_state(), "STOPPED");
        h.assert_quiet();

        assert_eq!(h.engine.count(|call| *call == EngineCall::Stop), 1);
        assert_eq!(h.engine.count(|call| *call == EngineCall::Release), 1);
        assert!(h.session.attached_devices().is_empty());
    }

    #[test]
    fn test_stop_when_idle_does_nothing() {
        let h = harness();
        h.session.stop();

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.engine.calls().is_empty());
        h.assert_quiet();
    }

    #[test]
    fn test_stopped_session_is_terminal() {
        let h = harness();
        h.go_live(request("720"));
        h.session.stop();

        assert_eq!(
            h.session.start_broadcast().unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );
        assert_eq!(
            h.session.start_preview(request("720")).unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );
    }

    #[test]
    fn test_mute_toggle_round_trip() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        assert!(!h.session.is_muted());

        assert!(h.session.toggle_mute().unwrap());
        assert!(h.session.is_muted());
        let microphone = h
            .session
            .attached_devices()
            .into_iter()
            .find(|device| device.descriptor.device_type == DeviceType::Microphone)
            .unwrap();
        assert!(microphone.is_muted());

        assert!(!h.session.toggle_mute().unwrap());
        assert!(!h.session.is_muted());

        let gains: Vec<_> = h
            .engine
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::SetGain(id, gain) => Some((id, gain)),
                _ => None,
            })
            .collect();
        assert_eq!(
            gains,
            vec![
                ("mic-0".to_string(), MUTED_GAIN),
                ("mic-0".to_string(), UNITY_GAIN)
            ]
        );
    }

    #[test]
    fn test_mute_before_preview_is_rejected() {
        let h = harness();
        let err = h.session.toggle_mute().unwrap_err();
        assert_eq!(err.tag(), ErrorTag::SessionNotReady);
        assert!(!h.session.is_muted());
    }

    #[test]
    fn test_mute_without_microphone_tracks_flag() {
        let h = harness_with(
            vec![DeviceDescriptor::camera("cam-back", Facing::Back, "Back Camera")],
            SessionOptions::default(),
        );
        h.session.start_preview(request("720")).unwrap();

        assert!(h.session.toggle_mute().unwrap());
        assert!(h.session.is_muted());
        assert_eq!(
            h.engine.count(|call| matches!(call, EngineCall::SetGain(..))),
            0
        );
    }

    #[test]
    fn test_concurrent_mute_toggles() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        h.session.toggle_mute().unwrap();
                    }
                });
            }
        });

        assert!(!h.session.is_muted());
        assert_eq!(
            h.engine.count(|call| matches!(call, EngineCall::SetGain(..))),
            200
        );
    }

    #[test]
    fn test_required_microphone_missing() {
        let options = SessionOptions {
            require_microphone: true,
            ..Default::default()
        };
        let h = harness_with(
            vec![DeviceDescriptor::camera("cam-back", Facing::Back, "Back Camera")],
            options,
        );

        let err = h.session.start_preview(request("720")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::DeviceUnavailable);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.attached_devices().is_empty());
    }

    #[test]
    fn test_camera_permission_denied() {
        let h = harness();
        h.discovery
            .set_authorization(DeviceType::Camera, Authorization::Denied);

        let err = h.session.start_preview(request("720")).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::DeviceUnavailable);
        assert_eq!(h.session.state(), SessionState::Idle);
        h.assert_quiet();
    }

    #[test]
    fn test_denied_microphone_is_optional() {
        let h = harness();
        h.discovery
            .set_authorization(DeviceType::Microphone, Authorization::Denied);

        h.session.start_preview(request("720")).unwrap();
        assert_eq!(h.session.attached_devices().len(), 1);
    }

    #[test]
    fn test_switch_camera_applies_after_confirmation() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        assert_eq!(h.camera(), "cam-back");

        let ticket = match h.session.switch_camera(Facing::Front).unwrap() {
            CameraSwitch::Pending(ticket) => ticket,
            other => panic!("unexpected switch outcome {other:?}"),
        };
        assert_eq!(h.camera(), "cam-back");
        assert_eq!(h.session.pending_camera_switch(), Some(ticket));

        h.engine.emit(MediaCallback::ExchangeCompleted {
            ticket,
            result: Ok(()),
        });
        assert_eq!(h.camera(), "cam-front");
        assert_eq!(h.session.pending_camera_switch(), None);

        assert_eq!(
            h.session.switch_camera(Facing::Front).unwrap(),
            CameraSwitch::AlreadyActive
        );
    }

    #[test]
    fn test_switch_camera_without_match() {
        let h = harness_with(
            vec![
                DeviceDescriptor::camera("cam-back", Facing::Back, "Back Camera"),
                DeviceDescriptor::microphone("mic-0", "Built-in Microphone"),
            ],
            SessionOptions::default(),
        );
        h.session.start_preview(request("720")).unwrap();

        let err = h.session.switch_camera(Facing::Front).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::NoMatchingDevice);
        assert_eq!(h.camera(), "cam-back");
        assert_eq!(h.session.state(), SessionState::PreviewReady);
    }

    #[test]
    fn test_failed_exchange_keeps_camera() {
        let h = harness();
        h.go_live(request("720"));

        let CameraSwitch::Pending(ticket) = h.session.switch_camera(Facing::Front).unwrap() else {
            panic!("expected a pending switch");
        };
        h.engine.emit(MediaCallback::ExchangeCompleted {
            ticket,
            result: Err("camera busy".to_string()),
        });

        let event = h.next_event();
        assert_eq!(event.get_str("error"), Some("EXCHANGE_FAILED"));
        assert_eq!(h.session.state(), SessionState::Broadcasting);
        assert_eq!(h.camera(), "cam-back");
    }

    #[test]
    fn test_switch_while_pending_is_rejected() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        h.session.switch_camera(Facing::Front).unwrap();

        let err = h.session.switch_camera(Facing::Front).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::ExchangeFailed);
    }

    #[test]
    fn test_switch_back_while_pending_is_rejected() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        let CameraSwitch::Pending(ticket) = h.session.switch_camera(Facing::Front).unwrap() else {
            panic!("expected a pending switch");
        };

        let err = h.session.switch_camera(Facing::Back).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::ExchangeFailed);
        assert_eq!(h.session.pending_camera_switch(), Some(ticket));

        h.engine.emit(MediaCallback::ExchangeCompleted {
            ticket,
            result: Ok(()),
        });
        assert_eq!(h.camera(), "cam-front");
        assert_eq!(
            h.engine.count(|call| matches!(call, EngineCall::Exchange(..))),
            1
        );
    }

    #[test]
    fn test_engine_refusing_exchange() {
        let h = harness();
        h.engine
            .fail_exchange
            .store(true, std::sync::atomic::Ordering::SeqCst);
        h.session.start_preview(request("720")).unwrap();

        let err = h.session.switch_camera(Facing::Front).unwrap_err();
        assert_eq!(err.tag(), ErrorTag::ExchangeFailed);
        assert_eq!(h.session.pending_camera_switch(), None);
        assert_eq!(h.camera(), "cam-back");
    }

    #[test]
    fn test_late_exchange_after_dispose_is_ignored() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        let CameraSwitch::Pending(ticket) = h.session.switch_camera(Facing::Front).unwrap() else {
            panic!("expected a pending switch");
        };

        h.session.dispose();
        h.engine.emit(MediaCallback::ExchangeCompleted {
            ticket,
            result: Ok(()),
        });

        assert!(h.session.attached_devices().is_empty());
        assert_eq!(h.next_state(), "PREVIEW_READY");
        assert_eq!(h.next_state(), "DISPOSED");
        h.assert_quiet();
    }

    #[test]
    fn test_late_connect_after_stop_is_ignored() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        h.session.start_broadcast().unwrap();

        h.session.stop();
        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Connected));

        assert_eq!(h.session.state(), SessionState::Stopped);
        assert_eq!(h.next_state(), "PREVIEW_READY");
        assert_eq!(h.next_state(), "STOPPED");
        h.assert_quiet();
        assert_eq!(h.session.metrics().uptime_seconds, 0);
    }

    #[test]
    fn test_stop_and_dispose_race_engine_callbacks() {
        for _ in 0..20 {
            let h = harness();
            h.session.start_preview(request("720")).unwrap();
            h.session.start_broadcast().unwrap();
            let CameraSwitch::Pending(ticket) = h.session.switch_camera(Facing::Front).unwrap()
            else {
                panic!("expected a pending switch");
            };

            thread::scope(|scope| {
                scope.spawn(|| h.session.stop());
                scope.spawn(|| h.session.dispose());
                scope.spawn(|| {
                    h.engine
                        .emit(MediaCallback::StateChanged(ConnectionState::Connected))
                });
                scope.spawn(|| {
                    h.engine.emit(MediaCallback::ExchangeCompleted {
                        ticket,
                        result: Ok(()),
                    })
                });
            });

            let mut states = Vec::new();
            while let Ok(event) = h.events.recv_timeout(QUIET) {
                if let Some(state) = event.get_str("state") {
                    states.push(state.to_string());
                }
            }

            assert_eq!(states.first().map(String::as_str), Some("PREVIEW_READY"));
            assert_eq!(states.last().map(String::as_str), Some("DISPOSED"));
            assert_eq!(states.iter().filter(|s| *s == "DISPOSED").count(), 1);
            assert!(states.iter().filter(|s| *s == "STOPPED").count() <= 1);

            assert_eq!(h.session.state(), SessionState::Disposed);
            assert!(h.session.attached_devices().is_empty());
            assert_eq!(h.session.pending_camera_switch(), None);
            assert_eq!(h.engine.count(|call| *call == EngineCall::Release), 1);
        }
    }

    #[test]
    fn test_dispose_twice_publishes_once() {
        let h = harness();
        h.go_live(request("720"));

        h.session.dispose();
        h.session.dispose();

        assert_eq!(h.next_state(), "DISPOSED");
        h.assert_quiet();
        assert_eq!(h.engine.count(|call| *call == EngineCall::Stop), 1);
        assert_eq!(h.engine.count(|call| *call == EngineCall::Release), 1);
    }

    #[test]
    fn test_fatal_error_ends_broadcast() {
        let h = harness();
        h.go_live(request("720"));

        h.engine.emit(MediaCallback::Error {
            message: "encoder crashed".to_string(),
            fatal: true,
        });

        let error = h.next_event();
        assert_eq!(error.get_str("error"), Some("TRANSMISSION_ERROR"));
        assert_eq!(error.get_str("message"), Some("encoder crashed"));
        assert_eq!(h.next_state(), "ERROR");

        assert_eq!(
            h.session.start_broadcast().unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );
        assert_eq!(
            h.session.toggle_mute().unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );

        h.session.dispose();
        assert_eq!(h.next_state(), "DISPOSED");
        assert_eq!(h.session.metrics().errors, 1);
    }

    #[test]
    fn test_non_fatal_error_keeps_broadcasting() {
        let h = harness();
        h.go_live(request("720"));

        h.engine.emit(MediaCallback::Error {
            message: "dropped frames".to_string(),
            fatal: false,
        });

        assert_eq!(h.next_event().get_str("error"), Some("TRANSMISSION_ERROR"));
        assert_eq!(h.session.state(), SessionState::Broadcasting);
    }

    #[test]
    fn test_disconnect_without_auto_reconnect_fails() {
        let h = harness();
        h.go_live(request("720"));

        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Disconnected));

        assert_eq!(h.session.state(), SessionState::Error);
        assert_eq!(h.next_event().get_str("message"), Some("connection lost"));
        assert_eq!(h.next_state(), "ERROR");
    }

    #[test]
    fn test_disconnect_with_auto_reconnect_waits() {
        let h = harness();
        let mut preview = request("720");
        preview.auto_reconnect = Some(true);
        h.go_live(preview);

        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Disconnected));
        h.engine
            .emit(MediaCallback::RetryStateChanged(RetryState::Retrying));
        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Connected));

        assert_eq!(h.session.state(), SessionState::Broadcasting);
        assert_eq!(h.next_event().get_str("retrystate"), Some("RETRYING"));
        h.assert_quiet();
        assert_eq!(h.session.metrics().retries, 1);
    }

    #[test]
    fn test_exhausted_retries_fail() {
        let h = harness();
        let mut preview = request("720");
        preview.auto_reconnect = Some(true);
        h.go_live(preview);

        h.engine
            .emit(MediaCallback::RetryStateChanged(RetryState::Failure));

        assert_eq!(h.next_event().get_str("retrystate"), Some("FAILURE"));
        assert_eq!(h.next_event().get_str("error"), Some("TRANSMISSION_ERROR"));
        assert_eq!(h.next_state(), "ERROR");
    }

    #[test]
    fn test_disconnect_during_start_fails() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        h.session.start_broadcast().unwrap();

        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Disconnected));

        assert_eq!(h.session.state(), SessionState::Error);
        assert_eq!(h.next_state(), "PREVIEW_READY");
        let error = h.next_event();
        assert_eq!(error.get_str("error"), Some("TRANSMISSION_ERROR"));
        assert_eq!(
            error.get_str("message"),
            Some("connection lost before the broadcast started")
        );
        assert_eq!(h.next_state(), "ERROR");

        assert_eq!(
            h.session.start_broadcast().unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );
    }

    #[test]
    fn test_connection_error_is_fatal() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        h.session.start_broadcast().unwrap();

        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Error));

        assert_eq!(h.session.state(), SessionState::Error);
    }

    #[test]
    fn test_player_events_forwarded() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        assert_eq!(h.next_state(), "PREVIEW_READY");

        h.engine.emit(MediaCallback::Duration(12.5));
        h.engine.emit(MediaCallback::SeekedToTime(3.0));

        assert_eq!(
            h.next_event().get("duration").and_then(|v| v.as_f64()),
            Some(12.5)
        );
        assert_eq!(
            h.next_event().get("seekedtotime").and_then(|v| v.as_f64()),
            Some(3.0)
        );
    }

    #[test]
    fn test_metadata_only_while_broadcasting() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        assert_eq!(
            h.session.send_metadata("{\"q\":1}").unwrap_err().tag(),
            ErrorTag::SessionNotReady
        );

        h.session.start_broadcast().unwrap();
        h.engine
            .emit(MediaCallback::StateChanged(ConnectionState::Connected));
        h.session.send_metadata("{\"q\":1}").unwrap();

        assert!(h
            .engine
            .calls()
            .contains(&EngineCall::Metadata("{\"q\":1}".to_string())));
    }

    #[test]
    fn test_zoom_is_unsupported() {
        let h = harness();
        assert_eq!(
            h.session.camera_zoom_range().unwrap_err().tag(),
            ErrorTag::Unsupported
        );
        assert_eq!(
            h.session.zoom_camera(2.0).unwrap_err().tag(),
            ErrorTag::Unsupported
        );
    }

    #[test]
    fn test_callbacks_after_drop_are_discarded() {
        let h = harness();
        h.session.start_preview(request("720")).unwrap();
        let Harness {
            session, engine, ..
        } = h;

        drop(session);
        engine.emit(MediaCallback::StateChanged(ConnectionState::Connected));
        assert_eq!(engine.count(|call| *call == EngineCall::Release), 1);
    }
}

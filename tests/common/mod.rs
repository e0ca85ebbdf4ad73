// Test doubles for the audio subsystem and the network transport
//
// MockHost hands out streams that count their close() calls and a playback
// sink that records every write. ScriptedTransport replays a fixed list of
// inbound steps and records everything sent to it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use duplex_voice::audio::{
    AudioFrame, AudioHost, AudioParams, AudioStream, DeviceInfo, FaultSender, FrameSender, OpenedPlayback,
    PlaybackSink, ResolvedDevice,
};
use duplex_voice::session::{Credentials, SessionConfig};
use duplex_voice::transport::{InboundEvent, OutboundMessage, Transport, TransportConnector, TransportKind};
use duplex_voice::{SessionError, SessionResult};

/// Shared view of everything the mock host did
#[derive(Default)]
pub struct HostLog {
    pub playback_opens: AtomicUsize,
    pub playback_closes: AtomicUsize,
    pub capture_opens: AtomicUsize,
    pub capture_closes: AtomicUsize,
    pub devices_opened: Mutex<Vec<ResolvedDevice>>,
    pub writes: Mutex<Vec<Vec<i16>>>,
    /// Capture sender kept alive so the capture side stays open
    pub capture: Mutex<Option<FrameSender>>,
}

impl HostLog {
    pub fn playback_closes(&self) -> usize {
        self.playback_closes.load(Ordering::SeqCst)
    }

    pub fn capture_closes(&self) -> usize {
        self.capture_closes.load(Ordering::SeqCst)
    }

    pub fn playback_opens(&self) -> usize {
        self.playback_opens.load(Ordering::SeqCst)
    }

    pub fn capture_opens(&self) -> usize {
        self.capture_opens.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<i16>> {
        self.writes.lock().unwrap().clone()
    }
}

pub struct MockHost {
    pub log: Arc<HostLog>,
    pub devices: Vec<DeviceInfo>,
    /// Frames offered as soon as capture opens
    pub frames: Vec<AudioFrame>,
    /// Drop the capture sender after the initial frames, ending capture
    pub end_capture: bool,
    /// Reported through the fault channel when capture opens
    pub capture_fault: Option<SessionError>,
}

impl MockHost {
    pub fn new() -> (Self, Arc<HostLog>) {
        let log = Arc::new(HostLog::default());
        let host = Self {
            log: Arc::clone(&log),
            devices: vec![DeviceInfo {
                index: 0,
                name: "Built-in Output".to_string(),
                output_channels: 2,
            }],
            frames: Vec::new(),
            end_capture: false,
            capture_fault: None,
        };
        (host, log)
    }
}

struct MockStream {
    closes: Arc<HostLog>,
    playback: bool,
}

impl AudioStream for MockStream {
    fn close(&mut self) -> SessionResult<()> {
        let counter = if self.playback {
            &self.closes.playback_closes
        } else {
            &self.closes.capture_closes
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RecordingSink {
    log: Arc<HostLog>,
}

#[async_trait::async_trait]
impl PlaybackSink for RecordingSink {
    async fn write(&self, samples: Vec<i16>) -> SessionResult<()> {
        self.log.writes.lock().unwrap().push(samples);
        Ok(())
    }
}

impl AudioHost for MockHost {
    fn name(&self) -> &str {
        "mock"
    }

    fn output_devices(&self) -> SessionResult<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn open_playback(
        &mut self,
        _params: &AudioParams,
        device: ResolvedDevice,
        _faults: FaultSender,
    ) -> SessionResult<OpenedPlayback> {
        self.log.playback_opens.fetch_add(1, Ordering::SeqCst);
        self.log.devices_opened.lock().unwrap().push(device);

        Ok(OpenedPlayback {
            stream: Box::new(MockStream {
                closes: Arc::clone(&self.log),
                playback: true,
            }),
            sink: Arc::new(RecordingSink {
                log: Arc::clone(&self.log),
            }),
        })
    }

    fn open_capture(
        &mut self,
        _params: &AudioParams,
        frames: FrameSender,
        faults: FaultSender,
    ) -> SessionResult<Box<dyn AudioStream>> {
        self.log.capture_opens.fetch_add(1, Ordering::SeqCst);

        for frame in &self.frames {
            frames.offer(frame.clone());
        }

        if let Some(fault) = self.capture_fault.clone() {
            let _ = faults.send(fault);
        }

        if !self.end_capture {
            *self.log.capture.lock().unwrap() = Some(frames);
        }

        Ok(Box::new(MockStream {
            closes: Arc::clone(&self.log),
            playback: false,
        }))
    }
}

/// One scripted inbound step
#[derive(Debug, Clone)]
pub enum Step {
    Event(InboundEvent),
    Fail(SessionError),
    Close,
}

pub struct ScriptedTransport {
    kind: TransportKind,
    script: Mutex<VecDeque<Step>>,
    /// Block forever once the script is exhausted instead of reporting closure
    hold_open: bool,
    fail_audio_sends: bool,
    fail_handshake: bool,
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub closes: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind, script: Vec<Step>) -> Self {
        Self {
            kind,
            script: Mutex::new(script.into()),
            hold_open: false,
            fail_audio_sends: false,
            fail_handshake: false,
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn failing_audio_sends(mut self) -> Self {
        self.fail_audio_sends = true;
        self
    }

    pub fn failing_handshake(mut self) -> Self {
        self.fail_handshake = true;
        self
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Sequence numbers of the audio chunks sent, in order
    pub fn sent_sequences(&self) -> Vec<u64> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::AudioChunk(chunk) => Some(chunk.frame.sequence),
                OutboundMessage::Handshake(_) => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn send(&self, message: OutboundMessage) -> SessionResult<()> {
        match &message {
            OutboundMessage::Handshake(_) if self.fail_handshake => {
                return Err(SessionError::Transport("handshake rejected".to_string()));
            }
            OutboundMessage::AudioChunk(_) if self.fail_audio_sends => {
                return Err(SessionError::Transport("send failed".to_string()));
            }
            _ => {}
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn receive(&self) -> SessionResult<Option<InboundEvent>> {
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Event(event)) => Ok(Some(event)),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Close) => Ok(None),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn close(&self) -> SessionResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out prepared transports; kinds listed in `refuse` fail to connect
#[derive(Default)]
pub struct MockConnector {
    pub transports: HashMap<TransportKind, Arc<ScriptedTransport>>,
    pub refuse: Vec<TransportKind>,
    pub attempts: Mutex<Vec<TransportKind>>,
}

impl MockConnector {
    pub fn with(mut self, transport: ScriptedTransport) -> (Self, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        self.transports.insert(transport.kind(), Arc::clone(&transport));
        (self, transport)
    }

    pub fn refusing(mut self, kind: TransportKind) -> Self {
        self.refuse.push(kind);
        self
    }

    pub fn attempts(&self) -> Vec<TransportKind> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, kind: TransportKind, _config: &SessionConfig) -> SessionResult<Arc<dyn Transport>> {
        self.attempts.lock().unwrap().push(kind);

        if self.refuse.contains(&kind) {
            return Err(SessionError::Transport(format!("{} endpoint refused connection", kind)));
        }

        match self.transports.get(&kind) {
            Some(transport) => Ok(Arc::clone(transport) as Arc<dyn Transport>),
            None => Err(SessionError::Transport(format!("no {} endpoint", kind))),
        }
    }
}

/// Valid credentials and a raw endpoint; no dialog configuration id
pub fn raw_config() -> SessionConfig {
    let mut config = SessionConfig {
        credentials: Credentials {
            api_key: Some("test-key".to_string()),
            secret_key: Some("test-secret".to_string()),
        },
        ..SessionConfig::default()
    };
    config.transport.ws_url = Some("ws://127.0.0.1:9/realtime".to_string());
    config
}

/// Valid credentials with a dialog configuration id
pub fn sdk_config(fallback: bool) -> SessionConfig {
    let mut config = raw_config();
    config.transport.config_id = Some("cfg-test".to_string());
    config.transport.fallback_to_raw = fallback;
    config
}

pub fn frames(count: u64) -> Vec<AudioFrame> {
    let params = AudioParams::default();
    (0..count)
        .map(|seq| AudioFrame::new(vec![seq as i16; params.frame_len()], params.sample_rate, params.channels, seq))
        .collect()
}

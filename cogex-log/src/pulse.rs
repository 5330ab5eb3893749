use crate::error::LogError;
use cogex_core::{BLOCK_MARKER_EVENT, MAX_PULSE_CODE, StateDefinition};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Byte driven for the block-boundary marker: every line high.
pub const ALL_LINES_HIGH: u8 = 0xFF;

/// Outcome of one pulse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseStatus {
    Sent,
    Failed,
    TestOnly,
    LogOnly,
}

impl fmt::Display for PulseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PulseStatus::Sent => "SENT",
            PulseStatus::Failed => "FAILED",
            PulseStatus::TestOnly => "TEST_ONLY",
            PulseStatus::LogOnly => "LOG_ONLY",
        })
    }
}

/// Maps a code in `1..=8` to its single output bit.
pub fn pulse_byte(code: u8) -> Option<u8> {
    (1..=MAX_PULSE_CODE).contains(&code).then(|| 1u8 << (code - 1))
}

/// A pulse code known to be drivable: one line in `1..=8`, or the block marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseCode(CodeKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeKind {
    Line(u8),
    BlockMarker,
}

impl PulseCode {
    pub const BLOCK_MARKER: PulseCode = PulseCode(CodeKind::BlockMarker);

    pub fn line(code: u8) -> Option<Self> {
        pulse_byte(code).map(|_| Self(CodeKind::Line(code)))
    }

    /// The configured line number, `None` for the block marker.
    pub fn line_code(&self) -> Option<u8> {
        match self.0 {
            CodeKind::Line(code) => Some(code),
            CodeKind::BlockMarker => None,
        }
    }

    pub fn byte(&self) -> u8 {
        match self.0 {
            CodeKind::Line(code) => 1u8 << (code - 1),
            CodeKind::BlockMarker => ALL_LINES_HIGH,
        }
    }
}

/// Event name to pulse code lookup.
///
/// Codes are unique across the table. `StartEndBlock` is always present, may
/// reuse any configured code and is always driven as [`ALL_LINES_HIGH`].
#[derive(Debug, Clone, PartialEq)]
pub struct PulseCodeTable {
    codes: BTreeMap<String, PulseCode>,
}

impl Default for PulseCodeTable {
    fn default() -> Self {
        let mut codes = BTreeMap::new();
        codes.insert(BLOCK_MARKER_EVENT.to_string(), PulseCode::BLOCK_MARKER);
        Self { codes }
    }
}

impl PulseCodeTable {
    /// Builds the table from pulse-emitting states plus extra named events.
    pub fn build<'a>(
        states: impl IntoIterator<Item = &'a StateDefinition>,
        events: impl IntoIterator<Item = (&'a str, u8)>,
    ) -> Result<Self, LogError> {
        let mut table = Self::default();
        for state in states {
            if let (true, Some(code)) = (state.emits_pulse, state.pulse_code) {
                table.insert(&state.name, code)?;
            }
        }
        for (event, code) in events {
            table.insert(event, code)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, event: &str, code: u8) -> Result<(), LogError> {
        if event == BLOCK_MARKER_EVENT {
            return Ok(());
        }
        let Some(line) = PulseCode::line(code) else {
            return Err(LogError::CodeOutOfRange {
                event: event.to_string(),
                code,
            });
        };
        if let Some((first, _)) = self
            .codes
            .iter()
            .find(|(name, c)| **c == line && name.as_str() != event)
        {
            return Err(LogError::DuplicateCode {
                code,
                first: first.clone(),
                second: event.to_string(),
            });
        }
        self.codes.insert(event.to_string(), line);
        Ok(())
    }

    /// Adds `event` unless it is already present; an existing entry must carry the same code.
    pub fn ensure(&mut self, event: &str, code: u8) -> Result<(), LogError> {
        match self.lookup(event).and_then(|c| c.line_code()) {
            Some(existing) if existing != code => Err(LogError::CodeMismatch {
                event: event.to_string(),
                table: existing,
                requested: code,
            }),
            Some(_) => Ok(()),
            None => self.insert(event, code),
        }
    }

    pub fn lookup(&self, event: &str) -> Option<PulseCode> {
        self.codes.get(event).copied()
    }
}

/// Physical pulse output.
pub trait PulseSink {
    fn write_byte(&mut self, value: u8) -> Result<(), LogError>;
}

impl<T: PulseSink + ?Sized> PulseSink for Box<T> {
    fn write_byte(&mut self, value: u8) -> Result<(), LogError> {
        (**self).write_byte(value)
    }
}

/// Pulse output through a character device (serial or parallel adapter).
///
/// Line settings such as the baud rate are applied to the device outside this
/// process; the requested rate is kept for diagnostics.
#[derive(Debug)]
pub struct DevicePulseSink {
    port: PathBuf,
    baud: u32,
    file: File,
}

impl DevicePulseSink {
    pub fn open(port: impl AsRef<Path>, baud: u32) -> Result<Self, LogError> {
        let port = port.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .open(&port)
            .map_err(|source| LogError::PortOpen {
                port: port.clone(),
                baud,
                source,
            })?;
        info!("pulse port {:?} opened ({} baud)", port, baud);
        Ok(Self { port, baud, file })
    }

    pub fn port(&self) -> &Path {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl PulseSink for DevicePulseSink {
    fn write_byte(&mut self, value: u8) -> Result<(), LogError> {
        self.file.write_all(&[value])?;
        self.file.flush()?;
        Ok(())
    }
}

/// Runs a blocking sink on its own thread and bounds every write by a timeout.
///
/// A write that hangs, errors, or takes the writer thread down reports an
/// error to the caller instead of blocking the trial timeline.
pub struct ThreadedPulseSink {
    requests: Option<Sender<u8>>,
    acks: Receiver<Result<(), LogError>>,
    timeout: Duration,
    worker: Option<JoinHandle<()>>,
    stalled: bool,
}

impl ThreadedPulseSink {
    pub fn spawn<S: PulseSink + Send + 'static>(mut sink: S, timeout: Duration) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<u8>();
        let (ack_tx, ack_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("cogex-pulse".into())
            .spawn(move || {
                for value in req_rx {
                    if ack_tx.send(sink.write_byte(value)).is_err() {
                        break;
                    }
                }
            })
            .ok();
        if worker.is_none() {
            warn!("could not start pulse writer thread");
        }
        Self {
            requests: Some(req_tx),
            acks: ack_rx,
            timeout,
            worker,
            stalled: false,
        }
    }

    /// Drains acknowledgements left over from writes that timed out.
    fn drain_stale(&mut self) -> Result<(), LogError> {
        if !self.stalled {
            return Ok(());
        }
        match self.acks.recv_timeout(self.timeout) {
            Ok(_) => {
                self.stalled = false;
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(LogError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(LogError::WriterGone),
        }
    }
}

impl PulseSink for ThreadedPulseSink {
    fn write_byte(&mut self, value: u8) -> Result<(), LogError> {
        if self.worker.is_none() {
            return Err(LogError::WriterGone);
        }
        self.drain_stale()?;
        let requests = self.requests.as_ref().ok_or(LogError::WriterGone)?;
        requests.send(value).map_err(|_| LogError::WriterGone)?;
        match self.acks.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.stalled = true;
                Err(LogError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(LogError::WriterGone),
        }
    }
}

impl Drop for ThreadedPulseSink {
    fn drop(&mut self) {
        self.requests.take();
        // A stalled writer is left detached rather than joined.
        if let Some(worker) = self.worker.take() {
            if !self.stalled {
                let _ = worker.join();
            }
        }
    }
}

/// Sink that records every byte; handy for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingPulseSink {
    written: Arc<Mutex<Vec<u8>>>,
}

impl RecordingPulseSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl PulseSink for RecordingPulseSink {
    fn write_byte(&mut self, value: u8) -> Result<(), LogError> {
        if let Ok(mut written) = self.written.lock() {
            written.push(value);
        }
        Ok(())
    }
}

enum LineMode {
    TestOnly,
    Hardware(Option<Box<dyn PulseSink + Send>>),
}

/// The hardware pulse channel as the logger sees it.
pub struct PulseLine {
    mode: LineMode,
}

impl PulseLine {
    /// Simulation mode: nothing is written, every coded event is `TEST_ONLY`.
    pub fn test_only() -> Self {
        Self {
            mode: LineMode::TestOnly,
        }
    }

    /// Hardware mode. A failed open leaves the line unavailable; every later
    /// attempt reports `FAILED` and the session carries on.
    pub fn hardware<S: PulseSink + Send + 'static>(opened: Result<S, LogError>) -> Self {
        let sink = match opened {
            Ok(sink) => Some(Box::new(sink) as Box<dyn PulseSink + Send>),
            Err(e) => {
                warn!("pulse hardware unavailable: {}; pulses will be logged as FAILED", e);
                None
            }
        };
        Self {
            mode: LineMode::Hardware(sink),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.mode, LineMode::Hardware(Some(_)))
    }

    pub fn attempt(&mut self, byte: u8) -> PulseStatus {
        match &mut self.mode {
            LineMode::TestOnly => PulseStatus::TestOnly,
            LineMode::Hardware(None) => {
                debug!("pulse 0x{:02X} not sent: no hardware", byte);
                PulseStatus::Failed
            }
            LineMode::Hardware(Some(sink)) => match sink.write_byte(byte) {
                Ok(()) => PulseStatus::Sent,
                Err(e) => {
                    warn!("pulse 0x{:02X} failed: {}", byte, e);
                    PulseStatus::Failed
                }
            },
        }
    }
}

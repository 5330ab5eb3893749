use crate::error::LogError;
use crate::pulse::{PulseCodeTable, PulseLine, PulseStatus};
use crate::record::{FULL_LOG_HEADER, LogRecord, LogStamp, PULSE_LOG_HEADER, PulseRecord};
use crate::sink::CsvLog;
use cogex_timing::Frame;
use std::path::Path;
use tracing::debug;

/// Read-only subscriber to every logged event name.
pub trait EventObserver {
    fn on_event(&mut self, trial_id: &str, event: &str);
}

impl<F: FnMut(&str, &str)> EventObserver for F {
    fn on_event(&mut self, trial_id: &str, event: &str) {
        self(trial_id, event)
    }
}

struct DeferredEvent {
    trial_id: String,
    event: String,
    details: String,
}

/// Dual-channel session logger.
///
/// Every event goes to the full-detail log; coded events also drive the pulse
/// line and land in the pulse log. Nothing here returns an error to the
/// caller: file and hardware problems are reported through `tracing` and the
/// per-attempt [`PulseStatus`].
pub struct EventLogger {
    stamp: LogStamp,
    full: CsvLog,
    pulse: CsvLog,
    codes: PulseCodeTable,
    line: PulseLine,
    full_records: Vec<LogRecord>,
    pulse_records: Vec<PulseRecord>,
    deferred: Vec<DeferredEvent>,
    observers: Vec<Box<dyn EventObserver>>,
}

impl EventLogger {
    pub fn new(full: CsvLog, pulse: CsvLog, codes: PulseCodeTable, line: PulseLine) -> Self {
        Self {
            stamp: LogStamp::default(),
            full,
            pulse,
            codes,
            line,
            full_records: Vec::new(),
            pulse_records: Vec::new(),
            deferred: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Logger with no files; records are only kept in memory.
    pub fn in_memory(codes: PulseCodeTable, line: PulseLine) -> Self {
        Self::new(CsvLog::detached(), CsvLog::detached(), codes, line)
    }

    /// Logger writing `<session>_<task>_full.csv` and `<session>_<task>_pulse.csv` into `dir`.
    pub fn create(dir: &Path, session: &str, task: &str, codes: PulseCodeTable, line: PulseLine) -> Self {
        let full = CsvLog::create(dir.join(format!("{session}_{task}_full.csv")), FULL_LOG_HEADER);
        let pulse = CsvLog::create(dir.join(format!("{session}_{task}_pulse.csv")), PULSE_LOG_HEADER);
        Self::new(full, pulse, codes, line)
    }

    pub fn subscribe(&mut self, observer: impl EventObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn codes(&self) -> &PulseCodeTable {
        &self.codes
    }

    /// Makes sure `event` pulses with `code`, adding it to the table if absent.
    pub fn ensure_code(&mut self, event: &str, code: u8) -> Result<(), LogError> {
        self.codes.ensure(event, code)
    }

    pub fn stamp(&self) -> LogStamp {
        self.stamp
    }

    /// Moves the logger to a new tick and emits events deferred from the previous one.
    pub fn advance(&mut self, frame: &Frame) {
        self.stamp = LogStamp::from(frame);
        for entry in std::mem::take(&mut self.deferred) {
            self.log_event(&entry.trial_id, &entry.event, &entry.details);
        }
    }

    /// Appends to the full-detail log only.
    pub fn log_all(&mut self, trial_id: &str, event: &str, details: &str) {
        let record = LogRecord {
            stamp: self.stamp,
            trial_id: trial_id.to_string(),
            event: event.to_string(),
            details: details.to_string(),
        };
        self.full.append(&record.to_csv());
        self.full_records.push(record);
    }

    /// Appends to the pulse log and attempts the hardware pulse.
    pub fn log_pulse(&mut self, trial_id: &str, event: &str) -> PulseStatus {
        let (byte, status) = match self.codes.lookup(event) {
            Some(code) => {
                let byte = code.byte();
                (Some(byte), self.line.attempt(byte))
            }
            None => (None, PulseStatus::LogOnly),
        };
        let record = PulseRecord {
            stamp: self.stamp,
            trial_id: trial_id.to_string(),
            event: event.to_string(),
            byte,
            status,
        };
        self.pulse.append(&record.to_csv());
        self.pulse_records.push(record);
        status
    }

    /// Logs on both channels and notifies observers.
    pub fn log_event(&mut self, trial_id: &str, event: &str, details: &str) -> PulseStatus {
        let status = self.log_pulse(trial_id, event);
        let details = match (status, self.pulse_records.last().and_then(|r| r.byte)) {
            (PulseStatus::LogOnly, _) | (_, None) => details.to_string(),
            (status, Some(byte)) if details.is_empty() => format!("pulse={status}:{byte}"),
            (status, Some(byte)) => format!("{details};pulse={status}:{byte}"),
        };
        self.log_all(trial_id, event, &details);
        debug!(tick = self.stamp.tick, trial = trial_id, "{} {}", event, details);
        for observer in &mut self.observers {
            observer.on_event(trial_id, event);
        }
        status
    }

    /// Queues an event to be logged at the start of the next tick.
    pub fn defer_event(&mut self, trial_id: &str, event: &str, details: &str) {
        self.deferred.push(DeferredEvent {
            trial_id: trial_id.to_string(),
            event: event.to_string(),
            details: details.to_string(),
        });
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn full_records(&self) -> &[LogRecord] {
        &self.full_records
    }

    pub fn pulse_records(&self) -> &[PulseRecord] {
        &self.pulse_records
    }

    pub fn flush(&mut self) {
        self.full.flush();
        self.pulse.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;
    use crate::pulse::{DevicePulseSink, RecordingPulseSink};
    use cogex_core::{BLOCK_MARKER_EVENT, StateDefinition};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn frame(index: u64, ms: u64) -> Frame {
        Frame {
            index,
            delta: Duration::from_millis(ms),
            render_time: Duration::from_millis(ms * index),
            wall_time: Duration::from_millis(ms * index),
        }
    }

    fn codes() -> PulseCodeTable {
        let states = [
            StateDefinition::new("SampleOn").with_stimulus().with_pulse(3),
            StateDefinition::new("Choice").with_choice(),
        ];
        PulseCodeTable::build(&states, [("Success", 5)]).unwrap()
    }

    #[test]
    fn absent_hardware_fails_every_pulse_but_keeps_full_log() {
        let line = PulseLine::hardware::<DevicePulseSink>(Err(LogError::WriterGone));
        let mut logger = EventLogger::in_memory(codes(), line);

        for i in 0..5 {
            logger.advance(&frame(i, 16));
            assert_eq!(logger.log_event("T1", "SampleOn", ""), PulseStatus::Failed);
            assert_eq!(logger.log_event("T1", "Choice", ""), PulseStatus::LogOnly);
        }
        assert_eq!(logger.full_records().len(), 10);
        assert!(
            logger
                .pulse_records()
                .iter()
                .filter(|r| r.event == "SampleOn")
                .all(|r| r.status == PulseStatus::Failed)
        );
        assert_eq!(logger.full_records()[0].details, "pulse=FAILED:4");
    }

    #[test]
    fn block_marker_drives_all_lines() {
        let sink = RecordingPulseSink::new();
        let mut logger = EventLogger::in_memory(codes(), PulseLine::hardware(Ok(sink.clone())));
        logger.log_event("T1", BLOCK_MARKER_EVENT, "end block 0");
        logger.log_event("T1", "Success", "");
        assert_eq!(sink.written(), vec![0xFF, 0x10]);
        assert_eq!(logger.full_records()[0].details, "end block 0;pulse=SENT:255");
    }

    #[test]
    fn deferred_event_is_stamped_on_next_tick() {
        let mut logger = EventLogger::in_memory(codes(), PulseLine::test_only());
        logger.advance(&frame(4, 10));
        logger.defer_event("T1", "SampleOn", "ids=[5]");
        assert!(logger.full_records().is_empty());
        assert!(logger.has_deferred());

        logger.advance(&frame(5, 10));
        let record = &logger.full_records()[0];
        assert_eq!(record.stamp.tick, 5);
        assert_eq!(record.details, "ids=[5];pulse=TEST_ONLY:4");
        assert_eq!(logger.pulse_records()[0].status, PulseStatus::TestOnly);
    }

    #[test]
    fn observers_see_every_event() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut logger = EventLogger::in_memory(codes(), PulseLine::test_only());
        logger.subscribe(move |trial: &str, event: &str| sink.borrow_mut().push(format!("{trial}:{event}")));

        logger.log_event("T1", "SampleOn", "");
        logger.log_event("T2", "Choice", "");
        assert_eq!(*seen.borrow(), vec!["T1:SampleOn", "T2:Choice"]);
    }

    #[test]
    fn files_get_fixed_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = EventLogger::create(dir.path(), "S01", "FL", codes(), PulseLine::test_only());
        logger.advance(&frame(1, 100));
        logger.log_event("T1", "SampleOn", "");
        logger.log_event("T1", "Choice", "");
        logger.flush();

        let full = std::fs::read_to_string(dir.path().join("S01_FL_full.csv")).unwrap();
        let pulse = std::fs::read_to_string(dir.path().join("S01_FL_pulse.csv")).unwrap();
        let full: Vec<&str> = full.lines().collect();
        let pulse: Vec<&str> = pulse.lines().collect();
        assert_eq!(full[0], FULL_LOG_HEADER);
        assert_eq!(full[1], "1,0.100000,0.100000,T1,SampleOn,pulse=TEST_ONLY:4");
        assert_eq!(full[2], "1,0.100000,0.100000,T1,Choice,");
        assert_eq!(pulse[0], PULSE_LOG_HEADER);
        assert_eq!(pulse[1], "1,0.100000,0.100000,T1,SampleOn,4");
        assert_eq!(pulse[2], "1,0.100000,0.100000,T1,Choice,");
    }

    #[test]
    fn unwritable_directory_does_not_stop_logging() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut logger = EventLogger::create(&missing, "S01", "FL", codes(), PulseLine::test_only());
        logger.log_event("T1", "SampleOn", "");
        assert_eq!(logger.full_records().len(), 1);
        assert_eq!(logger.pulse_records().len(), 1);
    }
}

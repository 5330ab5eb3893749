pub mod error;
pub mod logger;
pub mod pulse;
pub mod record;
pub mod sink;

pub use error::LogError;
pub use logger::{EventLogger, EventObserver};
pub use pulse::{
    DevicePulseSink, PulseCode, PulseCodeTable, PulseLine, PulseSink, PulseStatus,
    RecordingPulseSink, ThreadedPulseSink, pulse_byte,
};
pub use record::{FULL_LOG_HEADER, LogRecord, LogStamp, PULSE_LOG_HEADER, PulseRecord};
pub use sink::CsvLog;

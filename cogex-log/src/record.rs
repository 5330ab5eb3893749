use crate::pulse::PulseStatus;
use cogex_timing::Frame;
use std::time::Duration;

/// Column order is fixed; downstream tooling reads these files by position.
pub const FULL_LOG_HEADER: &str = "Tick,RenderTime,WallTime,TrialID,Event,Details";
pub const PULSE_LOG_HEADER: &str = "Tick,RenderTime,WallTime,TrialID,Event,Code";

/// Time stamp shared by every record written during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStamp {
    pub tick: u64,
    pub render_time: Duration,
    pub wall_time: Duration,
}

impl From<&Frame> for LogStamp {
    fn from(frame: &Frame) -> Self {
        Self {
            tick: frame.index,
            render_time: frame.render_time,
            wall_time: frame.wall_time,
        }
    }
}

impl LogStamp {
    fn csv_prefix(&self) -> String {
        format!(
            "{},{:.6},{:.6}",
            self.tick,
            self.render_time.as_secs_f64(),
            self.wall_time.as_secs_f64()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub stamp: LogStamp,
    pub trial_id: String,
    pub event: String,
    pub details: String,
}

impl LogRecord {
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{}",
            self.stamp.csv_prefix(),
            csv_field(&self.trial_id),
            csv_field(&self.event),
            csv_field(&self.details)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PulseRecord {
    pub stamp: LogStamp,
    pub trial_id: String,
    pub event: String,
    /// Byte driven on the line; `None` for events without a code.
    pub byte: Option<u8>,
    pub status: PulseStatus,
}

impl PulseRecord {
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{}",
            self.stamp.csv_prefix(),
            csv_field(&self.trial_id),
            csv_field(&self.event),
            self.byte.map(|b| b.to_string()).unwrap_or_default()
        )
    }
}

/// Quotes a field when it contains a separator, quote or newline.
pub fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_record_row_quotes_details() {
        let record = LogRecord {
            stamp: LogStamp {
                tick: 3,
                render_time: Duration::from_millis(250),
                wall_time: Duration::from_micros(1_500_001),
            },
            trial_id: "T1".into(),
            event: "SampleOn".into(),
            details: "a,b".into(),
        };
        assert_eq!(record.to_csv(), "3,0.250000,1.500001,T1,SampleOn,\"a,b\"");
    }

    #[test]
    fn pulse_row_leaves_code_empty_without_byte() {
        let record = PulseRecord {
            stamp: LogStamp::default(),
            trial_id: "T2".into(),
            event: "Fixation".into(),
            byte: None,
            status: PulseStatus::LogOnly,
        };
        assert_eq!(record.to_csv(), "0,0.000000,0.000000,T2,Fixation,");
    }
}

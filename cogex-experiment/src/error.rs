use cogex_core::PlacementMismatch;
use cogex_log::LogError;
use std::path::PathBuf;

/// Problems found in protocol, trial table or settings before a session starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("protocol has no states")]
    EmptyProtocol,

    #[error("state #{index} has an empty name")]
    EmptyStateName { index: usize },

    #[error("state `{name}` is defined more than once")]
    DuplicateStateName { name: String },

    #[error("state `{state}`: {reason}")]
    ConflictingFlags { state: String, reason: &'static str },

    #[error("state `{state}` is a timed delay but has no delay_seconds")]
    MissingDelay { state: String },

    #[error("state `{state}` has invalid delay {seconds} s")]
    InvalidDelay { state: String, seconds: f64 },

    #[error("state `{state}` emits a pulse but has no pulse_code")]
    MissingPulseCode { state: String },

    #[error("override for unknown state `{state}`")]
    UnknownOverride { state: String },

    #[error(transparent)]
    PulseCodes(#[from] LogError),

    #[error("trial table is empty")]
    EmptyTrialTable,

    #[error("trial row {row}: {source}")]
    MalformedRow {
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("trial row {row} ({trial_id}): state `{state}` has {source}")]
    PlacementMismatch {
        row: usize,
        trial_id: String,
        state: String,
        source: PlacementMismatch,
    },

    #[error("trial row {row} ({trial_id}): block {block} follows block {previous}")]
    BlockOrder {
        row: usize,
        trial_id: String,
        block: u32,
        previous: u32,
    },

    #[error("trial row {row}: trial id `{trial_id}` already used by row {first_row}")]
    DuplicateTrialId {
        row: usize,
        trial_id: String,
        first_row: usize,
    },

    #[error("trial row {row} ({trial_id}): no stimuli for stimulus state `{state}`")]
    MissingStimuli {
        row: usize,
        trial_id: String,
        state: String,
    },

    #[error("trial row {row} ({trial_id}): `{state}` is not a {expected} state of the protocol")]
    UnknownState {
        row: usize,
        trial_id: String,
        state: String,
        expected: &'static str,
    },

    #[error("setting `{field}` {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

use serde::{Deserialize, Serialize};

/// Event name reserved for block boundaries. Always driven as the all-high byte.
pub const BLOCK_MARKER_EVENT: &str = "StartEndBlock";

/// Highest pulse code; codes map onto the eight output lines.
pub const MAX_PULSE_CODE: u8 = 8;

/// One named phase of a protocol and the behaviour flags that drive it.
///
/// Definitions are authored once per experiment and never change while
/// trials run. Flags are independent; contradictory combinations are
/// rejected by the protocol compiler rather than here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    #[serde(default)]
    pub presents_stimulus: bool,
    #[serde(default)]
    pub clears_display: bool,
    #[serde(default)]
    pub awaits_choice: bool,
    #[serde(default)]
    pub delivers_feedback: bool,
    #[serde(default)]
    pub is_timed_delay: bool,
    #[serde(default)]
    pub emits_pulse: bool,
    /// Only read when `is_timed_delay` is set.
    #[serde(default)]
    pub delay_seconds: Option<f64>,
    /// Only read when `emits_pulse` is set.
    #[serde(default)]
    pub pulse_code: Option<u8>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            presents_stimulus: false,
            clears_display: false,
            awaits_choice: false,
            delivers_feedback: false,
            is_timed_delay: false,
            emits_pulse: false,
            delay_seconds: None,
            pulse_code: None,
        }
    }

    pub fn with_stimulus(mut self) -> Self {
        self.presents_stimulus = true;
        self
    }

    pub fn with_clear(mut self) -> Self {
        self.clears_display = true;
        self
    }

    pub fn with_choice(mut self) -> Self {
        self.awaits_choice = true;
        self
    }

    pub fn with_feedback(mut self) -> Self {
        self.delivers_feedback = true;
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.is_timed_delay = true;
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_pulse(mut self, code: u8) -> Self {
        self.emits_pulse = true;
        self.pulse_code = Some(code);
        self
    }

    /// Stimulus states log one tick late so the stamp matches the visible frame.
    pub fn logs_deferred(&self) -> bool {
        self.presents_stimulus
    }

    pub fn is_block_marker(&self) -> bool {
        self.name == BLOCK_MARKER_EVENT
    }
}

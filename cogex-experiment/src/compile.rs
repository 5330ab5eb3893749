//! Protocol compiler: turns a list of state definitions into executable steps.
//!
//! Each state becomes exactly one [`Step`] holding the ordered actions the
//! engine performs for it. Flag combinations that have no sensible meaning are
//! refused here so the engine never has to guess.

use crate::error::ConfigError;
use cogex_core::StateDefinition;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// When the state's log entry is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    Immediate,
    /// One scheduling tick after the request, when the stimulus is visible.
    DeferredOneTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Log,
    Present,
    ClearDisplay,
    AwaitChoice { timeout: Duration },
    Feedback { hold: Duration },
    Delay(Duration),
    YieldTick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub trigger: TriggerPolicy,
    pub pulse_code: Option<u8>,
    pub actions: Vec<Action>,
}

impl Step {
    pub fn presents_stimulus(&self) -> bool {
        self.actions.contains(&Action::Present)
    }

    pub fn awaits_choice(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::AwaitChoice { .. }))
    }

    pub fn delivers_feedback(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::Feedback { .. }))
    }
}

/// Compiler settings for one protocol instance.
#[derive(Debug, Clone)]
pub struct ProtocolCompiler {
    pub choice_timeout: Duration,
    pub feedback_duration: Duration,
    pub delay_overrides: BTreeMap<String, Duration>,
    pub choice_timeout_overrides: BTreeMap<String, Duration>,
}

impl Default for ProtocolCompiler {
    fn default() -> Self {
        Self {
            choice_timeout: Duration::from_millis(2000),
            feedback_duration: Duration::from_millis(500),
            delay_overrides: BTreeMap::new(),
            choice_timeout_overrides: BTreeMap::new(),
        }
    }
}

impl ProtocolCompiler {
    pub fn new(choice_timeout: Duration, feedback_duration: Duration) -> Self {
        Self {
            choice_timeout,
            feedback_duration,
            ..Self::default()
        }
    }

    pub fn with_delay_override(mut self, state: impl Into<String>, delay: Duration) -> Self {
        self.delay_overrides.insert(state.into(), delay);
        self
    }

    pub fn with_choice_timeout_override(mut self, state: impl Into<String>, timeout: Duration) -> Self {
        self.choice_timeout_overrides.insert(state.into(), timeout);
        self
    }

    pub fn compile(&self, protocol: &[StateDefinition]) -> Result<Vec<Step>, ConfigError> {
        if protocol.is_empty() {
            return Err(ConfigError::EmptyProtocol);
        }

        let mut names = HashSet::new();
        let mut codes: BTreeMap<u8, &str> = BTreeMap::new();
        for (index, state) in protocol.iter().enumerate() {
            if state.name.trim().is_empty() {
                return Err(ConfigError::EmptyStateName { index });
            }
            if !names.insert(state.name.as_str()) {
                return Err(ConfigError::DuplicateStateName {
                    name: state.name.clone(),
                });
            }
            if let (true, Some(code), false) = (state.emits_pulse, state.pulse_code, state.is_block_marker()) {
                if let Some(first) = codes.insert(code, &state.name) {
                    return Err(cogex_log::LogError::DuplicateCode {
                        code,
                        first: first.to_string(),
                        second: state.name.clone(),
                    }
                    .into());
                }
            }
        }
        for state in self.delay_overrides.keys().chain(self.choice_timeout_overrides.keys()) {
            if !names.contains(state.as_str()) {
                return Err(ConfigError::UnknownOverride { state: state.clone() });
            }
        }

        protocol.iter().map(|state| self.compile_state(state)).collect()
    }

    fn compile_state(&self, state: &StateDefinition) -> Result<Step, ConfigError> {
        let conflict = |reason| ConfigError::ConflictingFlags {
            state: state.name.clone(),
            reason,
        };
        if state.awaits_choice && state.is_timed_delay {
            return Err(conflict("awaits a choice and is a timed delay"));
        }
        if state.delivers_feedback && state.is_timed_delay {
            return Err(conflict("delivers feedback and is a timed delay"));
        }
        if state.presents_stimulus && state.clears_display {
            return Err(conflict("presents stimuli and clears the display"));
        }

        let pulse_code = if state.emits_pulse {
            let code = state.pulse_code.ok_or_else(|| ConfigError::MissingPulseCode {
                state: state.name.clone(),
            })?;
            if cogex_log::pulse_byte(code).is_none() {
                return Err(cogex_log::LogError::CodeOutOfRange {
                    event: state.name.clone(),
                    code,
                }
                .into());
            }
            Some(code)
        } else {
            None
        };

        let settle = if state.is_timed_delay {
            Action::Delay(self.resolve_delay(state)?)
        } else {
            Action::YieldTick
        };

        let interactive = state.awaits_choice || state.delivers_feedback;
        let mut actions = Vec::with_capacity(4);
        actions.push(if state.presents_stimulus {
            Action::Present
        } else {
            Action::Log
        });
        let trigger = if state.logs_deferred() {
            TriggerPolicy::DeferredOneTick
        } else {
            TriggerPolicy::Immediate
        };
        if state.clears_display && !interactive {
            actions.push(Action::ClearDisplay);
        }
        if state.awaits_choice {
            let timeout = self
                .choice_timeout_overrides
                .get(&state.name)
                .copied()
                .unwrap_or(self.choice_timeout);
            actions.push(Action::AwaitChoice { timeout });
        }
        if state.delivers_feedback {
            actions.push(Action::Feedback {
                hold: self.feedback_duration,
            });
        }
        if state.clears_display && interactive {
            actions.push(Action::ClearDisplay);
        }
        actions.push(settle);

        Ok(Step {
            name: state.name.clone(),
            trigger,
            pulse_code,
            actions,
        })
    }

    fn resolve_delay(&self, state: &StateDefinition) -> Result<Duration, ConfigError> {
        if let Some(delay) = self.delay_overrides.get(&state.name) {
            return Ok(*delay);
        }
        let seconds = state.delay_seconds.ok_or_else(|| ConfigError::MissingDelay {
            state: state.name.clone(),
        })?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ConfigError::InvalidDelay {
                state: state.name.clone(),
                seconds,
            });
        }
        Ok(Duration::from_secs_f64(seconds))
    }
}

/// Compiles with default timeouts and no overrides.
pub fn compile(protocol: &[StateDefinition]) -> Result<Vec<Step>, ConfigError> {
    ProtocolCompiler::default().compile(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogex_core::BLOCK_MARKER_EVENT;

    fn protocol() -> Vec<StateDefinition> {
        vec![
            StateDefinition::new("Fixation").with_delay(0.5).with_pulse(1),
            StateDefinition::new("SampleOn").with_stimulus().with_pulse(2),
            StateDefinition::new("Blank").with_clear(),
            StateDefinition::new("Choice").with_choice().with_feedback().with_clear(),
            StateDefinition::new("ITI").with_delay(1.0),
        ]
    }

    #[test]
    fn one_step_per_state_in_order() {
        let steps = compile(&protocol()).unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Fixation", "SampleOn", "Blank", "Choice", "ITI"]);
    }

    #[test]
    fn flags_resolve_to_actions() {
        let steps = ProtocolCompiler::new(Duration::from_secs(3), Duration::from_millis(400))
            .compile(&protocol())
            .unwrap();

        assert_eq!(steps[0].actions, [Action::Log, Action::Delay(Duration::from_millis(500))]);
        assert_eq!(steps[1].trigger, TriggerPolicy::DeferredOneTick);
        assert_eq!(steps[1].actions, [Action::Present, Action::YieldTick]);
        assert_eq!(steps[2].actions, [Action::Log, Action::ClearDisplay, Action::YieldTick]);
        assert_eq!(
            steps[3].actions,
            [
                Action::Log,
                Action::AwaitChoice {
                    timeout: Duration::from_secs(3)
                },
                Action::Feedback {
                    hold: Duration::from_millis(400)
                },
                Action::ClearDisplay,
                Action::YieldTick,
            ]
        );
        assert_eq!(steps[3].pulse_code, None);
    }

    #[test]
    fn overrides_replace_configured_durations() {
        let steps = ProtocolCompiler::default()
            .with_delay_override("ITI", Duration::from_millis(250))
            .with_choice_timeout_override("Choice", Duration::from_secs(10))
            .compile(&protocol())
            .unwrap();
        assert_eq!(steps[4].actions.last(), Some(&Action::Delay(Duration::from_millis(250))));
        assert!(steps[3].actions.contains(&Action::AwaitChoice {
            timeout: Duration::from_secs(10)
        }));
    }

    #[test]
    fn choice_and_delay_is_rejected() {
        let err = compile(&[StateDefinition::new("Bad").with_choice().with_delay(1.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFlags { ref state, .. } if state == "Bad"));
    }

    #[test]
    fn malformed_states_are_rejected() {
        let mut no_delay = StateDefinition::new("Wait");
        no_delay.is_timed_delay = true;
        assert!(matches!(compile(&[no_delay]), Err(ConfigError::MissingDelay { .. })));

        let negative = StateDefinition::new("Wait").with_delay(-1.0);
        assert!(matches!(compile(&[negative]), Err(ConfigError::InvalidDelay { .. })));

        let mut no_code = StateDefinition::new("Mark");
        no_code.emits_pulse = true;
        assert!(matches!(compile(&[no_code]), Err(ConfigError::MissingPulseCode { .. })));

        let wide = StateDefinition::new("Mark").with_pulse(12);
        assert!(matches!(compile(&[wide]), Err(ConfigError::PulseCodes(_))));

        let dupes = [StateDefinition::new("A"), StateDefinition::new("A")];
        assert!(matches!(compile(&dupes), Err(ConfigError::DuplicateStateName { .. })));

        assert!(matches!(compile(&[]), Err(ConfigError::EmptyProtocol)));
    }

    #[test]
    fn pulse_codes_must_be_unique_except_block_marker() {
        let clash = [
            StateDefinition::new("A").with_pulse(3),
            StateDefinition::new("B").with_pulse(3),
        ];
        assert!(matches!(compile(&clash), Err(ConfigError::PulseCodes(_))));

        let marker = [
            StateDefinition::new("A").with_pulse(3),
            StateDefinition::new(BLOCK_MARKER_EVENT).with_pulse(3),
        ];
        assert!(compile(&marker).is_ok());
    }

    #[test]
    fn override_for_unknown_state_is_rejected() {
        let err = ProtocolCompiler::default()
            .with_delay_override("Nope", Duration::from_secs(1))
            .compile(&protocol())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOverride { .. }));
    }
}

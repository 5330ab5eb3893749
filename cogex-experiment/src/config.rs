use crate::compile::{ProtocolCompiler, Step};
use crate::error::ConfigError;
use cogex_core::{Placement, StateDefinition, StimulusId, StimulusSet, TrialRow};
use cogex_log::PulseCodeTable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "snake_case")]
pub enum InputConfig {
    Click,
    Dwell { dwell_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseMode {
    Hardware,
    TestOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub mode: PulseMode,
    pub port: Option<PathBuf>,
    pub baud: u32,
    pub write_timeout_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            mode: PulseMode::TestOnly,
            port: None,
            baud: 115_200,
            write_timeout_ms: 50,
        }
    }
}

/// Session and task settings, read once at scene entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub session_id: String,
    pub task: String,
    pub choice_timeout_ms: u64,
    pub feedback_duration_ms: u64,
    pub points_per_correct: i64,
    pub points_per_wrong: i64,
    pub block_pause: bool,
    pub frame_rate_hz: f64,
    pub time_scale: f64,
    pub operator_pause_label: String,
    pub input: InputConfig,
    pub pulse: PulseConfig,
    /// Pulse codes for events that are not protocol states (`Success`, `Fail`, ...).
    pub event_codes: BTreeMap<String, u8>,
    pub delay_overrides_ms: BTreeMap<String, u64>,
    pub choice_timeout_overrides_ms: BTreeMap<String, u64>,
    pub output_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            session_id: "session".into(),
            task: "task".into(),
            choice_timeout_ms: 2000,
            feedback_duration_ms: 500,
            points_per_correct: 1,
            points_per_wrong: -1,
            block_pause: true,
            frame_rate_hz: 60.0,
            time_scale: 1.0,
            operator_pause_label: "Paused".into(),
            input: InputConfig::Click,
            pulse: PulseConfig::default(),
            event_codes: BTreeMap::new(),
            delay_overrides_ms: BTreeMap::new(),
            choice_timeout_overrides_ms: BTreeMap::new(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame_rate_hz.is_finite() && self.frame_rate_hz > 0.0) {
            return Err(ConfigError::InvalidSetting {
                field: "frame_rate_hz",
                reason: format!("must be positive, got {}", self.frame_rate_hz),
            });
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(ConfigError::InvalidSetting {
                field: "time_scale",
                reason: format!("must be positive, got {}", self.time_scale),
            });
        }
        if self.task.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                field: "task",
                reason: "must not be empty".into(),
            });
        }
        if self.pulse.mode == PulseMode::Hardware && self.pulse.port.is_none() {
            return Err(ConfigError::InvalidSetting {
                field: "pulse.port",
                reason: "hardware mode needs a port".into(),
            });
        }
        if let InputConfig::Dwell { dwell_ms: 0 } = self.input {
            return Err(ConfigError::InvalidSetting {
                field: "input.dwell_ms",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn compiler(&self) -> ProtocolCompiler {
        let mut compiler = ProtocolCompiler::new(
            Duration::from_millis(self.choice_timeout_ms),
            Duration::from_millis(self.feedback_duration_ms),
        );
        for (state, ms) in &self.delay_overrides_ms {
            compiler = compiler.with_delay_override(state.clone(), Duration::from_millis(*ms));
        }
        for (state, ms) in &self.choice_timeout_overrides_ms {
            compiler = compiler.with_choice_timeout_override(state.clone(), Duration::from_millis(*ms));
        }
        compiler
    }

    pub fn pulse_codes(&self, protocol: &[StateDefinition]) -> Result<PulseCodeTable, ConfigError> {
        let events = self.event_codes.iter().map(|(name, code)| (name.as_str(), *code));
        Ok(PulseCodeTable::build(protocol, events)?)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            points_per_correct: self.points_per_correct,
            points_per_wrong: self.points_per_wrong,
            block_pause: self.block_pause,
            operator_pause_label: self.operator_pause_label.clone(),
        }
    }
}

/// Runtime knobs the engine reads while trials run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub points_per_correct: i64,
    pub points_per_wrong: i64,
    pub block_pause: bool,
    pub operator_pause_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        ExperimentConfig::default().engine_settings()
    }
}

#[derive(Deserialize)]
struct ProtocolFile {
    states: Vec<StateDefinition>,
}

pub fn load_protocol(path: impl AsRef<Path>) -> Result<Vec<StateDefinition>, ConfigError> {
    let file: ProtocolFile = read_json(path.as_ref())?;
    Ok(file.states)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStimuli {
    ids: Vec<StimulusId>,
    placements: Vec<Placement>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrialRow {
    trial_id: String,
    block: u32,
    #[serde(default)]
    stimuli: BTreeMap<String, RawStimuli>,
    #[serde(default)]
    correct: BTreeMap<String, Vec<StimulusId>>,
}

/// Loads the trial table and checks it against the compiled protocol.
pub fn load_trials(path: impl AsRef<Path>, steps: &[Step]) -> Result<Vec<TrialRow>, ConfigError> {
    let rows: Vec<serde_json::Value> = read_json(path.as_ref())?;
    parse_trials(rows, steps)
}

/// Parses rows one at a time so an error names the offending row.
pub fn parse_trials(rows: Vec<serde_json::Value>, steps: &[Step]) -> Result<Vec<TrialRow>, ConfigError> {
    let mut trials = Vec::with_capacity(rows.len());
    for (row, value) in rows.into_iter().enumerate() {
        let raw: RawTrialRow =
            serde_json::from_value(value).map_err(|source| ConfigError::MalformedRow { row, source })?;
        let mut trial = TrialRow::new(raw.trial_id, raw.block);
        for (state, stimuli) in raw.stimuli {
            let set = StimulusSet::new(stimuli.ids, stimuli.placements).map_err(|source| {
                ConfigError::PlacementMismatch {
                    row,
                    trial_id: trial.trial_id.clone(),
                    state: state.clone(),
                    source,
                }
            })?;
            trial.stimuli.insert(state, set);
        }
        trial.correct = raw.correct;
        trials.push(trial);
    }
    validate_trials(&trials, steps)?;
    Ok(trials)
}

/// Table-level checks shared by the loader and engine construction.
pub fn validate_trials(trials: &[TrialRow], steps: &[Step]) -> Result<(), ConfigError> {
    if trials.is_empty() {
        return Err(ConfigError::EmptyTrialTable);
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut previous_block = None;
    for (row, trial) in trials.iter().enumerate() {
        if let Some(&first_row) = seen.get(trial.trial_id.as_str()) {
            return Err(ConfigError::DuplicateTrialId {
                row,
                trial_id: trial.trial_id.clone(),
                first_row,
            });
        }
        seen.insert(&trial.trial_id, row);

        if let Some(previous) = previous_block {
            if trial.block < previous {
                return Err(ConfigError::BlockOrder {
                    row,
                    trial_id: trial.trial_id.clone(),
                    block: trial.block,
                    previous,
                });
            }
        }
        previous_block = Some(trial.block);

        for step in steps.iter().filter(|s| s.presents_stimulus()) {
            if trial.stimuli_for(&step.name).is_none() {
                return Err(ConfigError::MissingStimuli {
                    row,
                    trial_id: trial.trial_id.clone(),
                    state: step.name.clone(),
                });
            }
        }
        for state in trial.stimuli.keys() {
            if !steps.iter().any(|s| &s.name == state && s.presents_stimulus()) {
                return Err(ConfigError::UnknownState {
                    row,
                    trial_id: trial.trial_id.clone(),
                    state: state.clone(),
                    expected: "stimulus",
                });
            }
        }
        for state in trial.correct.keys() {
            if !steps
                .iter()
                .any(|s| &s.name == state && (s.awaits_choice() || s.delivers_feedback()))
            {
                return Err(ConfigError::UnknownState {
                    row,
                    trial_id: trial.trial_id.clone(),
                    state: state.clone(),
                    expected: "choice or feedback",
                });
            }
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use serde_json::json;

    fn steps() -> Vec<Step> {
        compile(&[
            StateDefinition::new("SampleOn").with_stimulus(),
            StateDefinition::new("Choice").with_choice().with_feedback(),
        ])
        .unwrap()
    }

    fn row(id: &str, block: u32) -> serde_json::Value {
        json!({
            "trial_id": id,
            "block": block,
            "stimuli": { "SampleOn": { "ids": [5], "placements": [[0, 0, 0]] } },
            "correct": { "Choice": [5] }
        })
    }

    #[test]
    fn well_formed_rows_load() {
        let trials = parse_trials(vec![row("T1", 0), row("T2", 0), row("T3", 1)], &steps()).unwrap();
        assert_eq!(trials.len(), 3);
        assert_eq!(trials[2].block, 1);
        assert_eq!(trials[0].stimuli_for("SampleOn").unwrap().ids(), &[5]);
        assert_eq!(trials[0].correct_stimulus_ids("Choice"), &[5]);
    }

    #[test]
    fn placement_mismatch_names_the_row() {
        let mut bad = row("T2", 0);
        bad["stimuli"]["SampleOn"]["ids"] = json!([5, 6]);
        let err = parse_trials(vec![row("T1", 0), bad], &steps()).unwrap_err();
        match err {
            ConfigError::PlacementMismatch { row, trial_id, state, source } => {
                assert_eq!((row, trial_id.as_str(), state.as_str()), (1, "T2", "SampleOn"));
                assert_eq!((source.ids, source.placements), (2, 1));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn decreasing_block_is_rejected() {
        let err = parse_trials(vec![row("T1", 2), row("T2", 1)], &steps()).unwrap_err();
        assert!(matches!(err, ConfigError::BlockOrder { row: 1, block: 1, previous: 2, .. }));
    }

    #[test]
    fn duplicate_trial_id_is_rejected() {
        let err = parse_trials(vec![row("T1", 0), row("T1", 0)], &steps()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrialId { row: 1, first_row: 0, .. }));
    }

    #[test]
    fn malformed_row_is_reported_not_skipped() {
        let err = parse_trials(vec![row("T1", 0), json!({ "trial_id": "T2" })], &steps()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn missing_and_unknown_states_are_rejected() {
        let mut missing = row("T1", 0);
        missing["stimuli"] = json!({});
        assert!(matches!(
            parse_trials(vec![missing], &steps()),
            Err(ConfigError::MissingStimuli { .. })
        ));

        let mut typo = row("T1", 0);
        typo["correct"] = json!({ "Choise": [5] });
        assert!(matches!(
            parse_trials(vec![typo], &steps()),
            Err(ConfigError::UnknownState { .. })
        ));

        assert!(matches!(parse_trials(vec![], &steps()), Err(ConfigError::EmptyTrialTable)));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: ExperimentConfig = serde_json::from_value(json!({
            "task": "FL",
            "input": { "modality": "dwell", "dwell_ms": 800 },
            "pulse": { "mode": "hardware", "port": "/dev/ttyUSB0" }
        }))
        .unwrap();
        assert_eq!(config.choice_timeout_ms, 2000);
        assert_eq!(config.input, InputConfig::Dwell { dwell_ms: 800 });
        assert_eq!(config.pulse.mode, PulseMode::Hardware);
        assert_eq!(config.pulse.baud, 115_200);
        config.validate().unwrap();
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let config = ExperimentConfig {
            time_scale: 0.0,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { field: "time_scale", .. })
        ));
    }

    #[test]
    fn files_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let protocol = dir.path().join("protocol.json");
        let trials = dir.path().join("trials.json");
        std::fs::write(
            &protocol,
            r#"{ "states": [ { "name": "SampleOn", "presents_stimulus": true },
                             { "name": "Choice", "awaits_choice": true, "delivers_feedback": true } ] }"#,
        )
        .unwrap();
        std::fs::write(&trials, serde_json::to_string(&vec![row("T1", 0)]).unwrap()).unwrap();

        let states = load_protocol(&protocol).unwrap();
        let steps = compile(&states).unwrap();
        assert_eq!(load_trials(&trials, &steps).unwrap().len(), 1);
        assert!(matches!(
            load_protocol(dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}

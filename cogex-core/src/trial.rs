use crate::stimulus::{Placement, StimulusId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Stimulus ids and placements for one state of one trial.
///
/// The two arrays always have the same length; a mismatch is refused at
/// construction instead of being truncated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawStimulusSet")]
pub struct StimulusSet {
    ids: Vec<StimulusId>,
    placements: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{ids} stimulus ids but {placements} placements")]
pub struct PlacementMismatch {
    pub ids: usize,
    pub placements: usize,
}

#[derive(Deserialize)]
struct RawStimulusSet {
    ids: Vec<StimulusId>,
    placements: Vec<Placement>,
}

impl TryFrom<RawStimulusSet> for StimulusSet {
    type Error = PlacementMismatch;

    fn try_from(raw: RawStimulusSet) -> Result<Self, Self::Error> {
        StimulusSet::new(raw.ids, raw.placements)
    }
}

impl StimulusSet {
    pub fn new(ids: Vec<StimulusId>, placements: Vec<Placement>) -> Result<Self, PlacementMismatch> {
        if ids.len() != placements.len() {
            return Err(PlacementMismatch {
                ids: ids.len(),
                placements: placements.len(),
            });
        }
        Ok(Self { ids, placements })
    }

    pub fn ids(&self) -> &[StimulusId] {
        &self.ids
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Compact description for log details, e.g. `ids=[5];placements=[(0,0,0)]`.
    pub fn describe(&self) -> String {
        let ids: Vec<String> = self.ids.iter().map(|id| id.to_string()).collect();
        let placements: Vec<String> = self.placements.iter().map(|p| p.to_string()).collect();
        format!("ids=[{}];placements=[{}]", ids.join(" "), placements.join(" "))
    }
}

/// One row of the trial table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    pub trial_id: String,
    pub block: u32,
    /// Stimuli per stimulus-presenting state name.
    #[serde(default)]
    pub stimuli: BTreeMap<String, StimulusSet>,
    /// Correct stimulus ids per choice or feedback state name.
    #[serde(default)]
    pub correct: BTreeMap<String, Vec<StimulusId>>,
}

impl TrialRow {
    pub fn new(trial_id: impl Into<String>, block: u32) -> Self {
        Self {
            trial_id: trial_id.into(),
            block,
            stimuli: BTreeMap::new(),
            correct: BTreeMap::new(),
        }
    }

    pub fn with_stimuli(mut self, state: impl Into<String>, set: StimulusSet) -> Self {
        self.stimuli.insert(state.into(), set);
        self
    }

    pub fn with_correct(mut self, state: impl Into<String>, ids: Vec<StimulusId>) -> Self {
        self.correct.insert(state.into(), ids);
        self
    }

    pub fn stimuli_for(&self, state: &str) -> Option<&StimulusSet> {
        self.stimuli.get(state)
    }

    /// Empty when nothing is configured for `state`.
    pub fn correct_stimulus_ids(&self, state: &str) -> &[StimulusId] {
        self.correct.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_correct_entry(&self, state: &str) -> bool {
        self.correct.contains_key(state)
    }
}

/// What the response collector saw for one choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceOutcome {
    pub selected: Option<StimulusId>,
    pub reaction_time: Duration,
}

impl ChoiceOutcome {
    pub fn answered(selected: StimulusId, reaction_time: Duration) -> Self {
        Self {
            selected: Some(selected),
            reaction_time,
        }
    }

    pub fn unanswered(reaction_time: Duration) -> Self {
        Self {
            selected: None,
            reaction_time,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }

    /// Selected id as written to the logs; `-1` when nothing was selected.
    pub fn selected_code(&self) -> i64 {
        self.selected.map_or(-1, i64::from)
    }

    pub fn reaction_time_ms(&self) -> f64 {
        self.reaction_time.as_nanos() as f64 / 1e6
    }
}

/// Recorded result per completed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub trial_id: String,
    pub block: u32,
    pub correct: bool,
    /// `None` when the choice timed out or was never collected.
    pub reaction_time_ms: Option<f64>,
}

impl TrialResult {
    pub fn timed_out(&self) -> bool {
        self.reaction_time_ms.is_none()
    }
}

//! Collaborators that run without a display: used by dry runs, benches and tests.

use crate::collaborators::{FeedbackPresenter, PausePresenter, PauseRequest, SceneProbe, StimulusPresenter};
use crate::response::{InputSample, PointerSource};
use cogex_core::{Placement, ScreenPoint, StimulusHandle, StimulusId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// Presenter that keeps an in-memory scene and hit-tests by distance.
#[derive(Debug, Clone, Default)]
pub struct RecordingScene {
    hit_radius: f32,
    next_slot: usize,
    on_screen: Vec<StimulusHandle>,
    presented: Vec<StimulusHandle>,
    clears: usize,
}

impl RecordingScene {
    pub fn new(hit_radius: f32) -> Self {
        Self {
            hit_radius,
            ..Self::default()
        }
    }

    /// Every handle ever presented, in order.
    pub fn presented(&self) -> &[StimulusHandle] {
        &self.presented
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl SceneProbe for RecordingScene {
    fn target_at(&self, point: ScreenPoint) -> Option<StimulusHandle> {
        self.on_screen
            .iter()
            .map(|h| (h, h.placement.screen_point().distance(point)))
            .filter(|(_, d)| *d <= self.hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(h, _)| h.clone())
    }

    fn on_screen(&self) -> &[StimulusHandle] {
        &self.on_screen
    }
}

impl StimulusPresenter for RecordingScene {
    fn present(&mut self, ids: &[StimulusId], placements: &[Placement]) -> Vec<StimulusHandle> {
        let handles: Vec<StimulusHandle> = ids
            .iter()
            .zip(placements)
            .map(|(&id, &placement)| {
                let slot = self.next_slot;
                self.next_slot += 1;
                StimulusHandle::new(slot, id, placement)
            })
            .collect();
        self.on_screen.extend(handles.iter().cloned());
        self.presented.extend(handles.iter().cloned());
        handles
    }

    fn clear_all(&mut self) {
        self.on_screen.clear();
        self.clears += 1;
    }
}

/// Feedback presenter that only remembers what it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingFeedback {
    pub flashes: Vec<(StimulusId, bool)>,
    pub rewards: Vec<i64>,
    pub penalties: Vec<i64>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackPresenter for RecordingFeedback {
    fn flash(&mut self, handle: &StimulusHandle, correct: bool) {
        debug!("flash stimulus {} ({})", handle.id, if correct { "correct" } else { "wrong" });
        self.flashes.push((handle.id, correct));
    }

    fn award_reward(&mut self, amount: i64, anchor: Placement) {
        debug!("reward {} at {}", amount, anchor);
        self.rewards.push(amount);
    }

    fn penalize(&mut self, amount: i64) {
        debug!("penalty {}", amount);
        self.penalties.push(amount);
    }
}

/// Pause screen that resumes by itself after a number of polls.
#[derive(Debug, Clone, Default)]
pub struct AutoResumePause {
    hold_ticks: u32,
    remaining: u32,
    pub requests: Vec<PauseRequest>,
}

impl AutoResumePause {
    pub fn new(hold_ticks: u32) -> Self {
        Self {
            hold_ticks,
            ..Self::default()
        }
    }
}

impl PausePresenter for AutoResumePause {
    fn show_pause(&mut self, request: &PauseRequest) {
        self.requests.push(request.clone());
        self.remaining = self.hold_ticks;
    }

    fn is_resumed(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}

/// A simulated subject for dry runs.
///
/// For each choice window it draws a reaction time and, unless it decides to
/// miss, points at a random on-screen stimulus and keeps selecting it.
pub struct SimulatedSubject {
    rng: StdRng,
    reaction_ms: (u64, u64),
    miss_rate: f64,
    remaining: Option<Duration>,
    target: Option<ScreenPoint>,
}

impl SimulatedSubject {
    pub fn new(seed: u64, reaction_ms: (u64, u64), miss_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            reaction_ms,
            miss_rate: if miss_rate.is_nan() { 0.0 } else { miss_rate.clamp(0.0, 1.0) },
            remaining: None,
            target: None,
        }
    }
}

impl PointerSource for SimulatedSubject {
    fn reset(&mut self) {
        self.target = None;
        self.remaining = if self.rng.random_bool(self.miss_rate) {
            None
        } else {
            let (lo, hi) = self.reaction_ms;
            Some(Duration::from_millis(self.rng.random_range(lo..=hi.max(lo))))
        };
    }

    fn sample(&mut self, dt: Duration, scene: &dyn SceneProbe) -> InputSample {
        let Some(remaining) = self.remaining else {
            return InputSample::idle();
        };
        let remaining = remaining.saturating_sub(dt);
        self.remaining = Some(remaining);
        if !remaining.is_zero() {
            return InputSample::idle();
        }
        if self.target.is_none() {
            let targets = scene.on_screen();
            if targets.is_empty() {
                return InputSample::idle();
            }
            let pick = self.rng.random_range(0..targets.len());
            self.target = Some(targets[pick].placement.screen_point());
        }
        self.target.map(InputSample::click).unwrap_or_default()
    }
}

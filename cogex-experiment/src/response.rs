//! Response collection: a pointer-like source selecting one presented target.
//!
//! [`ResponseCollector`] owns the timeout arithmetic. The modality behind it
//! decides what counts as a selection on a given tick: a click
//! ([`ClickModality`]) or sustained hover ([`DwellModality`]).

use crate::collaborators::SceneProbe;
use cogex_core::{ChoiceOutcome, ScreenPoint, StimulusHandle};
use std::collections::VecDeque;
use std::time::Duration;

/// One tick of pointer or gaze input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    pub position: Option<ScreenPoint>,
    /// Discrete selection signal (click, button press) on this tick.
    pub selection_pulse: bool,
}

impl InputSample {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn hover(point: ScreenPoint) -> Self {
        Self {
            position: Some(point),
            selection_pulse: false,
        }
    }

    pub fn click(point: ScreenPoint) -> Self {
        Self {
            position: Some(point),
            selection_pulse: true,
        }
    }
}

/// Screen-space position source. Calibration happens before samples get here.
pub trait PointerSource {
    /// Called when a new choice window opens.
    fn reset(&mut self) {}
    fn sample(&mut self, dt: Duration, scene: &dyn SceneProbe) -> InputSample;
}

impl<T: PointerSource + ?Sized> PointerSource for Box<T> {
    fn reset(&mut self) {
        (**self).reset()
    }
    fn sample(&mut self, dt: Duration, scene: &dyn SceneProbe) -> InputSample {
        (**self).sample(dt, scene)
    }
}

/// Decides whether a selection was made on this tick.
pub trait InputModality {
    fn begin(&mut self) {}
    fn poll(&mut self, dt: Duration, scene: &dyn SceneProbe) -> Option<StimulusHandle>;
}

impl<T: InputModality + ?Sized> InputModality for Box<T> {
    fn begin(&mut self) {
        (**self).begin()
    }
    fn poll(&mut self, dt: Duration, scene: &dyn SceneProbe) -> Option<StimulusHandle> {
        (**self).poll(dt, scene)
    }
}

/// A selection is a pulse while the pointer is over a target.
pub struct ClickModality<S> {
    source: S,
}

impl<S: PointerSource> ClickModality<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: PointerSource> InputModality for ClickModality<S> {
    fn begin(&mut self) {
        self.source.reset();
    }

    fn poll(&mut self, dt: Duration, scene: &dyn SceneProbe) -> Option<StimulusHandle> {
        let sample = self.source.sample(dt, scene);
        if !sample.selection_pulse {
            return None;
        }
        sample.position.and_then(|p| scene.target_at(p))
    }
}

/// A selection is `dwell` of continuous hover over the same target.
///
/// Hover time starts at zero on the tick a new target is entered and resets
/// the moment the hovered target changes or is lost.
pub struct DwellModality<S> {
    source: S,
    dwell: Duration,
    hovered: Option<StimulusHandle>,
    hover_time: Duration,
}

impl<S: PointerSource> DwellModality<S> {
    pub fn new(source: S, dwell: Duration) -> Self {
        Self {
            source,
            dwell,
            hovered: None,
            hover_time: Duration::ZERO,
        }
    }

    pub fn hover_time(&self) -> Duration {
        self.hover_time
    }
}

impl<S: PointerSource> InputModality for DwellModality<S> {
    fn begin(&mut self) {
        self.source.reset();
        self.hovered = None;
        self.hover_time = Duration::ZERO;
    }

    fn poll(&mut self, dt: Duration, scene: &dyn SceneProbe) -> Option<StimulusHandle> {
        let sample = self.source.sample(dt, scene);
        let target = sample.position.and_then(|p| scene.target_at(p));
        let same = match (&self.hovered, &target) {
            (Some(a), Some(b)) => a.slot == b.slot,
            _ => false,
        };
        if same {
            self.hover_time += dt;
        } else {
            self.hovered = target;
            self.hover_time = Duration::ZERO;
        }
        if self.hovered.is_some() && self.hover_time >= self.dwell {
            self.hover_time = Duration::ZERO;
            return self.hovered.take();
        }
        None
    }
}

/// Timeout bookkeeping for one choice window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCollector {
    timeout: Duration,
    elapsed: Duration,
}

impl ResponseCollector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            elapsed: Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Advances the window by one tick.
    ///
    /// Returns the outcome once a target is selected or the timeout is
    /// reached. Reaction time never exceeds the timeout; a timeout reports
    /// exactly the timeout.
    pub fn poll<I: InputModality + ?Sized>(
        &mut self,
        dt: Duration,
        input: &mut I,
        scene: &dyn SceneProbe,
    ) -> Option<ChoiceOutcome> {
        self.elapsed += dt;
        if let Some(hit) = input.poll(dt, scene) {
            return Some(ChoiceOutcome::answered(hit.id, self.elapsed.min(self.timeout)));
        }
        if self.elapsed >= self.timeout {
            return Some(ChoiceOutcome::unanswered(self.timeout));
        }
        None
    }
}

/// Replays a fixed list of samples, then stays idle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPointer {
    samples: VecDeque<InputSample>,
}

impl ScriptedPointer {
    pub fn new(samples: impl IntoIterator<Item = InputSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// `idle_ticks` idle samples followed by a click at `point`.
    pub fn click_after(idle_ticks: usize, point: ScreenPoint) -> Self {
        let mut samples = vec![InputSample::idle(); idle_ticks];
        samples.push(InputSample::click(point));
        Self::new(samples)
    }

    pub fn push(&mut self, sample: InputSample) {
        self.samples.push_back(sample);
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl PointerSource for ScriptedPointer {
    fn sample(&mut self, _dt: Duration, _scene: &dyn SceneProbe) -> InputSample {
        self.samples.pop_front().unwrap_or_default()
    }
}

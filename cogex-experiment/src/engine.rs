//! Trial execution engine.
//!
//! The engine interprets compiled [`Step`]s trial by trial on a single
//! timeline. Nothing blocks: every suspension is a [`Wait`] value that the
//! driver advances once per [`Frame`] through [`TrialEngine::tick`]. A pause
//! request is only honoured while a wait is pending, so a step's actions are
//! never split across a pause.

use crate::collaborators::{
    Collaborators, FeedbackPresenter, PausePresenter, PauseRequest, StimulusPresenter,
};
use crate::compile::{Action, Step, TriggerPolicy};
use crate::config::{EngineSettings, validate_trials};
use crate::error::ConfigError;
use crate::response::{InputModality, ResponseCollector};
use crate::session::TaskReport;
use crate::summary::{TaskSummary, TrialDetail, summarize, trial_details};
use cogex_core::{
    BLOCK_MARKER_EVENT, ChoiceOutcome, EngineCursor, PauseHandle, StimulusHandle, StimulusId, TrialResult,
    TrialRow,
};
use cogex_log::EventLogger;
use cogex_timing::Frame;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ALL_TRIALS_COMPLETE_EVENT: &str = "AllTrialsComplete";
pub const SUCCESS_EVENT: &str = "Success";
pub const FAIL_EVENT: &str = "Fail";
pub const TIMEOUT_EVENT: &str = "Timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Running,
    Paused,
    Finished,
}

/// Where execution continues once the pending wait completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeginTrial,
    Action { step: usize, action: usize },
    EndTrial,
    EndSession,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
enum Wait {
    Tick,
    Timed { elapsed: Duration, duration: Duration },
    Choice(ResponseCollector),
    Pause { then: AfterPause },
}

#[derive(Debug, Clone, PartialEq)]
enum AfterPause {
    /// Operator pause: continue the interrupted wait with its elapsed time intact.
    Restore(Box<Wait>),
    BlockResumed,
    SessionEnded,
}

/// Per-trial scratch state, reset when a trial begins.
#[derive(Debug, Default)]
struct TrialProgress {
    presented: Vec<StimulusHandle>,
    choice_state: Option<String>,
    outcome: Option<ChoiceOutcome>,
    correct: Option<bool>,
}

pub struct TrialEngine<S, F, P, I> {
    steps: Vec<Step>,
    trials: Vec<TrialRow>,
    settings: EngineSettings,
    collaborators: Collaborators<S, F, P, I>,
    logger: EventLogger,
    cursor: EngineCursor,
    total_blocks: usize,
    position: Position,
    wait: Option<Wait>,
    trial: TrialProgress,
    results: Vec<TrialResult>,
}

impl<S, F, P, I> TrialEngine<S, F, P, I>
where
    S: StimulusPresenter,
    F: FeedbackPresenter,
    P: PausePresenter,
    I: InputModality,
{
    pub fn new(
        steps: Vec<Step>,
        trials: Vec<TrialRow>,
        settings: EngineSettings,
        collaborators: Collaborators<S, F, P, I>,
        mut logger: EventLogger,
    ) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptyProtocol);
        }
        validate_trials(&trials, &steps)?;
        for step in &steps {
            if let Some(code) = step.pulse_code {
                logger.ensure_code(&step.name, code)?;
            }
        }
        let total_blocks = trials.iter().map(|t| t.block).collect::<BTreeSet<_>>().len();
        info!(
            "engine ready: {} steps, {} trials in {} blocks",
            steps.len(),
            trials.len(),
            total_blocks
        );
        Ok(Self {
            steps,
            trials,
            settings,
            collaborators,
            logger,
            cursor: EngineCursor::new(PauseHandle::new()),
            total_blocks,
            position: Position::BeginTrial,
            wait: None,
            trial: TrialProgress::default(),
            results: Vec::new(),
        })
    }

    /// Shares an externally created pause flag, e.g. one already handed to an operator console.
    pub fn with_pause_handle(mut self, pause: PauseHandle) -> Self {
        self.cursor = EngineCursor::new(pause);
        self
    }

    /// Handle for raising a pause request from outside the timeline.
    pub fn pause_handle(&self) -> PauseHandle {
        self.cursor.pause_handle().clone()
    }

    pub fn cursor(&self) -> &EngineCursor {
        &self.cursor
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut EventLogger {
        &mut self.logger
    }

    pub fn presenter(&self) -> &S {
        &self.collaborators.presenter
    }

    pub fn feedback(&self) -> &F {
        &self.collaborators.feedback
    }

    pub fn pause(&self) -> &P {
        &self.collaborators.pause
    }

    pub fn is_finished(&self) -> bool {
        self.position == Position::Finished
    }

    pub fn status(&self) -> EngineStatus {
        if self.is_finished() {
            EngineStatus::Finished
        } else if self.cursor.in_pause {
            EngineStatus::Paused
        } else {
            EngineStatus::Running
        }
    }

    /// Time already spent in the pending wait, looking through an operator pause.
    pub fn current_wait_elapsed(&self) -> Duration {
        fn elapsed(wait: &Wait) -> Duration {
            match wait {
                Wait::Tick => Duration::ZERO,
                Wait::Timed { elapsed, .. } => *elapsed,
                Wait::Choice(collector) => collector.elapsed(),
                Wait::Pause {
                    then: AfterPause::Restore(inner),
                } => elapsed(inner),
                Wait::Pause { .. } => Duration::ZERO,
            }
        }
        self.wait.as_ref().map_or(Duration::ZERO, elapsed)
    }

    /// Advances the timeline by one scheduling tick.
    pub fn tick(&mut self, frame: &Frame) -> EngineStatus {
        if self.is_finished() {
            return EngineStatus::Finished;
        }
        self.logger.advance(frame);

        if let Some(wait) = self.wait.take() {
            if let Some(pending) = self.poll_wait(wait, frame.delta) {
                self.wait = Some(pending);
                return self.status();
            }
        }
        self.run_until_wait();
        self.status()
    }

    /// Returns the wait back if it has not completed.
    ///
    /// The frame's time counts toward the wait before a pause request is
    /// looked at. A wait that completes on this tick runs on and the request
    /// is honoured at the next one.
    fn poll_wait(&mut self, wait: Wait, dt: Duration) -> Option<Wait> {
        let pending = match wait {
            Wait::Pause { then } => return self.poll_pause(then),
            Wait::Tick => Wait::Tick,
            Wait::Timed { elapsed, duration } => {
                let elapsed = elapsed + dt;
                if elapsed >= duration {
                    return None;
                }
                Wait::Timed { elapsed, duration }
            }
            Wait::Choice(mut collector) => {
                let c = &mut self.collaborators;
                match collector.poll(dt, &mut c.input, &c.presenter) {
                    Some(outcome) => {
                        self.record_choice(outcome);
                        return None;
                    }
                    None => Wait::Choice(collector),
                }
            }
        };

        if self.cursor.pause_handle().take_request() {
            let label = self.settings.operator_pause_label.clone();
            info!(trial = self.cursor.trial_index, "operator pause requested");
            self.collaborators.pause.show_pause(&PauseRequest::Operator { label });
            self.cursor.in_pause = true;
            return Some(Wait::Pause {
                then: AfterPause::Restore(Box::new(pending)),
            });
        }
        match pending {
            Wait::Tick => None,
            other => Some(other),
        }
    }

    fn poll_pause(&mut self, then: AfterPause) -> Option<Wait> {
        if !self.collaborators.pause.is_resumed() {
            return Some(Wait::Pause { then });
        }
        self.cursor.in_pause = false;
        // A request raised while already paused is stale.
        self.cursor.pause_handle().take_request();

        match then {
            AfterPause::Restore(inner) => {
                info!(trial = self.cursor.trial_index, "resumed");
                Some(*inner)
            }
            AfterPause::BlockResumed => {
                let next = self.cursor.trial_index + 1;
                let details = format!("start block {}", self.trials[next].block);
                self.logger
                    .log_event(&self.trials[next].trial_id, BLOCK_MARKER_EVENT, &details);
                self.advance_trial();
                None
            }
            AfterPause::SessionEnded => {
                info!("session finished after {} trials", self.results.len());
                self.logger.flush();
                self.position = Position::Finished;
                None
            }
        }
    }

    fn run_until_wait(&mut self) {
        loop {
            match self.position {
                Position::Finished => return,
                Position::BeginTrial => {
                    self.begin_trial();
                    self.position = Position::Action { step: 0, action: 0 };
                }
                Position::Action { step, action } => {
                    let Some(current) = self.steps.get(step) else {
                        self.position = Position::EndTrial;
                        continue;
                    };
                    let Some(&next) = current.actions.get(action) else {
                        self.position = Position::Action { step: step + 1, action: 0 };
                        continue;
                    };
                    self.position = Position::Action {
                        step,
                        action: action + 1,
                    };
                    if let Some(wait) = self.perform(step, next) {
                        self.wait = Some(wait);
                        return;
                    }
                }
                Position::EndTrial => {
                    if let Some(wait) = self.end_trial() {
                        self.wait = Some(wait);
                        return;
                    }
                }
                Position::EndSession => {
                    self.wait = Some(self.end_session());
                    return;
                }
            }
        }
    }

    fn begin_trial(&mut self) {
        let row = &self.trials[self.cursor.trial_index];
        self.cursor.block = row.block;
        self.trial = TrialProgress::default();
        debug!(trial = %row.trial_id, block = row.block, "trial begins");
    }

    fn perform(&mut self, step: usize, action: Action) -> Option<Wait> {
        let name = self.steps[step].name.as_str();
        let row = &self.trials[self.cursor.trial_index];
        match action {
            Action::Log => {
                self.logger.log_event(&row.trial_id, name, "");
                None
            }
            Action::Present => {
                let Some(set) = row.stimuli_for(name) else {
                    warn!(trial = %row.trial_id, "no stimuli for state {}", name);
                    self.logger.log_event(&row.trial_id, name, "ids=[];placements=[]");
                    return None;
                };
                let handles = self.collaborators.presenter.present(set.ids(), set.placements());
                self.trial.presented.extend(handles);
                let details = set.describe();
                match self.steps[step].trigger {
                    TriggerPolicy::DeferredOneTick => self.logger.defer_event(&row.trial_id, name, &details),
                    TriggerPolicy::Immediate => {
                        self.logger.log_event(&row.trial_id, name, &details);
                    }
                }
                None
            }
            Action::ClearDisplay => {
                self.collaborators.presenter.clear_all();
                None
            }
            Action::AwaitChoice { timeout } => {
                self.trial.choice_state = Some(name.to_string());
                if self.collaborators.presenter.on_screen().is_empty() {
                    warn!(trial = %row.trial_id, "choice state {} has nothing on screen", name);
                    self.record_choice(ChoiceOutcome::unanswered(Duration::ZERO));
                    return None;
                }
                self.collaborators.input.begin();
                Some(Wait::Choice(ResponseCollector::new(timeout)))
            }
            Action::Feedback { hold } => {
                self.deliver_feedback(step);
                Some(Wait::Timed {
                    elapsed: Duration::ZERO,
                    duration: hold,
                })
            }
            Action::Delay(duration) => Some(Wait::Timed {
                elapsed: Duration::ZERO,
                duration,
            }),
            Action::YieldTick => Some(Wait::Tick),
        }
    }

    fn record_choice(&mut self, outcome: ChoiceOutcome) {
        debug!(
            selected = outcome.selected_code(),
            rt_ms = outcome.reaction_time_ms(),
            "choice resolved"
        );
        self.trial.outcome = Some(outcome);
    }

    /// Correct ids for a feedback state, falling back to the choice state's entry.
    fn correct_ids(&self, feedback_state: &str) -> &[StimulusId] {
        let row = &self.trials[self.cursor.trial_index];
        match &self.trial.choice_state {
            Some(choice) if !row.has_correct_entry(feedback_state) => row.correct_stimulus_ids(choice),
            _ => row.correct_stimulus_ids(feedback_state),
        }
    }

    fn deliver_feedback(&mut self, step: usize) {
        let name = self.steps[step].name.clone();
        let outcome = self
            .trial
            .outcome
            .unwrap_or_else(|| ChoiceOutcome::unanswered(Duration::ZERO));

        let correct_ids = self.correct_ids(&name);
        let correct = match outcome.selected {
            Some(selected) if correct_ids.is_empty() => {
                warn!(
                    trial = %self.trials[self.cursor.trial_index].trial_id,
                    "no correct stimuli configured for {}; selection {} counts as wrong",
                    name,
                    selected
                );
                false
            }
            Some(selected) => correct_ids.contains(&selected),
            None => false,
        };
        self.trial.correct = Some(correct);

        let matched = outcome
            .selected
            .and_then(|id| self.trial.presented.iter().rev().find(|h| h.id == id))
            .cloned();
        if let Some(handle) = &matched {
            self.collaborators.feedback.flash(handle, correct);
        }

        let points = if correct {
            self.settings.points_per_correct
        } else {
            self.settings.points_per_wrong
        };
        self.cursor.score += points;
        if correct {
            let anchor = matched.map(|h| h.placement).unwrap_or_default();
            self.collaborators.feedback.award_reward(points, anchor);
        } else {
            self.collaborators.feedback.penalize(points.abs());
        }

        let event = match (outcome.is_answered(), correct) {
            (true, true) => SUCCESS_EVENT,
            (true, false) => FAIL_EVENT,
            (false, _) => TIMEOUT_EVENT,
        };
        let details = format!(
            "selected={};rt_ms={:.1};points={:+};score={}",
            outcome.selected_code(),
            outcome.reaction_time_ms(),
            points,
            self.cursor.score
        );
        let trial_id = &self.trials[self.cursor.trial_index].trial_id;
        self.logger.log_event(trial_id, event, &details);
    }

    fn end_trial(&mut self) -> Option<Wait> {
        let index = self.cursor.trial_index;
        let row = &self.trials[index];
        let outcome = self.trial.outcome;
        let correct = match (self.trial.correct, outcome) {
            (Some(correct), _) => correct,
            // No feedback state ran: judge the choice without scoring it.
            (None, Some(outcome)) => {
                let ids = match &self.trial.choice_state {
                    Some(choice) => row.correct_stimulus_ids(choice),
                    None => &[],
                };
                outcome.selected.is_some_and(|id| ids.contains(&id))
            }
            (None, None) => false,
        };
        let result = TrialResult {
            trial_index: index,
            trial_id: row.trial_id.clone(),
            block: row.block,
            correct,
            reaction_time_ms: outcome.filter(ChoiceOutcome::is_answered).map(|o| o.reaction_time_ms()),
        };
        debug!(?result, "trial complete");
        self.results.push(result);

        match self.trials.get(index + 1) {
            Some(next) if self.settings.block_pause && next.block != row.block => {
                let details = format!("end block {}", row.block);
                self.logger.log_event(&row.trial_id, BLOCK_MARKER_EVENT, &details);
                let request = PauseRequest::Block {
                    next_block: next.block,
                    total_blocks: self.total_blocks,
                };
                info!("block {} done, pausing before block {}", row.block, next.block);
                self.collaborators.pause.show_pause(&request);
                self.cursor.in_pause = true;
                Some(Wait::Pause {
                    then: AfterPause::BlockResumed,
                })
            }
            _ => {
                self.advance_trial();
                None
            }
        }
    }

    fn advance_trial(&mut self) {
        self.cursor.trial_index += 1;
        self.position = if self.cursor.trial_index < self.trials.len() {
            Position::BeginTrial
        } else {
            Position::EndSession
        };
    }

    fn end_session(&mut self) -> Wait {
        let (trial_id, block) = match self.trials.last() {
            Some(last) => (last.trial_id.as_str(), last.block),
            None => ("", 0),
        };
        let details = format!("end block {block}");
        self.logger.log_event(trial_id, BLOCK_MARKER_EVENT, &details);
        let details = format!("trials={};score={}", self.results.len(), self.cursor.score);
        self.logger.log_event(trial_id, ALL_TRIALS_COMPLETE_EVENT, &details);
        self.collaborators.pause.show_pause(&PauseRequest::EndOfSession {
            total_blocks: self.total_blocks,
        });
        self.cursor.in_pause = true;
        Wait::Pause {
            then: AfterPause::SessionEnded,
        }
    }

    /// Drives the engine until it finishes or `max_ticks` frames have been fed.
    pub fn run_with<C>(&mut self, mut next_frame: C, max_ticks: u64) -> EngineStatus
    where
        C: FnMut() -> Frame,
    {
        let mut status = self.status();
        for _ in 0..max_ticks {
            status = self.tick(&next_frame());
            if status == EngineStatus::Finished {
                break;
            }
        }
        status
    }
}

impl<S, F, P, I> TaskReport for TrialEngine<S, F, P, I> {
    fn task_summary(&self) -> TaskSummary {
        summarize(&self.results, self.cursor.score)
    }

    fn task_details(&self) -> Vec<TrialDetail> {
        trial_details(&self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::headless::{AutoResumePause, RecordingFeedback, RecordingScene};
    use crate::response::{ClickModality, InputSample, ScriptedPointer};
    use cogex_core::{Placement, ScreenPoint, StateDefinition, StimulusSet};
    use cogex_log::{LogError, PulseCodeTable, PulseLine, PulseStatus};

    type Engine = TrialEngine<RecordingScene, RecordingFeedback, AutoResumePause, ClickModality<ScriptedPointer>>;

    fn frame(index: u64) -> Frame {
        let ms = Duration::from_millis(100);
        Frame {
            index,
            delta: if index == 0 { Duration::ZERO } else { ms },
            render_time: ms * index as u32,
            wall_time: ms * index as u32,
        }
    }

    fn engine(states: &[StateDefinition], trials: Vec<TrialRow>, pointer: ScriptedPointer) -> Engine {
        let codes = PulseCodeTable::build(states, [("Success", 6)]).unwrap();
        engine_with_codes(states, trials, pointer, codes).unwrap()
    }

    fn engine_with_codes(
        states: &[StateDefinition],
        trials: Vec<TrialRow>,
        pointer: ScriptedPointer,
        codes: PulseCodeTable,
    ) -> Result<Engine, ConfigError> {
        let steps = compile(states).unwrap();
        let collaborators = Collaborators {
            presenter: RecordingScene::new(0.5),
            feedback: RecordingFeedback::new(),
            pause: AutoResumePause::new(0),
            input: ClickModality::new(pointer),
        };
        let logger = EventLogger::in_memory(codes, PulseLine::test_only());
        TrialEngine::new(steps, trials, EngineSettings::default(), collaborators, logger)
    }

    fn row(id: &str, block: u32) -> TrialRow {
        TrialRow::new(id, block)
            .with_stimuli("SampleOn", StimulusSet::new(vec![5], vec![Placement::new(0.0, 0.0, 0.0)]).unwrap())
            .with_correct("Choice", vec![5])
    }

    fn protocol() -> Vec<StateDefinition> {
        vec![
            StateDefinition::new("SampleOn").with_stimulus().with_pulse(1),
            StateDefinition::new("Choice").with_choice().with_feedback(),
        ]
    }

    fn events(engine: &Engine) -> Vec<&str> {
        engine.logger().full_records().iter().map(|r| r.event.as_str()).collect()
    }

    fn run(engine: &mut Engine) {
        let mut index = 0;
        let status = engine.run_with(
            || {
                let f = frame(index);
                index += 1;
                f
            },
            1000,
        );
        assert_eq!(status, EngineStatus::Finished);
    }

    #[test]
    fn stimulus_log_is_stamped_one_tick_after_presentation() {
        let pointer = ScriptedPointer::click_after(2, ScreenPoint::new(0.0, 0.0));
        let mut engine = engine(&protocol(), vec![row("T1", 0)], pointer);

        engine.tick(&frame(0));
        assert_eq!(engine.presenter().presented().len(), 1);
        assert!(engine.logger().full_records().is_empty());

        engine.tick(&frame(1));
        let records = engine.logger().full_records();
        assert_eq!(records[0].event, "SampleOn");
        assert_eq!(records[0].stamp.tick, 1);
        assert_eq!(records[1].event, "Choice");
    }

    #[test]
    fn correct_choice_scores_and_reports() {
        let pointer = ScriptedPointer::click_after(2, ScreenPoint::new(0.0, 0.0));
        let mut engine = engine(&protocol(), vec![row("T1", 0)], pointer);
        run(&mut engine);

        assert_eq!(
            engine.results(),
            &[TrialResult {
                trial_index: 0,
                trial_id: "T1".into(),
                block: 0,
                correct: true,
                reaction_time_ms: Some(300.0),
            }]
        );
        assert_eq!(engine.cursor().score, 1);
        assert_eq!(engine.feedback().flashes, vec![(5, true)]);
        assert_eq!(engine.feedback().rewards, vec![1]);
        let success = &engine.logger().full_records()[2];
        assert_eq!(success.event, SUCCESS_EVENT);
        assert!(success.details.starts_with("selected=5;rt_ms=300.0;points=+1;score=1"));
    }

    #[test]
    fn timeout_counts_as_wrong() {
        let mut engine = engine(&protocol(), vec![row("T1", 0)], ScriptedPointer::default());
        run(&mut engine);

        let result = &engine.results()[0];
        assert!(!result.correct);
        assert!(result.timed_out());
        assert_eq!(engine.cursor().score, -1);
        assert_eq!(engine.feedback().penalties, vec![1]);
        assert!(events(&engine).contains(&TIMEOUT_EVENT));
    }

    #[test]
    fn session_end_sequence() {
        let pointer = ScriptedPointer::click_after(0, ScreenPoint::new(0.0, 0.0));
        let mut engine = engine(&protocol(), vec![row("T1", 0)], pointer);
        run(&mut engine);

        let events = events(&engine);
        assert_eq!(&events[events.len() - 2..], [BLOCK_MARKER_EVENT, ALL_TRIALS_COMPLETE_EVENT]);
        assert_eq!(
            engine.pause().requests.last(),
            Some(&PauseRequest::EndOfSession { total_blocks: 1 })
        );
        assert!(engine.is_finished());
        assert_eq!(engine.tick(&frame(999)), EngineStatus::Finished);
    }

    #[test]
    fn empty_screen_choice_resolves_immediately() {
        let states = [
            StateDefinition::new("Blank").with_clear(),
            StateDefinition::new("Choice").with_choice().with_feedback(),
        ];
        let trial = TrialRow::new("T1", 0).with_correct("Choice", vec![5]);
        let mut engine = engine(&states, vec![trial], ScriptedPointer::default());

        engine.tick(&frame(0));
        engine.tick(&frame(1));
        // Blank yielded on tick 0; Choice resolved and feedback started on tick 1.
        assert_eq!(events(&engine), ["Blank", "Choice", TIMEOUT_EVENT]);
        let timeout = &engine.logger().full_records()[2];
        assert!(timeout.details.starts_with("selected=-1;rt_ms=0.0"));
    }

    #[test]
    fn rejects_invalid_trial_table() {
        let steps = compile(&protocol()).unwrap();
        let collaborators = Collaborators {
            presenter: RecordingScene::new(0.5),
            feedback: RecordingFeedback::new(),
            pause: AutoResumePause::new(0),
            input: ClickModality::new(ScriptedPointer::default()),
        };
        let logger = EventLogger::in_memory(PulseCodeTable::default(), PulseLine::test_only());
        let result = TrialEngine::new(steps, vec![], EngineSettings::default(), collaborators, logger);
        assert!(matches!(result, Err(ConfigError::EmptyTrialTable)));
    }

    #[test]
    fn compiled_pulse_codes_reach_the_line() {
        let pointer = ScriptedPointer::click_after(0, ScreenPoint::new(0.0, 0.0));
        let mut engine = engine_with_codes(&protocol(), vec![row("T1", 0)], pointer, PulseCodeTable::default()).unwrap();

        engine.tick(&frame(0));
        engine.tick(&frame(1));
        let sample = &engine.logger().pulse_records()[0];
        assert_eq!(sample.event, "SampleOn");
        assert_eq!(sample.byte, Some(0x01));
        assert_eq!(sample.status, PulseStatus::TestOnly);
    }

    #[test]
    fn conflicting_code_table_is_rejected() {
        let codes = PulseCodeTable::build([], [("SampleOn", 3)]).unwrap();
        let result = engine_with_codes(&protocol(), vec![row("T1", 0)], ScriptedPointer::default(), codes);
        assert!(matches!(
            result,
            Err(ConfigError::PulseCodes(LogError::CodeMismatch {
                table: 3,
                requested: 1,
                ..
            }))
        ));
    }

    #[test]
    fn pause_during_feedback_hold_keeps_its_progress() {
        let pointer = ScriptedPointer::click_after(0, ScreenPoint::new(0.0, 0.0));
        let mut engine = engine(&protocol(), vec![row("T1", 0)], pointer);

        let mut index = 0;
        while engine.feedback().rewards.is_empty() {
            engine.tick(&frame(index));
            index += 1;
        }
        engine.tick(&frame(index));
        assert_eq!(engine.current_wait_elapsed(), Duration::from_millis(100));

        engine.pause_handle().request();
        assert_eq!(engine.tick(&frame(index + 1)), EngineStatus::Paused);
        assert_eq!(engine.current_wait_elapsed(), Duration::from_millis(200));
        assert_eq!(engine.tick(&frame(index + 2)), EngineStatus::Running);
        assert_eq!(engine.current_wait_elapsed(), Duration::from_millis(200));
        engine.tick(&frame(index + 3));
        assert_eq!(engine.current_wait_elapsed(), Duration::from_millis(300));

        assert_eq!(
            engine.pause().requests,
            [PauseRequest::Operator {
                label: "Paused".into()
            }]
        );
        assert_eq!(events(&engine).iter().filter(|e| **e == SUCCESS_EVENT).count(), 1);
    }

    #[test]
    fn pause_during_tick_yield_holds_the_next_state() {
        let states = [
            StateDefinition::new("Blank").with_clear(),
            StateDefinition::new("Fixation").with_delay(0.2),
        ];
        let mut engine = engine(&states, vec![TrialRow::new("T1", 0)], ScriptedPointer::default());

        engine.tick(&frame(0));
        assert_eq!(events(&engine), ["Blank"]);

        engine.pause_handle().request();
        assert_eq!(engine.tick(&frame(1)), EngineStatus::Paused);
        assert_eq!(events(&engine), ["Blank"]);
        assert_eq!(engine.tick(&frame(2)), EngineStatus::Running);
        assert_eq!(events(&engine), ["Blank"]);
        engine.tick(&frame(3));
        assert_eq!(events(&engine), ["Blank", "Fixation"]);
    }

    #[test]
    fn request_during_block_pause_is_dropped() {
        let pointer = ScriptedPointer::new([InputSample::click(ScreenPoint::new(0.0, 0.0)); 2]);
        let mut engine = engine(&protocol(), vec![row("T1", 0), row("T2", 1)], pointer);

        let mut index = 0;
        while engine.status() != EngineStatus::Paused {
            assert!(index < 100, "block pause never reached");
            engine.tick(&frame(index));
            index += 1;
        }
        engine.pause_handle().request();
        engine.tick(&frame(index));
        index += 1;
        assert!(!engine.pause_handle().is_requested());

        while engine.tick(&frame(index)) != EngineStatus::Finished {
            assert!(index < 1000, "engine did not finish");
            index += 1;
        }
        assert_eq!(
            engine.pause().requests,
            [
                PauseRequest::Block {
                    next_block: 1,
                    total_blocks: 2
                },
                PauseRequest::EndOfSession { total_blocks: 2 },
            ]
        );
        assert_eq!(engine.results().len(), 2);
    }
}

//! Interfaces the engine drives but does not implement.

use cogex_core::{Placement, ScreenPoint, StimulusHandle, StimulusId};

/// Read access to what is currently on screen.
pub trait SceneProbe {
    /// The stimulus under `point`, if any.
    fn target_at(&self, point: ScreenPoint) -> Option<StimulusHandle>;
    fn on_screen(&self) -> &[StimulusHandle];
}

pub trait StimulusPresenter: SceneProbe {
    /// Must return one handle per id, in order.
    fn present(&mut self, ids: &[StimulusId], placements: &[Placement]) -> Vec<StimulusHandle>;
    fn clear_all(&mut self);
}

pub trait FeedbackPresenter {
    fn flash(&mut self, handle: &StimulusHandle, correct: bool);
    fn award_reward(&mut self, amount: i64, anchor: Placement);
    fn penalize(&mut self, amount: i64);
}

/// What the pause screen is being shown for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseRequest {
    Block { next_block: u32, total_blocks: usize },
    Operator { label: String },
    EndOfSession { total_blocks: usize },
}

/// Operator-gated pause screen.
///
/// `show_pause` is called once per pause; the engine then polls
/// `is_resumed` every tick until it returns true.
pub trait PausePresenter {
    fn show_pause(&mut self, request: &PauseRequest);
    fn is_resumed(&mut self) -> bool;
}

impl<T: PausePresenter + ?Sized> PausePresenter for Box<T> {
    fn show_pause(&mut self, request: &PauseRequest) {
        (**self).show_pause(request)
    }
    fn is_resumed(&mut self) -> bool {
        (**self).is_resumed()
    }
}

/// Everything the engine is constructed with besides its data and logger.
pub struct Collaborators<S, F, P, I> {
    pub presenter: S,
    pub feedback: F,
    pub pause: P,
    pub input: I,
}

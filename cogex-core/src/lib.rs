pub mod cursor;
pub mod state;
pub mod stimulus;
pub mod trial;

pub use cursor::{EngineCursor, PauseHandle};
pub use state::{BLOCK_MARKER_EVENT, MAX_PULSE_CODE, StateDefinition};
pub use stimulus::{Placement, ScreenPoint, StimulusHandle, StimulusId};
pub use trial::{ChoiceOutcome, PlacementMismatch, StimulusSet, TrialResult, TrialRow};

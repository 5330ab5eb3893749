pub mod collaborators;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod headless;
pub mod response;
pub mod session;
pub mod summary;

pub use collaborators::{
    Collaborators, FeedbackPresenter, PausePresenter, PauseRequest, SceneProbe, StimulusPresenter,
};
pub use compile::{Action, ProtocolCompiler, Step, TriggerPolicy, compile};
pub use config::{
    EngineSettings, ExperimentConfig, InputConfig, PulseConfig, PulseMode, load_protocol, load_trials,
    parse_trials, validate_trials,
};
pub use engine::{
    ALL_TRIALS_COMPLETE_EVENT, EngineStatus, FAIL_EVENT, SUCCESS_EVENT, TIMEOUT_EVENT, TrialEngine,
};
pub use error::ConfigError;
pub use headless::{AutoResumePause, RecordingFeedback, RecordingScene, SimulatedSubject};
pub use response::{
    ClickModality, DwellModality, InputModality, InputSample, PointerSource, ResponseCollector,
    ScriptedPointer,
};
pub use session::{SessionCoordinator, SessionError, TaskReport, TaskToken};
pub use summary::{TaskSummary, TrialDetail, summarize, trial_details};

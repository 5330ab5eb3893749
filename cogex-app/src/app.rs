use crate::Cli;
use crate::console::ConsolePause;
use anyhow::{Context, Result};
use cogex_core::{PauseHandle, TrialRow};
use cogex_experiment::{
    AutoResumePause, ClickModality, Collaborators, DwellModality, EngineStatus, ExperimentConfig, FAIL_EVENT,
    InputConfig, InputModality, PausePresenter, PulseMode, RecordingFeedback, RecordingScene, SUCCESS_EVENT,
    SessionCoordinator, SimulatedSubject, Step, TIMEOUT_EVENT, TrialEngine, load_protocol, load_trials,
};
use cogex_log::{DevicePulseSink, EventLogger, PulseCodeTable, PulseLine, ThreadedPulseSink};
use cogex_timing::{FrameClock, HighPrecisionTimer, Timer};
use std::time::Duration;
use tracing::info;

const HIT_RADIUS: f32 = 1.0;
const REACTION_RANGE_MS: (u64, u64) = (250, 900);

pub struct App {
    config: ExperimentConfig,
    steps: Vec<Step>,
    trials: Vec<TrialRow>,
    codes: PulseCodeTable,
    seed: u64,
    miss_rate: f64,
    auto_resume: Option<u32>,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => ExperimentConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(output) = cli.output {
            config.output_dir = output;
        }
        if let Some(session) = cli.session {
            config.session_id = session;
        }
        if cli.test_pulses {
            config.pulse.mode = PulseMode::TestOnly;
        }
        config.validate()?;

        let states = load_protocol(&cli.protocol)
            .with_context(|| format!("loading protocol {}", cli.protocol.display()))?;
        let steps = config.compiler().compile(&states)?;
        let codes = config.pulse_codes(&states)?;
        let trials =
            load_trials(&cli.trials, &steps).with_context(|| format!("loading trials {}", cli.trials.display()))?;

        info!(
            "session {} task {}: {} states, {} trials",
            config.session_id,
            config.task,
            steps.len(),
            trials.len()
        );
        Ok(Self {
            config,
            steps,
            trials,
            codes,
            seed: cli.seed,
            miss_rate: cli.miss_rate,
            auto_resume: cli.auto_resume,
        })
    }

    pub fn run(self) -> Result<()> {
        println!("=== TRIAL PROTOCOL DRY RUN ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Type `p` + Enter to pause, Enter to resume.\n");

        let config = &self.config;
        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("creating {}", config.output_dir.display()))?;

        let mut logger = EventLogger::create(
            &config.output_dir,
            &config.session_id,
            &config.task,
            self.codes.clone(),
            self.pulse_line(),
        );
        logger.subscribe(|trial: &str, event: &str| {
            if [SUCCESS_EVENT, FAIL_EVENT, TIMEOUT_EVENT].contains(&event) {
                println!("  {trial}: {event}");
            }
        });

        let requests = PauseHandle::new();
        let pause: Box<dyn PausePresenter> = match self.auto_resume {
            Some(frames) => Box::new(AutoResumePause::new(frames)),
            None => Box::new(ConsolePause::spawn(requests.clone())),
        };
        let collaborators = Collaborators {
            presenter: RecordingScene::new(HIT_RADIUS),
            feedback: RecordingFeedback::new(),
            pause,
            input: self.input(),
        };

        let mut session = SessionCoordinator::new(config.session_id.clone(), config.output_dir.clone());
        let token = session.register_trial_manager(config.task.clone());
        let mut engine = TrialEngine::new(
            self.steps.clone(),
            self.trials.clone(),
            config.engine_settings(),
            collaborators,
            logger,
        )?
        .with_pause_handle(requests);

        let mut clock = FrameClock::new(HighPrecisionTimer::new(), config.frame_rate_hz).with_time_scale(config.time_scale);
        let mut frame = clock.next_frame();
        while engine.tick(&frame) != EngineStatus::Finished {
            clock.pace();
            frame = clock.next_frame();
        }
        engine.logger_mut().flush();

        let stats = clock.timer().frame_stats();
        info!(
            "{} frames: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms, min {:.3} ms, max {:.3} ms",
            stats.frames,
            stats.average_frame_time_ns / 1e6,
            stats.effective_fps,
            stats.jitter_ns / 1e6,
            stats.min_frame_time_ns / 1e6,
            stats.max_frame_time_ns / 1e6,
        );

        let summary = session.teardown(token, &engine)?;
        println!(
            "\n{} trials, accuracy {:.1}%, mean RT {:.1} ms, {} timeouts, score {}",
            summary.trials_total,
            summary.accuracy * 100.0,
            summary.mean_reaction_time_ms,
            summary.timeouts,
            summary.final_score
        );
        Ok(())
    }

    fn pulse_line(&self) -> PulseLine {
        let pulse = &self.config.pulse;
        match (pulse.mode, &pulse.port) {
            (PulseMode::Hardware, Some(port)) => {
                let timeout = Duration::from_millis(pulse.write_timeout_ms);
                PulseLine::hardware(DevicePulseSink::open(port, pulse.baud).map(|sink| ThreadedPulseSink::spawn(sink, timeout)))
            }
            _ => PulseLine::test_only(),
        }
    }

    fn input(&self) -> Box<dyn InputModality> {
        let subject = SimulatedSubject::new(self.seed, REACTION_RANGE_MS, self.miss_rate);
        match self.config.input {
            InputConfig::Click => Box::new(ClickModality::new(subject)),
            InputConfig::Dwell { dwell_ms } => Box::new(DwellModality::new(subject, Duration::from_millis(dwell_ms))),
        }
    }
}

use cogex_core::PauseHandle;
use cogex_experiment::{PausePresenter, PauseRequest};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::warn;

/// Pause screen on the operator's terminal.
///
/// A reader thread turns `p` into a pause request and an empty line into a
/// resume. It only ever flips flags; the engine acts on them at its own
/// checkpoints.
pub struct ConsolePause {
    resume: Arc<AtomicBool>,
}

impl ConsolePause {
    pub fn spawn(requests: PauseHandle) -> Self {
        let resume = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&resume);
        let reader = thread::Builder::new().name("cogex-console".into()).spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "p" => requests.request(),
                    "" => flag.store(true, Ordering::Release),
                    other => warn!("unknown console command {:?} (p = pause, Enter = resume)", other),
                }
            }
        });
        if let Err(e) = reader {
            warn!("console reader unavailable: {}; pauses cannot be resumed", e);
        }
        Self { resume }
    }
}

impl PausePresenter for ConsolePause {
    fn show_pause(&mut self, request: &PauseRequest) {
        self.resume.store(false, Ordering::Release);
        match request {
            PauseRequest::Block {
                next_block,
                total_blocks,
            } => println!("Block finished. Next: block {next_block} of {total_blocks}. Press Enter to continue."),
            PauseRequest::Operator { label } => println!("{label}. Press Enter to resume."),
            PauseRequest::EndOfSession { total_blocks } => {
                println!("All {total_blocks} blocks complete. Press Enter to finish.")
            }
        }
    }

    fn is_resumed(&mut self) -> bool {
        self.resume.swap(false, Ordering::AcqRel)
    }
}

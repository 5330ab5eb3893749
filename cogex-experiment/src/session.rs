//! Session-wide bookkeeping across the tasks run in one sitting.

use crate::summary::{TaskSummary, TrialDetail};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub const SESSION_SUMMARY_FILE: &str = "session_summary.csv";
pub const SESSION_SUMMARY_HEADER: &str = "Session,Task,TrialsTotal,Accuracy,MeanRT_ms,Timestamp";

/// Anything that can report results at teardown.
pub trait TaskReport {
    fn task_summary(&self) -> TaskSummary;
    fn task_details(&self) -> Vec<TrialDetail>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("task token {0} is not registered")]
    UnknownTask(usize),

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode summary for {task}")]
    Encode {
        task: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken(usize);

#[derive(Serialize)]
struct TaskSummaryFile<'a> {
    session_id: &'a str,
    task: &'a str,
    summary: &'a TaskSummary,
    trials: &'a [TrialDetail],
}

/// Collects task summaries for one session and writes them out.
pub struct SessionCoordinator {
    session_id: String,
    output_dir: PathBuf,
    next_token: usize,
    tasks: HashMap<TaskToken, String>,
    completed: Vec<(String, TaskSummary)>,
}

impl SessionCoordinator {
    pub fn new(session_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            output_dir: output_dir.into(),
            next_token: 0,
            tasks: HashMap::new(),
            completed: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn register_trial_manager(&mut self, task: impl Into<String>) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;
        self.tasks.insert(token, task.into());
        token
    }

    /// Writes `<session>_<task>_summary.json` and appends to the session table.
    pub fn teardown(&mut self, token: TaskToken, report: &dyn TaskReport) -> Result<TaskSummary, SessionError> {
        let task = self.tasks.remove(&token).ok_or(SessionError::UnknownTask(token.0))?;
        let summary = report.task_summary();
        let details = report.task_details();

        let path = self.output_dir.join(format!("{}_{}_summary.json", self.session_id, task));
        let file = std::fs::File::create(&path).map_err(|source| SessionError::Write {
            path: path.clone(),
            source,
        })?;
        let body = TaskSummaryFile {
            session_id: &self.session_id,
            task: &task,
            summary: &summary,
            trials: &details,
        };
        let mut writer = io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &body).map_err(|source| SessionError::Encode {
            task: task.clone(),
            source,
        })?;
        writer.flush().map_err(|source| SessionError::Write {
            path: path.clone(),
            source,
        })?;

        let table = self.output_dir.join(SESSION_SUMMARY_FILE);
        append_summary_row(&table, &self.session_id, &task, &summary).map_err(|source| SessionError::Write {
            path: table.clone(),
            source,
        })?;

        info!(
            "{}: {} trials, accuracy {:.3}, mean RT {:.1} ms",
            task, summary.trials_total, summary.accuracy, summary.mean_reaction_time_ms
        );
        self.completed.push((task, summary.clone()));
        Ok(summary)
    }

    pub fn completed(&self) -> &[(String, TaskSummary)] {
        &self.completed
    }
}

/// Appends one row, writing the header first if the table is new.
pub fn append_summary_row(path: &Path, session: &str, task: &str, summary: &TaskSummary) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{SESSION_SUMMARY_HEADER}")?;
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    writeln!(
        file,
        "{},{},{},{:.4},{:.1},{}",
        session, task, summary.trials_total, summary.accuracy, summary.mean_reaction_time_ms, timestamp
    )
}

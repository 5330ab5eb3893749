use cogex_core::TrialResult;
use serde::Serialize;

/// Aggregate figures for one task, computed at teardown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub trials_total: usize,
    pub correct_count: usize,
    pub accuracy: f64,
    /// Mean over answered trials only.
    pub mean_reaction_time_ms: f64,
    pub timeouts: usize,
    pub final_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialDetail {
    pub trial_index: usize,
    pub trial_id: String,
    pub correct: bool,
    pub reaction_time_ms: Option<f64>,
}

pub fn summarize(results: &[TrialResult], final_score: i64) -> TaskSummary {
    let trials_total = results.len();
    let correct_count = results.iter().filter(|r| r.correct).count();
    let answered: Vec<f64> = results.iter().filter_map(|r| r.reaction_time_ms).collect();

    let accuracy = if trials_total == 0 {
        0.0
    } else {
        correct_count as f64 / trials_total as f64
    };
    let mean_reaction_time_ms = if answered.is_empty() {
        0.0
    } else {
        answered.iter().sum::<f64>() / answered.len() as f64
    };

    TaskSummary {
        trials_total,
        correct_count,
        accuracy,
        mean_reaction_time_ms,
        timeouts: trials_total - answered.len(),
        final_score,
    }
}

pub fn trial_details(results: &[TrialResult]) -> Vec<TrialDetail> {
    results
        .iter()
        .map(|r| TrialDetail {
            trial_index: r.trial_index,
            trial_id: r.trial_id.clone(),
            correct: r.correct,
            reaction_time_ms: r.reaction_time_ms,
        })
        .collect()
}

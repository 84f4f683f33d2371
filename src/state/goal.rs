use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a tracked objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Achieved,
    Abandoned,
    Revised,
}

impl GoalStatus {
    /// Achieved and abandoned goals no longer accept progress.
    pub fn is_closed(self) -> bool {
        matches!(self, GoalStatus::Achieved | GoalStatus::Abandoned)
    }
}

/// One logged progress measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    pub progress: u8,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<String>,
}

/// A tracked objective, independent of phase/step completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub success_indicators: Vec<String>,
    pub current_progress: u8,
    #[serde(default)]
    pub progress_history: Vec<ProgressEntry>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(description: String, success_indicators: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description,
            success_indicators,
            current_progress: 0,
            progress_history: Vec::new(),
            status: GoalStatus::Active,
            created_at: now,
            achieved_at: None,
        }
    }

    /// Appends `entry` and moves `current_progress` to it. Reaching 100
    /// marks the goal achieved. Returns the progress value before the update.
    pub fn record(&mut self, entry: ProgressEntry) -> u8 {
        let previous = self.current_progress;
        self.current_progress = entry.progress;
        if entry.progress >= 100 {
            self.mark(GoalStatus::Achieved, entry.timestamp);
        }
        self.progress_history.push(entry);
        previous
    }

    pub fn mark(&mut self, status: GoalStatus, now: DateTime<Utc>) {
        self.status = status;
        if status == GoalStatus::Achieved {
            self.achieved_at.get_or_insert(now);
        }
    }

    /// True when none of the last `window` entries moved progress forward.
    /// A goal with fewer than `window` entries is not stalled.
    pub fn is_stalled(&self, window: usize) -> bool {
        if window == 0 || self.progress_history.len() < window {
            return false;
        }
        let start = self.progress_history.len() - window;
        let baseline = if start == 0 {
            0
        } else {
            self.progress_history[start - 1].progress
        };

        let mut high = baseline;
        for entry in &self.progress_history[start..] {
            if entry.progress > high {
                return false;
            }
            high = high.max(entry.progress);
        }
        true
    }

    /// True when the latest entry is below the one before it.
    pub fn has_regressed(&self) -> bool {
        match self.progress_history.as_slice() {
            [.., before, last] => last.progress < before.progress,
            _ => false,
        }
    }
}

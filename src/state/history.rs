//! Append-only logs kept alongside the phases: backward iterations,
//! decisions, archived product versions, and the feedback summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded backward jump from one phase to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    pub from_phase: String,
    pub to_phase: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_point: Option<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Iteration {
    pub fn new(
        from_phase: String,
        to_phase: String,
        reason: String,
        restore_point: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_phase,
            to_phase,
            reason,
            timestamp: now,
            restore_point,
            changes: Vec::new(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// A logged choice among enumerated options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub phase_id: String,
    pub title: String,
    pub context: String,
    pub options: Vec<DecisionOption>,
    pub chosen_option_id: String,
    pub rationale: String,
    pub expected_outcome: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Decision {
    pub fn chosen_option(&self) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == self.chosen_option_id)
    }
}

/// Reference to an archived product version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedVersion {
    pub version: u32,
    pub path: String,
    pub archived_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementStatus {
    Pending,
    InProgress,
    Completed,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedImprovement {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub affected_stages: Vec<String>,
    pub priority: Priority,
    pub status: ImprovementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
}

/// Aggregated view over every reflection recorded so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub last_updated: DateTime<Utc>,
    pub total_reflections: u32,
    #[serde(default)]
    pub key_learnings: Vec<String>,
    #[serde(default)]
    pub recurring_issues: Vec<String>,
    #[serde(default)]
    pub suggested_improvements: Vec<SuggestedImprovement>,
}

impl FeedbackSummary {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            total_reflections: 0,
            key_learnings: Vec::new(),
            recurring_issues: Vec::new(),
            suggested_improvements: Vec::new(),
        }
    }

    /// Counts one reflection and folds in learnings and issues not seen before.
    pub fn absorb(&mut self, learnings: Vec<String>, issues: Vec<String>, now: DateTime<Utc>) {
        self.total_reflections += 1;
        push_unique(&mut self.key_learnings, learnings);
        push_unique(&mut self.recurring_issues, issues);
        self.last_updated = now;
    }

    pub fn improvement_mut(&mut self, id: &str) -> Option<&mut SuggestedImprovement> {
        self.suggested_improvements.iter_mut().find(|i| i.id == id)
    }
}

fn push_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::goal::Goal;
use super::history::{ArchivedVersion, Decision, FeedbackSummary, Iteration};
use crate::config::{PhaseConfig, StepConfig, WorkflowConfig};

/// Schema version written into every document.
pub const STATE_VERSION: &str = "1.0.0";

/// Free-form per-phase / per-step data, ordered by key.
pub type DataMap = serde_json::Map<String, Value>;

/// Lifecycle status shared by phases and steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl Status {
    /// Completed or skipped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Skipped)
    }

    /// Pending or in progress: there is still work to do.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Completed => write!(f, "completed"),
            Status::Skipped => write!(f, "skipped"),
        }
    }
}

/// Shallow merge: keys in `incoming` overwrite, every other existing key stays.
pub fn merge_data(target: &mut Option<DataMap>, incoming: DataMap) {
    target.get_or_insert_with(DataMap::new).extend(incoming);
}

/// An atomic unit of work within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMap>,
}

impl Step {
    fn from_config(config: &StepConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            status: Status::Pending,
            started_at: None,
            completed_at: None,
            data: None,
        }
    }

    /// Marks the step in progress. An earlier `started_at` is kept.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = Status::InProgress;
        self.started_at.get_or_insert(now);
    }

    pub fn complete(&mut self, now: DateTime<Utc>, data: Option<DataMap>) {
        self.status = Status::Completed;
        self.completed_at = Some(now);
        if let Some(data) = data {
            merge_data(&mut self.data, data);
        }
    }
}

/// A top-level stage of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub order: u32,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMap>,
}

impl Phase {
    fn from_config(config: &PhaseConfig) -> Self {
        let mut artifacts: Vec<String> = Vec::with_capacity(config.artifacts.len());
        for path in &config.artifacts {
            if !artifacts.contains(path) {
                artifacts.push(path.clone());
            }
        }

        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            status: Status::Pending,
            order: config.order,
            steps: config.steps.iter().map(Step::from_config).collect(),
            artifacts,
            started_at: None,
            last_modified_at: None,
            completed_at: None,
            data: None,
        }
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == Status::Completed)
            .count()
    }

    /// Weight in the overall progress: step count, or 1 for an empty phase.
    pub fn weight(&self) -> usize {
        self.steps.len().max(1)
    }

    /// Marks the phase in progress. An earlier `started_at` is kept.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = Status::InProgress;
        self.started_at.get_or_insert(now);
        self.last_modified_at = Some(now);
    }

    /// Completes the phase and forces every open step to completed with
    /// the same timestamp. Skipped steps stay skipped.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = Status::Completed;
        self.completed_at = Some(now);
        self.last_modified_at = Some(now);

        for step in self.steps.iter_mut().filter(|s| s.status.is_open()) {
            step.status = Status::Completed;
            step.completed_at = Some(now);
        }
    }

    /// Puts a phase back to work after a backward jump.
    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = Status::InProgress;
        self.completed_at = None;
        self.started_at.get_or_insert(now);
        self.last_modified_at = Some(now);
    }

    /// Returns false when the path was already recorded.
    pub fn add_artifact(&mut self, path: &str) -> bool {
        if self.artifacts.iter().any(|a| a == path) {
            return false;
        }
        self.artifacts.push(path.to_string());
        true
    }
}

fn default_version_number() -> u32 {
    1
}

/// The single persisted document for one storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub workflow_id: String,
    pub workflow_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase_id: Option<String>,
    pub phases: Vec<Phase>,
    #[serde(default = "default_version_number")]
    pub version_number: u32,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub archived_versions: Vec<ArchivedVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_summary: Option<FeedbackSummary>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub consecutive_no_progress: u32,
}

impl WorkflowState {
    /// Seeds a fresh document from the template. Phases are kept sorted by
    /// `order`; everything starts pending.
    pub fn from_config(
        config: &WorkflowConfig,
        project_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut phases: Vec<Phase> = config.phases.iter().map(Phase::from_config).collect();
        phases.sort_by_key(|p| p.order);

        Self {
            workflow_id: config.workflow_id.clone(),
            workflow_name: config.workflow_name.clone(),
            project_name,
            version: STATE_VERSION.to_string(),
            created_at: now,
            last_modified_at: now,
            current_phase_id: None,
            phases,
            version_number: default_version_number(),
            iterations: Vec::new(),
            decisions: Vec::new(),
            archived_versions: Vec::new(),
            feedback_summary: None,
            goals: Vec::new(),
            consecutive_no_progress: 0,
        }
    }

    pub fn phase(&self, phase_id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    pub fn phase_mut(&mut self, phase_id: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.id == phase_id)
    }

    /// The phase `currentPhaseId` points at, if it still resolves.
    pub fn current_phase_ref(&self) -> Option<&Phase> {
        self.current_phase_id
            .as_deref()
            .and_then(|id| self.phase(id))
    }

    pub fn first_with_status(&self, status: Status) -> Option<&Phase> {
        self.phases.iter().find(|p| p.status == status)
    }

    /// The phase that follows `order` and has not been started yet.
    pub fn next_pending_after(&self, order: u32) -> Option<&Phase> {
        let next = order.checked_add(1)?;
        self.phases
            .iter()
            .find(|p| p.order == next && p.status == Status::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> WorkflowConfig {
        toml::from_str(
            r#"
            workflow_id = "wf"
            workflow_name = "Sample"

            [[phases]]
            id = "build"
            name = "Build"
            order = 2
            steps = [{ id = "s3", name = "Code" }]
            artifacts = ["out/", "out/"]

            [[phases]]
            id = "design"
            name = "Design"
            order = 1
            steps = [{ id = "s1", name = "Sketch" }, { id = "s2", name = "Review" }]
            "#,
        )
        .unwrap()
    }

    fn data(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn from_config_starts_everything_pending() {
        let state = WorkflowState::from_config(&sample_config(), Some("demo".into()), Utc::now());

        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.version_number, 1);
        assert_eq!(state.consecutive_no_progress, 0);
        assert_eq!(state.project_name.as_deref(), Some("demo"));
        assert!(state.current_phase_id.is_none());
        assert!(state.phases.iter().all(|p| p.status == Status::Pending));
        assert!(state
            .phases
            .iter()
            .flat_map(|p| &p.steps)
            .all(|s| s.status == Status::Pending));
    }

    #[test]
    fn from_config_sorts_by_order_and_dedupes_artifacts() {
        let state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        let ids: Vec<_> = state.phases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["design", "build"]);
        assert_eq!(state.phase("build").unwrap().artifacts, vec!["out/".to_string()]);
    }

    #[test]
    fn complete_forces_open_steps_but_keeps_skipped() {
        let mut state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        let phase = state.phase_mut("design").unwrap();
        phase.steps[1].status = Status::Skipped;

        let now = Utc::now();
        phase.complete(now);

        assert_eq!(phase.status, Status::Completed);
        assert_eq!(phase.steps[0].status, Status::Completed);
        assert_eq!(phase.steps[0].completed_at, Some(now));
        assert_eq!(phase.steps[1].status, Status::Skipped);
        assert!(phase.steps[1].completed_at.is_none());
    }

    #[test]
    fn start_keeps_first_started_at() {
        let mut state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        let phase = state.phase_mut("design").unwrap();
        let first = Utc::now();
        phase.start(first);
        phase.start(first + chrono::Duration::seconds(5));
        assert_eq!(phase.started_at, Some(first));
    }

    #[test]
    fn merge_data_overwrites_only_matching_keys() {
        let mut target = None;
        merge_data(&mut target, data(json!({"a": 1})));
        merge_data(&mut target, data(json!({"b": 2})));
        merge_data(&mut target, data(json!({"a": 3})));
        assert_eq!(Value::Object(target.unwrap()), json!({"a": 3, "b": 2}));
    }

    #[test]
    fn next_pending_after_stops_at_max_order() {
        let mut state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        state.phase_mut("build").unwrap().order = u32::MAX;
        assert!(state.next_pending_after(u32::MAX).is_none());
        assert_eq!(state.next_pending_after(1).map(|p| p.id.as_str()), None);
        state.phase_mut("build").unwrap().order = 2;
        assert_eq!(state.next_pending_after(1).map(|p| p.id.as_str()), Some("build"));
    }

    #[test]
    fn add_artifact_reports_duplicates() {
        let mut state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        let phase = state.phase_mut("design").unwrap();
        assert!(phase.add_artifact("docs/design.md"));
        assert!(!phase.add_artifact("docs/design.md"));
        assert_eq!(phase.artifacts.len(), 1);
    }

    #[test]
    fn weight_is_never_zero() {
        let state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        assert_eq!(state.phase("design").unwrap().weight(), 2);
        let empty = Phase::from_config(&PhaseConfig {
            id: "x".into(),
            name: "X".into(),
            description: None,
            order: 9,
            steps: Vec::new(),
            artifacts: Vec::new(),
        });
        assert_eq!(empty.weight(), 1);
    }

    #[test]
    fn document_uses_camel_case_and_snake_case_statuses() {
        let mut state = WorkflowState::from_config(&sample_config(), None, Utc::now());
        state.phases[0].status = Status::InProgress;
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("workflowId").is_some());
        assert!(value.get("consecutiveNoProgress").is_some());
        assert_eq!(value["phases"][0]["status"], json!("in_progress"));
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::InProgress.to_string(), "in_progress");
        assert!(Status::Skipped.is_terminal());
        assert!(Status::Pending.is_open());
    }
}

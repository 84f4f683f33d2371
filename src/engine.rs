//! The operations that drive a workflow document.
//!
//! Every public method follows the same path: load the document, resolve the
//! addressed entities in memory, apply one mutation, save once, and hand the
//! outcome back as an [`OperationResult`]. Lookups fail before anything is
//! written, so a failed operation never leaves a partial change on disk.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::progress::{self, GoalDivergence, NextStep, WorkflowProgress};
use crate::result::OperationResult;
use crate::state::{
    merge_data, ArchivedVersion, DataMap, Decision, DecisionOption, FeedbackSummary, Goal,
    GoalStatus, ImprovementStatus, Iteration, Phase, Priority, ProgressEntry, Status, Step,
    SuggestedImprovement, WorkflowState,
};
use crate::store::DocumentStore;

/// A progress measurement for one goal.
#[derive(Debug, Clone)]
pub struct GoalUpdate {
    pub goal_id: String,
    /// Clamped to 0-100.
    pub progress: i64,
    pub reason: String,
    pub iteration_id: Option<String>,
    pub phase_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDecision {
    pub phase_id: String,
    pub title: String,
    pub context: String,
    pub options: Vec<DecisionOption>,
    pub chosen_option_id: String,
    pub rationale: String,
    pub expected_outcome: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewImprovement {
    pub description: String,
    pub affected_stages: Vec<String>,
    pub priority: Priority,
    pub target_version: Option<String>,
}

/// What a mutation wants done with the loaded document.
enum Mutation<T> {
    Save(T),
    Unchanged(T),
}

pub struct WorkflowEngine {
    config: WorkflowConfig,
    store: DocumentStore,
}

impl WorkflowEngine {
    /// Builds an engine whose document lives under `base_dir` at the
    /// template's storage directory.
    pub fn new(config: WorkflowConfig, base_dir: impl AsRef<Path>) -> Self {
        let store = DocumentStore::for_config(&config, base_dir.as_ref());
        Self { config, store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn exists(&self) -> bool {
        self.store.exists()
    }

    pub fn initialize(&self, project_name: Option<String>) -> OperationResult<WorkflowState> {
        finish("initialize", self.create(project_name))
    }

    /// Discards any existing document and initializes a fresh one. The
    /// template is checked first so a bad template keeps the old document.
    pub fn reset(&self, project_name: Option<String>) -> OperationResult<WorkflowState> {
        let result = self
            .config
            .validate()
            .and_then(|()| self.store.remove())
            .and_then(|()| self.create(project_name));
        finish("reset", result)
    }

    pub fn load(&self) -> OperationResult<WorkflowState> {
        finish("load", self.store.load())
    }

    pub fn start_phase(&self, phase_id: &str) -> OperationResult<Phase> {
        let result = self.mutate(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            phase.start(now);
            let phase = phase.clone();
            state.current_phase_id = Some(phase.id.clone());
            Ok(phase)
        });
        finish("start_phase", result)
    }

    /// Completes the phase, forces its open steps to completed, and moves
    /// `currentPhaseId` to the next phase by order if that one is still
    /// pending (absent otherwise).
    pub fn complete_phase(&self, phase_id: &str) -> OperationResult<Phase> {
        let result = self.mutate(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            phase.complete(now);
            let phase = phase.clone();

            state.current_phase_id = state.next_pending_after(phase.order).map(|p| p.id.clone());
            info!(
                phase = %phase.id,
                next = state.current_phase_id.as_deref().unwrap_or("-"),
                "phase completed"
            );
            Ok(phase)
        });
        finish("complete_phase", result)
    }

    /// Starts a step; a pending owning phase is started and made current too.
    pub fn start_step(&self, phase_id: &str, step_id: &str) -> OperationResult<Step> {
        let result = self.mutate(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            let step = find_step_mut(phase, step_id)?;
            step.start(now);
            let step = step.clone();

            phase.last_modified_at = Some(now);
            let promote = phase.status == Status::Pending;
            if promote {
                phase.start(now);
                state.current_phase_id = Some(phase_id.to_string());
            }
            debug!(phase = phase_id, step = step_id, status = %step.status, promote, "step started");
            Ok(step)
        });
        finish("start_step", result)
    }

    /// Completes a step and shallow-merges `data` into it. The phase is left
    /// as is even when this was its last open step.
    pub fn complete_step(
        &self,
        phase_id: &str,
        step_id: &str,
        data: Option<DataMap>,
    ) -> OperationResult<Step> {
        let result = self.mutate(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            let step = find_step_mut(phase, step_id)?;
            step.complete(now, data);
            let step = step.clone();
            phase.last_modified_at = Some(now);
            Ok(step)
        });
        finish("complete_step", result)
    }

    /// Records an artifact path once. A repeat succeeds without rewriting
    /// the document.
    pub fn add_artifact(&self, phase_id: &str, path: &str) -> OperationResult<Phase> {
        let result = self.mutate_if(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            if !phase.add_artifact(path) {
                return Ok(Mutation::Unchanged(phase.clone()));
            }
            phase.last_modified_at = Some(now);
            Ok(Mutation::Save(phase.clone()))
        });
        finish("add_artifact", result)
    }

    pub fn set_phase_data(&self, phase_id: &str, data: DataMap) -> OperationResult<Phase> {
        let result = self.mutate(|state, now| {
            let phase = find_phase_mut(state, phase_id)?;
            merge_data(&mut phase.data, data);
            phase.last_modified_at = Some(now);
            Ok(phase.clone())
        });
        finish("set_phase_data", result)
    }

    pub fn add_goal(
        &self,
        description: &str,
        success_indicators: Vec<String>,
    ) -> OperationResult<Goal> {
        let result = self.mutate(|state, now| {
            let goal = Goal::new(description.to_string(), success_indicators, now);
            state.goals.push(goal.clone());
            Ok(goal)
        });
        finish("add_goal", result)
    }

    /// Logs a progress measurement. An update that does not beat the goal's
    /// previous value bumps `consecutiveNoProgress`; one that does resets it.
    pub fn update_goal_progress(&self, update: GoalUpdate) -> OperationResult<Goal> {
        let result = self.mutate(|state, now| {
            let goal = state
                .goals
                .iter_mut()
                .find(|g| g.id == update.goal_id)
                .ok_or_else(|| WorkflowError::GoalNotFound(update.goal_id.clone()))?;
            if goal.status.is_closed() {
                return Err(WorkflowError::GoalClosed(goal.id.clone()));
            }

            let progress = update.progress.clamp(0, 100) as u8;
            let previous = goal.record(ProgressEntry {
                timestamp: now,
                progress,
                reason: update.reason,
                iteration_id: update.iteration_id,
                phase_id: update.phase_id,
            });
            let goal = goal.clone();

            if progress > previous {
                state.consecutive_no_progress = 0;
            } else {
                state.consecutive_no_progress += 1;
            }
            debug!(
                goal = %goal.id,
                previous,
                progress,
                no_progress = state.consecutive_no_progress,
                "goal progress recorded"
            );
            Ok(goal)
        });
        finish("update_goal_progress", result)
    }

    pub fn set_goal_status(&self, goal_id: &str, status: GoalStatus) -> OperationResult<Goal> {
        let result = self.mutate(|state, now| {
            let goal = state
                .goals
                .iter_mut()
                .find(|g| g.id == goal_id)
                .ok_or_else(|| WorkflowError::GoalNotFound(goal_id.to_string()))?;
            goal.mark(status, now);
            Ok(goal.clone())
        });
        finish("set_goal_status", result)
    }

    /// Records a jump back from `from_phase` to `to_phase` (same or earlier
    /// order). The target phase is reopened and becomes current.
    pub fn start_iteration(
        &self,
        from_phase: &str,
        to_phase: &str,
        reason: &str,
        restore_point: Option<String>,
    ) -> OperationResult<Iteration> {
        let result = self.mutate(|state, now| {
            let from_order = find_phase(state, from_phase)?.order;
            let to_order = find_phase(state, to_phase)?.order;
            if to_order > from_order {
                return Err(WorkflowError::InvalidIteration(format!(
                    "{to_phase} (order {to_order}) comes after {from_phase} (order {from_order})"
                )));
            }

            let iteration = Iteration::new(
                from_phase.to_string(),
                to_phase.to_string(),
                reason.to_string(),
                restore_point,
                now,
            );
            state.iterations.push(iteration.clone());
            find_phase_mut(state, to_phase)?.reopen(now);
            state.current_phase_id = Some(to_phase.to_string());

            info!(from = from_phase, to = to_phase, iteration = %iteration.id, "iteration started");
            Ok(iteration)
        });
        finish("start_iteration", result)
    }

    pub fn record_iteration_change(
        &self,
        iteration_id: &str,
        change: &str,
    ) -> OperationResult<Iteration> {
        let result = self.mutate(|state, _| {
            let iteration = find_iteration_mut(state, iteration_id)?;
            if iteration.is_completed() {
                return Err(WorkflowError::InvalidIteration(format!(
                    "{iteration_id} is already completed"
                )));
            }
            iteration.changes.push(change.to_string());
            Ok(iteration.clone())
        });
        finish("record_iteration_change", result)
    }

    /// Stamps the iteration's completion time. Completing twice keeps the
    /// first timestamp.
    pub fn complete_iteration(&self, iteration_id: &str) -> OperationResult<Iteration> {
        let result = self.mutate(|state, now| {
            let iteration = find_iteration_mut(state, iteration_id)?;
            iteration.completed_at.get_or_insert(now);
            Ok(iteration.clone())
        });
        finish("complete_iteration", result)
    }

    pub fn record_decision(&self, decision: NewDecision) -> OperationResult<Decision> {
        let result = self.mutate(|state, now| {
            find_phase(state, &decision.phase_id)?;
            validate_options(&decision.options, &decision.chosen_option_id)?;

            let decision = Decision {
                id: Uuid::new_v4().to_string(),
                phase_id: decision.phase_id,
                title: decision.title,
                context: decision.context,
                options: decision.options,
                chosen_option_id: decision.chosen_option_id,
                rationale: decision.rationale,
                expected_outcome: decision.expected_outcome,
                timestamp: now,
                actual_outcome: None,
                tags: decision.tags,
            };
            state.decisions.push(decision.clone());
            Ok(decision)
        });
        finish("record_decision", result)
    }

    /// Fills in what actually happened after a decision.
    pub fn record_decision_outcome(
        &self,
        decision_id: &str,
        outcome: &str,
    ) -> OperationResult<Decision> {
        let result = self.mutate(|state, _| {
            let decision = state
                .decisions
                .iter_mut()
                .find(|d| d.id == decision_id)
                .ok_or_else(|| WorkflowError::DecisionNotFound(decision_id.to_string()))?;
            decision.actual_outcome = Some(outcome.to_string());
            Ok(decision.clone())
        });
        finish("record_decision_outcome", result)
    }

    /// Archives the current product version and moves on to the next number.
    pub fn archive_version(
        &self,
        path: &str,
        summary: Option<String>,
    ) -> OperationResult<ArchivedVersion> {
        let result = self.mutate(|state, now| {
            let archived = ArchivedVersion {
                version: state.version_number,
                path: path.to_string(),
                archived_at: now,
                summary,
            };
            state.archived_versions.push(archived.clone());
            state.version_number += 1;
            info!(archived = archived.version, current = state.version_number, "version archived");
            Ok(archived)
        });
        finish("archive_version", result)
    }

    pub fn record_reflection(
        &self,
        learnings: Vec<String>,
        issues: Vec<String>,
    ) -> OperationResult<FeedbackSummary> {
        let result = self.mutate(|state, now| {
            let summary = state
                .feedback_summary
                .get_or_insert_with(|| FeedbackSummary::new(now));
            summary.absorb(learnings, issues, now);
            Ok(summary.clone())
        });
        finish("record_reflection", result)
    }

    pub fn add_improvement(
        &self,
        improvement: NewImprovement,
    ) -> OperationResult<SuggestedImprovement> {
        let result = self.mutate(|state, now| {
            let improvement = SuggestedImprovement {
                id: Uuid::new_v4().to_string(),
                description: improvement.description,
                affected_stages: improvement.affected_stages,
                priority: improvement.priority,
                status: ImprovementStatus::Pending,
                target_version: improvement.target_version,
            };
            let summary = state
                .feedback_summary
                .get_or_insert_with(|| FeedbackSummary::new(now));
            summary.suggested_improvements.push(improvement.clone());
            summary.last_updated = now;
            Ok(improvement)
        });
        finish("add_improvement", result)
    }

    pub fn set_improvement_status(
        &self,
        improvement_id: &str,
        status: ImprovementStatus,
    ) -> OperationResult<SuggestedImprovement> {
        let result = self.mutate(|state, now| {
            let summary = state
                .feedback_summary
                .as_mut()
                .ok_or_else(|| WorkflowError::ImprovementNotFound(improvement_id.to_string()))?;
            let improvement = summary
                .improvement_mut(improvement_id)
                .ok_or_else(|| WorkflowError::ImprovementNotFound(improvement_id.to_string()))?;
            improvement.status = status;
            let improvement = improvement.clone();
            summary.last_updated = now;
            Ok(improvement)
        });
        finish("set_improvement_status", result)
    }

    pub fn get_progress(&self) -> OperationResult<WorkflowProgress> {
        finish("get_progress", self.read(progress::summarize))
    }

    pub fn get_current_phase(&self) -> OperationResult<Option<Phase>> {
        finish(
            "get_current_phase",
            self.read(|state| progress::current_phase(state).cloned()),
        )
    }

    pub fn get_next_step(&self) -> OperationResult<Option<NextStep>> {
        finish("get_next_step", self.read(progress::next_step))
    }

    pub fn get_goal_divergence(&self) -> OperationResult<GoalDivergence> {
        let threshold = self.config.divergence_threshold;
        finish(
            "get_goal_divergence",
            self.read(|state| progress::goal_divergence(state, threshold)),
        )
    }

    fn create(&self, project_name: Option<String>) -> Result<WorkflowState> {
        if self.store.exists() {
            return Err(WorkflowError::AlreadyExists);
        }
        self.config.validate()?;

        let mut state = WorkflowState::from_config(&self.config, project_name, Utc::now());
        self.store.save(&mut state)?;
        info!(
            workflow = %state.workflow_id,
            phases = state.phases.len(),
            path = %self.store.path().display(),
            "workflow initialized"
        );
        Ok(state)
    }

    fn read<T>(&self, view: impl FnOnce(&WorkflowState) -> T) -> Result<T> {
        let state = self.store.load()?;
        Ok(view(&state))
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut WorkflowState, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        self.mutate_if(|state, now| apply(state, now).map(Mutation::Save))
    }

    fn mutate_if<T>(
        &self,
        apply: impl FnOnce(&mut WorkflowState, DateTime<Utc>) -> Result<Mutation<T>>,
    ) -> Result<T> {
        let mut state = self.store.load()?;
        match apply(&mut state, Utc::now())? {
            Mutation::Save(value) => {
                self.store.save(&mut state)?;
                Ok(value)
            }
            Mutation::Unchanged(value) => Ok(value),
        }
    }
}

fn finish<T>(operation: &str, result: Result<T>) -> OperationResult<T> {
    if let Err(err) = &result {
        warn!(operation, error = %err, "workflow operation failed");
    }
    result.into()
}

fn find_phase<'a>(state: &'a WorkflowState, phase_id: &str) -> Result<&'a Phase> {
    state
        .phase(phase_id)
        .ok_or_else(|| WorkflowError::PhaseNotFound(phase_id.to_string()))
}

fn find_phase_mut<'a>(state: &'a mut WorkflowState, phase_id: &str) -> Result<&'a mut Phase> {
    state
        .phase_mut(phase_id)
        .ok_or_else(|| WorkflowError::PhaseNotFound(phase_id.to_string()))
}

fn find_step_mut<'a>(phase: &'a mut Phase, step_id: &str) -> Result<&'a mut Step> {
    phase
        .step_mut(step_id)
        .ok_or_else(|| WorkflowError::StepNotFound(step_id.to_string()))
}

fn find_iteration_mut<'a>(
    state: &'a mut WorkflowState,
    iteration_id: &str,
) -> Result<&'a mut Iteration> {
    state
        .iterations
        .iter_mut()
        .find(|i| i.id == iteration_id)
        .ok_or_else(|| WorkflowError::IterationNotFound(iteration_id.to_string()))
}

fn validate_options(options: &[DecisionOption], chosen: &str) -> Result<()> {
    if options.is_empty() {
        return Err(WorkflowError::InvalidDecision(
            "at least one option is required".into(),
        ));
    }
    for (i, option) in options.iter().enumerate() {
        if options[..i].iter().any(|o| o.id == option.id) {
            return Err(WorkflowError::InvalidDecision(format!(
                "duplicate option id: {}",
                option.id
            )));
        }
    }
    if !options.iter().any(|o| o.id == chosen) {
        return Err(WorkflowError::InvalidDecision(format!(
            "chosen option {chosen} is not one of the options"
        )));
    }
    Ok(())
}

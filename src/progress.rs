//! Derived views over a [`WorkflowState`]: weighted overall progress, the
//! phase to work on, the next open step, and goal divergence signals.
//!
//! Nothing here is persisted. Two "current phase" rules coexist on purpose:
//! [`summarize`] reports on the phase being worked (`currentPhaseId`, else
//! the first in-progress phase) while [`current_phase`] also falls back to
//! the first pending phase so there is always something to pick up next.

use serde::{Deserialize, Serialize};

use crate::state::{Phase, Status, Step, WorkflowState};

/// Step tally for the phase being reported on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    pub id: String,
    pub name: String,
    pub total_steps: usize,
    pub completed_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowProgress {
    pub total_phases: usize,
    pub completed_phases: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<PhaseProgress>,
    /// 0-100.
    pub overall_progress: u8,
}

/// The next open step together with the phase that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    pub phase: Phase,
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDivergence {
    pub consecutive_no_progress: u32,
    pub threshold: u32,
    pub diverging: bool,
    /// Open goals whose last `threshold` measurements never moved forward.
    pub stalled_goals: Vec<String>,
    /// Open goals whose latest measurement is below the previous one.
    pub regressed_goals: Vec<String>,
}

pub fn summarize(state: &WorkflowState) -> WorkflowProgress {
    let completed_phases = state
        .phases
        .iter()
        .filter(|p| p.status == Status::Completed)
        .count();

    let current_phase = state
        .current_phase_ref()
        .or_else(|| state.first_with_status(Status::InProgress))
        .map(|phase| PhaseProgress {
            id: phase.id.clone(),
            name: phase.name.clone(),
            total_steps: phase.steps.len(),
            completed_steps: phase.completed_steps(),
        });

    WorkflowProgress {
        total_phases: state.phases.len(),
        completed_phases,
        current_phase,
        overall_progress: overall_progress(&state.phases),
    }
}

/// Weighted completion across all phases, rounded to a whole percentage.
pub fn overall_progress(phases: &[Phase]) -> u8 {
    let mut total_weight = 0.0_f64;
    let mut completed_weight = 0.0_f64;

    for phase in phases {
        let weight = phase.weight() as f64;
        total_weight += weight;

        match phase.status {
            Status::Completed => completed_weight += weight,
            Status::InProgress if !phase.steps.is_empty() => {
                let fraction = phase.completed_steps() as f64 / phase.steps.len() as f64;
                completed_weight += weight * fraction;
            }
            _ => {}
        }
    }

    if total_weight > 0.0 {
        (completed_weight / total_weight * 100.0).round() as u8
    } else {
        0
    }
}

/// `currentPhaseId` if it resolves, else the first in-progress phase, else
/// the first pending phase.
pub fn current_phase(state: &WorkflowState) -> Option<&Phase> {
    state
        .current_phase_ref()
        .or_else(|| state.first_with_status(Status::InProgress))
        .or_else(|| state.first_with_status(Status::Pending))
}

pub fn next_step(state: &WorkflowState) -> Option<NextStep> {
    let phase = current_phase(state)?;
    let step = phase.steps.iter().find(|s| s.status.is_open())?;
    Some(NextStep {
        phase: phase.clone(),
        step: step.clone(),
    })
}

pub fn goal_divergence(state: &WorkflowState, threshold: u32) -> GoalDivergence {
    let open_goals = || state.goals.iter().filter(|g| !g.status.is_closed());

    GoalDivergence {
        consecutive_no_progress: state.consecutive_no_progress,
        threshold,
        diverging: threshold > 0 && state.consecutive_no_progress >= threshold,
        stalled_goals: open_goals()
            .filter(|g| g.is_stalled(threshold as usize))
            .map(|g| g.id.clone())
            .collect(),
        regressed_goals: open_goals()
            .filter(|g| g.has_regressed())
            .map(|g| g.id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::state::{Goal, ProgressEntry};
    use chrono::Utc;

    fn state() -> WorkflowState {
        let config: WorkflowConfig = toml::from_str(
            r#"
            [[phases]]
            id = "design"
            name = "Design"
            order = 1
            steps = [{ id = "s1", name = "Sketch" }, { id = "s2", name = "Review" }]

            [[phases]]
            id = "build"
            name = "Build"
            order = 2
            steps = [{ id = "s3", name = "Code" }]

            [[phases]]
            id = "ship"
            name = "Ship"
            order = 3
            "#,
        )
        .unwrap();
        WorkflowState::from_config(&config, None, Utc::now())
    }

    #[test]
    fn fresh_state_has_zero_progress() {
        let progress = summarize(&state());
        assert_eq!(progress.total_phases, 3);
        assert_eq!(progress.completed_phases, 0);
        assert_eq!(progress.overall_progress, 0);
        assert!(progress.current_phase.is_none());
    }

    #[test]
    fn no_phases_is_zero() {
        assert_eq!(overall_progress(&[]), 0);
    }

    #[test]
    fn in_progress_phase_counts_fraction_of_steps() {
        let mut s = state();
        s.phases[0].status = Status::InProgress;
        s.phases[0].steps[0].status = Status::Completed;
        s.current_phase_id = Some("design".into());

        let progress = summarize(&s);
        // weights 2 + 1 + 1 = 4, completed 2 * 0.5 = 1
        assert_eq!(progress.overall_progress, 25);
        let current = progress.current_phase.unwrap();
        assert_eq!(current.id, "design");
        assert_eq!(current.total_steps, 2);
        assert_eq!(current.completed_steps, 1);
    }

    #[test]
    fn empty_phases_weigh_one() {
        let mut s = state();
        s.phases[2].status = Status::Completed;
        assert_eq!(overall_progress(&s.phases), 25);

        s.phases[2].status = Status::InProgress;
        assert_eq!(overall_progress(&s.phases), 0);
    }

    #[test]
    fn pending_and_skipped_contribute_nothing() {
        let mut s = state();
        s.phases[0].steps[0].status = Status::Completed;
        s.phases[1].status = Status::Skipped;
        assert_eq!(overall_progress(&s.phases), 0);
    }

    #[test]
    fn summary_falls_back_to_first_in_progress_not_pending() {
        let mut s = state();
        assert!(summarize(&s).current_phase.is_none());
        assert_eq!(current_phase(&s).unwrap().id, "design");

        s.phases[1].status = Status::InProgress;
        assert_eq!(summarize(&s).current_phase.unwrap().id, "build");
        assert_eq!(current_phase(&s).unwrap().id, "build");
    }

    #[test]
    fn dangling_current_phase_id_falls_through() {
        let mut s = state();
        s.current_phase_id = Some("removed".into());
        assert!(summarize(&s).current_phase.is_none());
        assert_eq!(current_phase(&s).unwrap().id, "design");
    }

    #[test]
    fn current_phase_is_none_when_all_terminal() {
        let mut s = state();
        for phase in &mut s.phases {
            phase.status = Status::Completed;
        }
        assert!(current_phase(&s).is_none());
        assert!(next_step(&s).is_none());
        assert_eq!(summarize(&s).overall_progress, 100);
    }

    #[test]
    fn next_step_skips_finished_steps() {
        let mut s = state();
        s.phases[0].steps[0].status = Status::Completed;
        let next = next_step(&s).unwrap();
        assert_eq!(next.phase.id, "design");
        assert_eq!(next.step.id, "s2");

        s.phases[0].steps[1].status = Status::Skipped;
        assert!(next_step(&s).is_none());
    }

    #[test]
    fn divergence_flags_counter_and_goals() {
        let mut s = state();
        let mut goal = Goal::new("Launch".into(), Vec::new(), Utc::now());
        for progress in [40, 40, 30] {
            goal.record(ProgressEntry {
                timestamp: Utc::now(),
                progress,
                reason: "check-in".into(),
                iteration_id: None,
                phase_id: None,
            });
        }
        let id = goal.id.clone();
        s.goals.push(goal);
        s.consecutive_no_progress = 2;

        let divergence = goal_divergence(&s, 2);
        assert!(divergence.diverging);
        assert_eq!(divergence.stalled_goals, vec![id.clone()]);
        assert_eq!(divergence.regressed_goals, vec![id]);

        let relaxed = goal_divergence(&s, 3);
        assert!(!relaxed.diverging);
    }
}

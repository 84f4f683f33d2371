mod goal;
mod history;
mod workflow;

pub use goal::{Goal, GoalStatus, ProgressEntry};
pub use history::{
    ArchivedVersion, Decision, DecisionOption, FeedbackSummary, ImprovementStatus, Iteration,
    Priority, SuggestedImprovement,
};
pub use workflow::{merge_data, DataMap, Phase, Status, Step, WorkflowState, STATE_VERSION};

//! Persistent phase/step workflow tracking.
//!
//! A [`WorkflowEngine`] owns one state document per storage location and
//! exposes every change as a load → mutate → save operation returning an
//! [`OperationResult`]. Progress views are computed on demand by
//! [`progress`]; nothing derived is stored.

pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod result;
pub mod state;
pub mod store;

pub use config::{PhaseConfig, StepConfig, WorkflowConfig};
pub use engine::{GoalUpdate, NewDecision, NewImprovement, WorkflowEngine};
pub use error::WorkflowError;
pub use progress::{GoalDivergence, NextStep, PhaseProgress, WorkflowProgress};
pub use result::OperationResult;
pub use state::{
    ArchivedVersion, DataMap, Decision, DecisionOption, FeedbackSummary, Goal, GoalStatus,
    ImprovementStatus, Iteration, Phase, Priority, ProgressEntry, Status, Step,
    SuggestedImprovement, WorkflowState,
};
pub use store::DocumentStore;

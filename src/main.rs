mod cli;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{
    Cli, Command, GoalAction, ImproveAction, IterationAction, PhaseAction, StepAction,
};
use phasekeep::{DataMap, GoalUpdate, NewDecision, NewImprovement, WorkflowConfig, WorkflowEngine};
use ui::Reporter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = WorkflowConfig::load(&cli.config)
        .with_context(|| format!("Failed to load workflow template {}", cli.config.display()))?;
    let engine = WorkflowEngine::new(config, &cli.dir);
    let reporter = Reporter::new(cli.json);

    if !run(&engine, &reporter, cli.command) {
        std::process::exit(1);
    }
    Ok(())
}

fn to_data(entries: Vec<(String, Value)>) -> DataMap {
    entries.into_iter().collect()
}

fn run(engine: &WorkflowEngine, out: &Reporter, command: Command) -> bool {
    match command {
        Command::Init { project } => out.result("init", &engine.initialize(project)),
        Command::Reset { project } => out.result("reset", &engine.reset(project)),
        Command::Status => out.progress(&engine.get_progress()),
        Command::Current => out.result("current", &engine.get_current_phase()),
        Command::Next => out.result("next", &engine.get_next_step()),
        Command::Phase { action } => match action {
            PhaseAction::Start { phase } => out.result("phase start", &engine.start_phase(&phase)),
            PhaseAction::Complete { phase } => {
                out.result("phase complete", &engine.complete_phase(&phase))
            }
        },
        Command::Step { action } => match action {
            StepAction::Start { phase, step } => {
                out.result("step start", &engine.start_step(&phase, &step))
            }
            StepAction::Complete { phase, step, data } => {
                let data = (!data.is_empty()).then(|| to_data(data));
                out.result(
                    "step complete",
                    &engine.complete_step(&phase, &step, data),
                )
            }
        },
        Command::Artifact { phase, path } => {
            out.result("artifact", &engine.add_artifact(&phase, &path))
        }
        Command::Data { phase, entries } => {
            out.result("data", &engine.set_phase_data(&phase, to_data(entries)))
        }
        Command::Goal { action } => match action {
            GoalAction::Add {
                description,
                indicators,
            } => out.result("goal add", &engine.add_goal(&description, indicators)),
            GoalAction::Progress {
                goal,
                progress,
                reason,
                iteration,
                phase,
            } => {
                let update = GoalUpdate {
                    goal_id: goal,
                    progress,
                    reason,
                    iteration_id: iteration,
                    phase_id: phase,
                };
                out.result("goal progress", &engine.update_goal_progress(update))
            }
            GoalAction::Status { goal, status } => {
                out.result("goal status", &engine.set_goal_status(&goal, status.into()))
            }
        },
        Command::Iterate { action } => match action {
            IterationAction::Start {
                from,
                to,
                reason,
                restore_point,
            } => out.result(
                "iterate start",
                &engine.start_iteration(&from, &to, &reason, restore_point),
            ),
            IterationAction::Change { iteration, change } => out.result(
                "iterate change",
                &engine.record_iteration_change(&iteration, &change),
            ),
            IterationAction::Complete { iteration } => {
                out.result("iterate complete", &engine.complete_iteration(&iteration))
            }
        },
        Command::Decide {
            phase,
            title,
            context,
            options,
            choose,
            rationale,
            expected,
            tags,
        } => {
            let decision = NewDecision {
                phase_id: phase,
                title,
                context,
                options,
                chosen_option_id: choose,
                rationale,
                expected_outcome: expected,
                tags,
            };
            out.result("decide", &engine.record_decision(decision))
        }
        Command::Outcome { decision, outcome } => out.result(
            "outcome",
            &engine.record_decision_outcome(&decision, &outcome),
        ),
        Command::Archive { path, summary } => {
            out.result("archive", &engine.archive_version(&path, summary))
        }
        Command::Reflect { learnings, issues } => {
            out.result("reflect", &engine.record_reflection(learnings, issues))
        }
        Command::Improve { action } => match action {
            ImproveAction::Add {
                description,
                stages,
                priority,
                target,
            } => {
                let improvement = NewImprovement {
                    description,
                    affected_stages: stages,
                    priority: priority.into(),
                    target_version: target,
                };
                out.result("improve add", &engine.add_improvement(improvement))
            }
            ImproveAction::Status {
                improvement,
                status,
            } => out.result(
                "improve status",
                &engine.set_improvement_status(&improvement, status.into()),
            ),
        },
        Command::Divergence => out.result("divergence", &engine.get_goal_divergence()),
    }
}

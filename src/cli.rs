//! Interface de linha de comando do phasekeep baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] que mapeiam um a um
//! para as operações do [`WorkflowEngine`](phasekeep::WorkflowEngine),
//! e flags globais (--config, --dir, --json, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use phasekeep::{DecisionOption, GoalStatus, ImprovementStatus, Priority};
use serde_json::Value;

/// phasekeep: acompanha fases, passos e metas de um workflow entre sessões.
#[derive(Debug, Parser)]
#[command(name = "phasekeep", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Template do workflow (TOML ou JSON).
    #[arg(long, global = true, default_value = "workflow.toml")]
    pub config: PathBuf,

    /// Diretório base onde fica o diretório de armazenamento.
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Imprime o resultado bruto em JSON, sem formatação.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cria o documento de estado a partir do template.
    Init {
        /// Nome do projeto.
        #[arg(long)]
        project: Option<String>,
    },

    /// Descarta o estado atual e reinicializa.
    Reset {
        #[arg(long)]
        project: Option<String>,
    },

    /// Mostra o progresso geral do workflow.
    Status,

    /// Mostra a fase atual.
    Current,

    /// Mostra o próximo passo a executar.
    Next,

    /// Opera sobre fases.
    Phase {
        #[command(subcommand)]
        action: PhaseAction,
    },

    /// Opera sobre passos.
    Step {
        #[command(subcommand)]
        action: StepAction,
    },

    /// Registra um artefato gerado por uma fase.
    Artifact { phase: String, path: String },

    /// Mescla dados na fase (`chave=valor`, valor em JSON ou texto).
    Data {
        phase: String,
        #[arg(required = true, value_parser = parse_key_value)]
        entries: Vec<(String, Value)>,
    },

    /// Opera sobre metas.
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Registra e acompanha iterações (retornos a fases anteriores).
    Iterate {
        #[command(subcommand)]
        action: IterationAction,
    },

    /// Registra uma decisão entre opções enumeradas.
    Decide {
        /// Fase em que a decisão foi tomada.
        phase: String,
        /// Título da decisão.
        title: String,
        #[arg(long, default_value = "")]
        context: String,
        /// Opção no formato `id=descrição` (repetível).
        #[arg(long = "option", required = true, value_parser = parse_option)]
        options: Vec<DecisionOption>,
        /// Id da opção escolhida.
        #[arg(long)]
        choose: String,
        #[arg(long, default_value = "")]
        rationale: String,
        #[arg(long, default_value = "")]
        expected: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Registra o resultado observado de uma decisão.
    Outcome { decision: String, outcome: String },

    /// Arquiva a versão atual do produto e avança o número de versão.
    Archive {
        path: String,
        #[arg(long)]
        summary: Option<String>,
    },

    /// Registra uma reflexão (aprendizados e problemas).
    Reflect {
        #[arg(long = "learning")]
        learnings: Vec<String>,
        #[arg(long = "issue")]
        issues: Vec<String>,
    },

    /// Opera sobre melhorias sugeridas.
    Improve {
        #[command(subcommand)]
        action: ImproveAction,
    },

    /// Mostra os sinais de divergência das metas.
    Divergence,
}

#[derive(Debug, Subcommand)]
pub enum PhaseAction {
    Start { phase: String },
    Complete { phase: String },
}

#[derive(Debug, Subcommand)]
pub enum StepAction {
    Start {
        phase: String,
        step: String,
    },
    Complete {
        phase: String,
        step: String,
        /// Dado do passo no formato `chave=valor` (repetível).
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, Value)>,
    },
}

#[derive(Debug, Subcommand)]
pub enum GoalAction {
    Add {
        description: String,
        /// Indicador de sucesso (repetível).
        #[arg(long = "indicator")]
        indicators: Vec<String>,
    },
    Progress {
        goal: String,
        /// Progresso de 0 a 100.
        progress: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        iteration: Option<String>,
        #[arg(long)]
        phase: Option<String>,
    },
    Status {
        goal: String,
        status: GoalStatusArg,
    },
}

#[derive(Debug, Subcommand)]
pub enum IterationAction {
    Start {
        /// Fase de onde se volta.
        from: String,
        /// Fase para onde se volta.
        to: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        restore_point: Option<String>,
    },
    Change {
        iteration: String,
        change: String,
    },
    Complete {
        iteration: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ImproveAction {
    Add {
        description: String,
        #[arg(long = "stage")]
        stages: Vec<String>,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        #[arg(long)]
        target: Option<String>,
    },
    Status {
        improvement: String,
        status: ImprovementStatusArg,
    },
}

/// Status de meta aceito pela CLI, mapeado para [`GoalStatus`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GoalStatusArg {
    Active,
    Achieved,
    Abandoned,
    Revised,
}

impl From<GoalStatusArg> for GoalStatus {
    fn from(arg: GoalStatusArg) -> Self {
        match arg {
            GoalStatusArg::Active => GoalStatus::Active,
            GoalStatusArg::Achieved => GoalStatus::Achieved,
            GoalStatusArg::Abandoned => GoalStatus::Abandoned,
            GoalStatusArg::Revised => GoalStatus::Revised,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ImprovementStatusArg {
    Pending,
    InProgress,
    Completed,
    Deferred,
}

impl From<ImprovementStatusArg> for ImprovementStatus {
    fn from(arg: ImprovementStatusArg) -> Self {
        match arg {
            ImprovementStatusArg::Pending => ImprovementStatus::Pending,
            ImprovementStatusArg::InProgress => ImprovementStatus::InProgress,
            ImprovementStatusArg::Completed => ImprovementStatus::Completed,
            ImprovementStatusArg::Deferred => ImprovementStatus::Deferred,
        }
    }
}

// `chave=valor`: o valor é lido como JSON e, se não for JSON válido, como texto.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

// `id=descrição` para uma opção de decisão.
fn parse_option(raw: &str) -> Result<DecisionOption, String> {
    let (id, description) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=description, got `{raw}`"))?;
    if id.is_empty() {
        return Err(format!("empty option id in `{raw}`"));
    }
    Ok(DecisionOption {
        id: id.to_string(),
        description: description.to_string(),
        pros: Vec::new(),
        cons: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_parses_step_complete_with_data() {
        let cli = Cli::parse_from([
            "phasekeep",
            "step",
            "complete",
            "design",
            "s1",
            "--data",
            "reviewers=2",
            "--data",
            "note=looks good",
        ]);
        match cli.command {
            Command::Step {
                action: StepAction::Complete { phase, step, data },
            } => {
                assert_eq!(phase, "design");
                assert_eq!(step, "s1");
                assert_eq!(
                    data,
                    vec![
                        ("reviewers".to_string(), json!(2)),
                        ("note".to_string(), json!("looks good")),
                    ]
                );
            }
            _ => panic!("expected Step Complete command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "phasekeep",
            "--config",
            "wf.json",
            "--dir",
            "/tmp/project",
            "--json",
            "--verbose",
            "status",
        ]);
        assert!(cli.verbose);
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("wf.json"));
        assert_eq!(cli.dir, PathBuf::from("/tmp/project"));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["phasekeep", "init"]);
        assert_eq!(cli.config, PathBuf::from("workflow.toml"));
        assert_eq!(cli.dir, PathBuf::from("."));
        assert!(matches!(cli.command, Command::Init { project: None }));
    }

    #[test]
    fn cli_parses_decision_options() {
        let cli = Cli::parse_from([
            "phasekeep",
            "decide",
            "design",
            "Storage",
            "--option",
            "json=JSON file",
            "--option",
            "db=Database",
            "--choose",
            "json",
        ]);
        match cli.command {
            Command::Decide {
                options, choose, ..
            } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[1].description, "Database");
                assert_eq!(choose, "json");
            }
            _ => panic!("expected Decide command"),
        }
    }

    #[test]
    fn cli_parses_improvement_priority() {
        let cli = Cli::parse_from(["phasekeep", "improve", "add", "Faster CI", "--priority", "high"]);
        match cli.command {
            Command::Improve {
                action: ImproveAction::Add { priority, .. },
            } => assert_eq!(priority, PriorityArg::High),
            _ => panic!("expected Improve Add command"),
        }
    }

    #[test]
    fn key_value_requires_separator() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
        assert_eq!(
            parse_key_value("flags={\"a\":true}").unwrap(),
            ("flags".to_string(), json!({"a": true}))
        );
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}

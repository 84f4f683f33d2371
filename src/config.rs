//! Template de workflow carregado a partir de `workflow.toml` (ou `.json`).
//!
//! A struct [`WorkflowConfig`] descreve a identidade do workflow, o diretório
//! de armazenamento e a lista ordenada de fases com seus passos.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! O template só é lido em `initialize`/`reset`; depois disso o documento
//! persistido é a única fonte de verdade.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::WorkflowError;

/// Diretório de armazenamento padrão, relativo ao diretório base.
pub const DEFAULT_STORAGE_DIR: &str = ".workflow";

/// Template de nível superior carregado de `workflow.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Identificador único do tipo de workflow.
    #[serde(default = "default_workflow_id")]
    pub workflow_id: String,

    /// Nome legível do workflow.
    #[serde(default = "default_workflow_name")]
    pub workflow_name: String,

    /// Sobrescreve o diretório de armazenamento (padrão: `.workflow`).
    #[serde(default)]
    pub storage_dir: Option<String>,

    /// Atualizações de metas sem avanço antes de sinalizar divergência.
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold: u32,

    /// Definições de fase, em qualquer ordem; `order` define a sequência.
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

/// Definição de uma fase no template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Posição de execução (1-based, única por workflow).
    pub order: u32,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    /// Artefatos já associados à fase na criação.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// Definição de um passo dentro de uma fase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// Valor padrão para o identificador: "workflow".
fn default_workflow_id() -> String {
    "workflow".to_string()
}

// Valor padrão para o nome: "Workflow".
fn default_workflow_name() -> String {
    "Workflow".to_string()
}

// Valor padrão para o limiar de divergência: 3.
fn default_divergence_threshold() -> u32 {
    3
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            workflow_id: default_workflow_id(),
            workflow_name: default_workflow_name(),
            storage_dir: None,
            divergence_threshold: default_divergence_threshold(),
            phases: Vec::new(),
        }
    }
}

impl WorkflowConfig {
    /// Carrega o template do caminho fornecido.
    /// Usa valores padrão se o arquivo não existir.
    /// Arquivos `.json` são lidos como JSON; qualquer outra extensão como TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str::<WorkflowConfig>(&contents)
                .with_context(|| format!("Failed to parse config as JSON: {}", path.display()))?
        } else {
            toml::from_str::<WorkflowConfig>(&contents)
                .with_context(|| format!("Failed to parse config as TOML: {}", path.display()))?
        };

        Ok(config)
    }

    /// Nome efetivo do diretório de armazenamento.
    pub fn storage_dir(&self) -> &str {
        self.storage_dir.as_deref().unwrap_or(DEFAULT_STORAGE_DIR)
    }

    /// Verifica as invariantes do template antes de semear um documento:
    /// ids de fase não vazios e únicos, `order` positivo e único,
    /// ids de passo únicos dentro de cada fase.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut phase_ids = HashSet::new();
        let mut orders = HashSet::new();

        for phase in &self.phases {
            if phase.id.trim().is_empty() {
                return Err(WorkflowError::Config("phase id must not be empty".into()));
            }
            if !phase_ids.insert(phase.id.as_str()) {
                return Err(WorkflowError::Config(format!(
                    "duplicate phase id: {}",
                    phase.id
                )));
            }
            if phase.order == 0 {
                return Err(WorkflowError::Config(format!(
                    "phase {} must have a positive order",
                    phase.id
                )));
            }
            if !orders.insert(phase.order) {
                return Err(WorkflowError::Config(format!(
                    "duplicate phase order {} (phase {})",
                    phase.order, phase.id
                )));
            }

            let mut step_ids = HashSet::new();
            for step in &phase.steps {
                if !step_ids.insert(step.id.as_str()) {
                    return Err(WorkflowError::Config(format!(
                        "duplicate step id {} in phase {}",
                        step.id, phase.id
                    )));
                }
            }
        }

        Ok(())
    }
}

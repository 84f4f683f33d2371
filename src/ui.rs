//! Saída de terminal do phasekeep: barra de progresso e mensagens coloridas.
//!
//! Usa `indicatif` para desenhar o progresso geral do workflow e `console`
//! para estilização com cores. Os resultados das operações vão para stdout
//! em JSON; as marcas de sucesso/falha vão para stderr.

use console::Style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

use phasekeep::{OperationResult, WorkflowProgress};

/// Impressão de resultados de operação no terminal.
///
/// Sucesso é mostrado em verde com checkmark; falha em vermelho com X;
/// o progresso da fase atual em amarelo.
pub struct Reporter {
    // Imprime apenas o JSON bruto, sem marcas nem barra.
    raw: bool,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Reporter {
    pub fn new(raw: bool) -> Self {
        Self {
            raw,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Imprime o resultado uniforme e devolve `success`.
    pub fn result<T: Serialize>(&self, operation: &str, result: &OperationResult<T>) -> bool {
        if !self.raw {
            match &result.error {
                None => eprintln!("  {} {operation}", self.green.apply_to("✓")),
                Some(error) => eprintln!("  {} {operation}: {error}", self.red.apply_to("✗")),
            }
        }
        println!(
            "{}",
            serde_json::to_string_pretty(result).unwrap_or_default()
        );
        result.success
    }

    /// Desenha a barra de progresso geral e o resumo da fase atual.
    /// Em modo bruto, cai no JSON do resultado.
    pub fn progress(&self, result: &OperationResult<WorkflowProgress>) -> bool {
        let progress = match (&result.data, self.raw) {
            (Some(progress), false) => progress,
            _ => return self.result("status", result),
        };

        let pb = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stdout());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.green/white} {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_position(u64::from(progress.overall_progress));
        pb.abandon();

        println!(
            "  Phases: {}/{} completed",
            progress.completed_phases, progress.total_phases
        );
        match &progress.current_phase {
            Some(current) => println!(
                "  {} {} ({}): {}/{} steps",
                self.yellow.apply_to("▶"),
                current.name,
                current.id,
                current.completed_steps,
                current.total_steps
            ),
            None => println!("  {} no phase in progress", self.yellow.apply_to("·")),
        }
        true
    }
}

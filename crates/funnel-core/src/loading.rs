//! Simulated loading sequence shown between wizard steps
//!
//! A [`LoadingScript`] is a fixed, ordered list of progress labels played
//! over a total duration. The label advances every `total / (labels + 1)`;
//! after the last label the sequence is marked complete and, following a
//! short completion delay, the completion callback runs. Nothing real
//! happens behind it, but the run is cancelable at any point.

use crate::timer::TimerHandle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Delay between the last label and the completion callback
pub const DEFAULT_COMPLETION_DELAY_MS: u64 = 1_500;

/// Ordered progress labels played over a fixed duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingScript {
    /// Modal title
    pub title: String,
    /// Progress labels in display order
    pub labels: Vec<String>,
    /// Text shown once every label has played
    pub completion_message: String,
    /// Total duration of the label sequence
    pub total_ms: u64,
    /// Delay between completion and the callback
    #[serde(default = "default_completion_delay")]
    pub completion_delay_ms: u64,
}

fn default_completion_delay() -> u64 {
    DEFAULT_COMPLETION_DELAY_MS
}

impl LoadingScript {
    /// Create a script
    #[must_use]
    pub fn new<I, S>(title: impl Into<String>, labels: I, total: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            completion_message: "Concluído!".to_string(),
            total_ms: u64::try_from(total.as_millis()).unwrap_or(u64::MAX),
            completion_delay_ms: DEFAULT_COMPLETION_DELAY_MS,
        }
    }

    /// Set completion message
    #[inline]
    #[must_use]
    pub fn with_completion_message(mut self, message: impl Into<String>) -> Self {
        self.completion_message = message.into();
        self
    }

    /// Set completion delay
    #[inline]
    #[must_use]
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Played after the profile step
    #[must_use]
    pub fn profile() -> Self {
        Self::new(
            "Processando Cadastro",
            [
                "Verificando dados do CPF",
                "Consultando Carteira de Motorista",
                "Validando documentação do veículo",
                "Analisando disponibilidade na região",
                "Verificando histórico de entregas",
            ],
            Duration::from_millis(7_000),
        )
        .with_completion_message("Cadastro aprovado!")
    }

    /// Played after the municipality step
    #[must_use]
    pub fn municipalities() -> Self {
        Self::new(
            "Processando Seleção",
            [
                "Verificando municípios selecionados",
                "Calculando rotas de entrega",
                "Analisando demanda regional",
                "Verificando disponibilidade de vagas",
            ],
            Duration::from_millis(12_000),
        )
        .with_completion_message("Municípios confirmados!")
    }

    /// Played after the EPI step
    #[must_use]
    pub fn epi() -> Self {
        Self::new(
            "Finalizando Cadastro",
            [
                "Registrando tamanhos do kit EPI",
                "Verificando disponibilidade em estoque",
                "Preparando envio do material",
                "Finalizando cadastro de entregador",
            ],
            Duration::from_millis(12_000),
        )
        .with_completion_message("Cadastro finalizado!")
    }

    /// Total duration of the label sequence
    #[inline]
    #[must_use]
    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }

    /// Delay between completion and the callback
    #[inline]
    #[must_use]
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    /// Time between label advances
    #[must_use]
    pub fn step_interval(&self) -> Duration {
        let slots = u32::try_from(self.labels.len() + 1).unwrap_or(u32::MAX);
        (self.total() / slots).max(Duration::from_millis(1))
    }

    /// Label for a step index
    #[must_use]
    pub fn label(&self, step: usize) -> Option<&str> {
        self.labels.get(step).map(String::as_str)
    }
}

/// Observable state of a running sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingProgress {
    /// Index of the label being shown
    pub current_step: usize,
    /// Every label has played
    pub complete: bool,
    /// Completion callback has run
    pub finished: bool,
}

/// A running loading sequence
///
/// Cancelled on [`cancel`](Self::cancel) or drop; a cancelled sequence
/// never invokes its completion callback.
#[derive(Debug)]
pub struct LoadingSequence {
    progress: watch::Receiver<LoadingProgress>,
    handle: TimerHandle,
}

impl LoadingSequence {
    /// Start playing `script`, then run `on_complete`
    pub fn start<F>(script: &LoadingScript, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = watch::channel(LoadingProgress::default());
        let interval = script.step_interval();
        let delay = script.completion_delay();
        let labels = script.labels.len();
        let title = script.title.clone();

        let handle = TimerHandle::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let current = tx.borrow().current_step;
                if current + 1 < labels {
                    tx.send_modify(|p| p.current_step = current + 1);
                } else {
                    tx.send_modify(|p| p.complete = true);
                    break;
                }
            }

            time::sleep(delay).await;
            tracing::debug!("Loading sequence '{}' finished", title);
            tx.send_modify(|p| p.finished = true);
            on_complete();
        });

        Self {
            progress: rx,
            handle,
        }
    }

    /// Current progress snapshot
    #[inline]
    #[must_use]
    pub fn progress(&self) -> LoadingProgress {
        *self.progress.borrow()
    }

    /// Progress updates
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadingProgress> {
        self.progress.clone()
    }

    /// True until the callback ran or the sequence was cancelled
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the sequence without running the callback
    pub fn cancel(&mut self) -> bool {
        let pending = self.handle.cancel();
        if pending {
            tracing::debug!("Loading sequence cancelled at step {}", self.progress().current_step);
        }
        pending
    }

    /// Wait until the sequence ends
    pub async fn finished(self) {
        self.handle.join().await;
    }
}

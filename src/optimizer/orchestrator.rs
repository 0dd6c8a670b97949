//! # Optimization Orchestrator
//!
//! Macchina a stati che coordina selezione, compressione e download.
//!
//! ## Stati:
//! `Idle → Selecting → Optimizing → {Completed | Failed} → Selecting` su nuova
//! selezione, `Idle` su `clear()`.
//!
//! ## Regole:
//! - Al massimo una ottimizzazione in volo: la seconda chiamata riceve
//!   `AlreadyInProgress` e non tocca la prima
//! - Strategia non pronta → `StrategyUnavailable`, stato invariato
//! - Un `Reference` restituito dalla strategia viene risolto subito
//! - `clear()` durante `Optimizing` interrompe il tentativo (il future viene
//!   droppato insieme ai buffer trasferiti) e l'`optimize` interrotto
//!   restituisce `Cancelled`
//! - Lo slot dell'output viene sostituito sotto lock solo su successo
//! - Se il chiamante droppa il future di `optimize`, il run passa a
//!   `Failed { Cancelled }` e la sorgente resta selezionata
//!
//! ## Esempio:
//! ```ignore
//! let orchestrator = Orchestrator::new(strategy, ProgressSimulator::default(), OrchestratorSettings::default());
//! orchestrator.select_artifact(bytes, "report.pdf", "application/pdf")?;
//! let stats = orchestrator.optimize(QualityTier::Balanced).await?;
//! let artifact = orchestrator.download_last()?;
//! ```

use crate::artifact::{OptimizedArtifact, SourceArtifact};
use crate::error::{OptimizeError, OptimizeResult};
use crate::progress::{self, ProgressSimulator, ProgressState};
use crate::quality::{self, QualityTier, SizeEstimate};
use crate::stats::{self, CompressionStats};
use crate::strategy::{Checkpoint, CompressionStrategy, OutcomeArtifact, StrategyKind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Default upper bound for a selected document (50 MB)
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 50 * 1024 * 1024;

/// Observable lifecycle of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorState {
    Idle,
    Selecting,
    Optimizing,
    Completed,
    Failed {
        strategy: StrategyKind,
        error: OptimizeError,
    },
}

impl OrchestratorState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Optimizing => "optimizing",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_source_bytes: u64,
    /// Accepted media types; empty accepts everything
    pub accepted_media_types: Vec<String>,
    pub progress_messages: Vec<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            accepted_media_types: vec!["application/pdf".to_string()],
            progress_messages: progress::default_messages(),
        }
    }
}

struct Session {
    state: OrchestratorState,
    source: Option<SourceArtifact>,
    held: Option<OptimizedArtifact>,
    run: u64,
    cancel: Option<oneshot::Sender<()>>,
}

/// Owns the source, the active strategy, the simulator and the last output
pub struct Orchestrator {
    strategy: Arc<dyn CompressionStrategy>,
    progress: ProgressSimulator,
    settings: OrchestratorSettings,
    session: Mutex<Session>,
    state_tx: watch::Sender<OrchestratorState>,
    stats_tx: watch::Sender<Option<CompressionStats>>,
}

impl Orchestrator {
    pub fn new(
        strategy: Arc<dyn CompressionStrategy>,
        progress: ProgressSimulator,
        settings: OrchestratorSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(OrchestratorState::Idle);
        let (stats_tx, _) = watch::channel(None);

        Self {
            strategy,
            progress,
            settings,
            session: Mutex::new(Session {
                state: OrchestratorState::Idle,
                source: None,
                held: None,
                run: 0,
                cancel: None,
            }),
            state_tx,
            stats_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, session: &mut Session, state: OrchestratorState) {
        debug!("Orchestrator: {} -> {}", session.state.name(), state.name());
        session.state = state.clone();
        self.state_tx.send_replace(state);
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn state(&self) -> OrchestratorState {
        self.lock().state.clone()
    }

    pub fn last_stats(&self) -> Option<CompressionStats> {
        self.stats_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<Option<CompressionStats>> {
        self.stats_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    fn accepts(&self, media_type: &str) -> bool {
        if self.settings.accepted_media_types.is_empty() {
            return true;
        }
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        self.settings
            .accepted_media_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(essence))
    }

    /// Replace the source document; discards any held output
    pub fn select_artifact(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        name: impl Into<String>,
        media_type: impl Into<String>,
    ) -> OptimizeResult<()> {
        let mut session = self.lock();
        if session.state == OrchestratorState::Optimizing {
            return Err(OptimizeError::AlreadyInProgress);
        }

        let source = SourceArtifact::new(bytes, name, media_type);
        if source.is_empty() {
            return Err(OptimizeError::NoSourceProvided(format!("{} is empty", source.name())));
        }
        if !self.accepts(source.media_type()) {
            return Err(OptimizeError::NoSourceProvided(format!(
                "unsupported media type '{}' for {}",
                source.media_type(),
                source.name()
            )));
        }
        if source.len() > self.settings.max_source_bytes {
            return Err(OptimizeError::SourceTooLarge {
                size: source.len(),
                limit: self.settings.max_source_bytes,
            });
        }

        info!("📄 Selected {} ({} bytes)", source.name(), source.len());
        session.source = Some(source);
        session.held = None;
        self.stats_tx.send_replace(None);
        self.transition(&mut session, OrchestratorState::Selecting);
        Ok(())
    }

    /// Expected output size of the selected document for `tier`
    pub fn estimate(&self, tier: QualityTier) -> OptimizeResult<SizeEstimate> {
        let session = self.lock();
        let source = session.source.as_ref().ok_or_else(no_source)?;
        Ok(quality::describe(tier).estimate(source.len()))
    }

    /// Run the active strategy on the selected document
    pub async fn optimize(&self, tier: QualityTier) -> OptimizeResult<CompressionStats> {
        self.ensure_can_start()?;

        if !self.strategy.is_ready().await {
            let err = self.strategy.unavailable();
            warn!("⚠️ {}", err);
            return Err(err);
        }

        let (source, run, mut cancel_rx) = {
            let mut session = self.lock();
            self.ensure_startable(&session)?;
            let source = session.source.clone().ok_or_else(no_source)?;
            let (cancel_tx, cancel_rx) = oneshot::channel();
            session.run += 1;
            session.cancel = Some(cancel_tx);
            self.transition(&mut session, OrchestratorState::Optimizing);
            (source, session.run, cancel_rx)
        };

        info!(
            "🚀 Optimizing {} with {} ({})",
            source.name(),
            self.strategy.kind(),
            quality::describe(tier).label
        );
        self.progress.start(self.settings.progress_messages.clone());

        let progress = self.progress.clone();
        let on_checkpoint = move |checkpoint: Checkpoint| {
            debug!("Checkpoint: {}", checkpoint.message);
            progress.advance_checkpoint(checkpoint.message, checkpoint.percent_hint);
        };

        let mut guard = RunGuard {
            orchestrator: self,
            run,
            armed: true,
        };
        let started = Instant::now();
        let result = tokio::select! {
            result = self.run_strategy(&source, tier, &on_checkpoint, started) => result,
            _ = &mut cancel_rx => Err(OptimizeError::Cancelled),
        };
        guard.armed = false;

        let mut session = self.lock();
        if session.run != run || session.state != OrchestratorState::Optimizing {
            debug!("Run {} was cleared before finishing", run);
            return Err(OptimizeError::Cancelled);
        }
        session.cancel = None;

        match result {
            Ok((stats, bytes)) => {
                session.held = Some(OptimizedArtifact {
                    bytes,
                    file_name: source.suggested_output_name(tier),
                });
                self.stats_tx.send_replace(Some(stats.clone()));
                self.transition(&mut session, OrchestratorState::Completed);
                self.progress.complete();
                info!("✅ {}", stats.format_summary());
                Ok(stats)
            }
            Err(err) => {
                self.transition(
                    &mut session,
                    OrchestratorState::Failed {
                        strategy: self.strategy.kind(),
                        error: err.clone(),
                    },
                );
                self.progress.cancel();
                warn!("❌ Optimization failed ({}): {}", self.strategy.kind(), err);
                Err(err)
            }
        }
    }

    async fn run_strategy(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: &(dyn Fn(Checkpoint) + Send + Sync),
        started: Instant,
    ) -> OptimizeResult<(CompressionStats, Arc<[u8]>)> {
        let mut outcome = self.strategy.attempt(source, tier, on_checkpoint).await?;

        if let OutcomeArtifact::Reference(reference) = &outcome.artifact {
            debug!("Retrieving {}", reference);
            on_checkpoint(Checkpoint::new("📥 Downloading optimized document..."));
            let bytes = self.strategy.retrieve(reference).await?;
            outcome.artifact = OutcomeArtifact::Payload(bytes);
        }

        let stats = stats::normalize(&outcome, source, tier, Some(started.elapsed()));
        let OutcomeArtifact::Payload(bytes) = outcome.artifact else {
            return Err(OptimizeError::RemoteFailure("artifact reference was not resolved".to_string()));
        };
        Ok((stats, bytes.into()))
    }

    fn ensure_can_start(&self) -> OptimizeResult<()> {
        let session = self.lock();
        self.ensure_startable(&session)
    }

    fn ensure_startable(&self, session: &Session) -> OptimizeResult<()> {
        match session.state {
            OrchestratorState::Optimizing => Err(OptimizeError::AlreadyInProgress),
            OrchestratorState::Idle => Err(no_source()),
            _ if session.source.is_none() => Err(no_source()),
            _ => Ok(()),
        }
    }

    /// Last successful output, only while `Completed`
    pub fn download_last(&self) -> OptimizeResult<OptimizedArtifact> {
        let session = self.lock();
        match (&session.state, &session.held) {
            (OrchestratorState::Completed, Some(artifact)) => Ok(artifact.clone()),
            _ => Err(OptimizeError::NothingToDownload),
        }
    }

    /// Abort any in-flight attempt and forget source and output
    pub fn clear(&self) {
        let mut session = self.lock();
        if let Some(cancel) = session.cancel.take() {
            info!("🛑 Cancelling in-flight optimization");
            let _ = cancel.send(());
        }
        session.run += 1;
        session.source = None;
        session.held = None;
        self.stats_tx.send_replace(None);
        self.progress.cancel();
        self.transition(&mut session, OrchestratorState::Idle);
    }
}

/// Moves a run out of `Optimizing` when its `optimize` future is dropped
struct RunGuard<'a> {
    orchestrator: &'a Orchestrator,
    run: u64,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let orchestrator = self.orchestrator;
        let mut session = orchestrator.lock();
        if session.run != self.run || session.state != OrchestratorState::Optimizing {
            return;
        }
        warn!("⚠️ Optimization run {} abandoned by its caller", self.run);
        session.cancel = None;
        orchestrator.transition(
            &mut session,
            OrchestratorState::Failed {
                strategy: orchestrator.strategy.kind(),
                error: OptimizeError::Cancelled,
            },
        );
        orchestrator.progress.cancel();
    }
}

fn no_source() -> OptimizeError {
    OptimizeError::NoSourceProvided("select a document first".to_string())
}

//! # Compression Strategy Module
//!
//! Capability polimorfica che unifica i diversi meccanismi di compressione.
//!
//! ## Responsabilità:
//! - Definisce il trait `CompressionStrategy` richiesto dall'orchestratore
//! - Definisce la forma grezza dell'esito (`CompressionOutcome`)
//! - Sceglie una strategia pronta tra più candidati (`discover`)
//!
//! ## Varianti:
//! - `remote`: un solo round trip HTTP verso un backend
//! - `worker`: canale persistente verso un worker esterno, molti checkpoint
//! - `local`: approssimazione deterministica, nessuna trasformazione reale
//! - `library`: delega a una libreria di struttura documento (lopdf)

pub mod library;
pub mod local;
pub mod remote;
pub mod worker;

pub use library::{DocumentLibrary, LibraryBased, LibraryError, LopdfLibrary};
pub use local::LocalApproximate;
pub use remote::RemoteBackend;
pub use worker::WorkerChannel;

use crate::artifact::SourceArtifact;
use crate::error::{OptimizeError, OptimizeResult};
use crate::quality::QualityTier;
use crate::stats::VerificationStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Concrete mechanism that produced (or failed to produce) an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RemoteBackend,
    WorkerChannel,
    LocalApproximate,
    LibraryBased,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RemoteBackend => "remote backend",
            Self::WorkerChannel => "worker channel",
            Self::LocalApproximate => "local approximation",
            Self::LibraryBased => "document library",
        };
        f.write_str(name)
    }
}

/// Intermediate progress signal emitted before the terminal outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub message: String,
    /// Optional forward jump for the displayed percentage
    pub percent_hint: Option<u8>,
}

impl Checkpoint {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            percent_hint: None,
        }
    }

    pub fn with_percent(message: impl Into<String>, percent: u8) -> Self {
        Self {
            message: message.into(),
            percent_hint: Some(percent),
        }
    }
}

/// Callback receiving checkpoints in emission order
pub type OnCheckpoint<'a> = &'a (dyn Fn(Checkpoint) + Send + Sync);

/// Where the produced bytes live
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeArtifact {
    Payload(Vec<u8>),
    /// Identifier the strategy can `retrieve` the bytes with
    Reference(String),
}

/// Statistics as reported by a remote backend. Field names follow the
/// backend's JSON; sizes may come as bytes or as megabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportedStats {
    #[serde(default)]
    pub original_size_bytes: Option<u64>,
    #[serde(default)]
    pub original_size_mb: Option<f64>,
    #[serde(default)]
    pub optimized_size_bytes: Option<u64>,
    #[serde(default)]
    pub optimized_size_mb: Option<f64>,
    #[serde(default)]
    pub reduction_percentage: Option<f64>,
    #[serde(default)]
    pub verification_status: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub pages_processed: Option<u32>,
}

const MB: f64 = 1024.0 * 1024.0;

impl ReportedStats {
    pub fn original_bytes(&self) -> Option<u64> {
        self.original_size_bytes
            .or_else(|| self.original_size_mb.map(|mb| (mb * MB).round() as u64))
    }

    pub fn optimized_bytes(&self) -> Option<u64> {
        self.optimized_size_bytes
            .or_else(|| self.optimized_size_mb.map(|mb| (mb * MB).round() as u64))
    }

    /// Map the backend's free-text verification to a status
    pub fn verification(&self) -> VerificationStatus {
        match self.verification_status.as_deref() {
            Some(s) if s.to_uppercase().contains("VERIFIED") && !s.to_uppercase().contains("FAILED") => {
                VerificationStatus::Verified
            }
            _ => VerificationStatus::Unknown,
        }
    }
}

/// Raw, strategy-specific result. Failures travel on the `Err` side of
/// `attempt`, so an outcome never carries both payload and failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub artifact: OutcomeArtifact,
    pub reported: Option<ReportedStats>,
    pub verification: VerificationStatus,
    pub strategy: StrategyKind,
}

/// Capability every compression mechanism exposes to the orchestrator
#[async_trait]
pub trait CompressionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Readiness probe; the orchestrator never attempts a not-ready strategy
    async fn is_ready(&self) -> bool {
        true
    }

    /// Operator-facing remediation text for `StrategyUnavailable`
    fn remediation(&self) -> String {
        format!("{} is not ready", self.kind())
    }

    async fn attempt(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<CompressionOutcome>;

    /// Fetch the bytes behind an `OutcomeArtifact::Reference`
    async fn retrieve(&self, reference: &str) -> OptimizeResult<Vec<u8>> {
        Err(OptimizeError::RemoteFailure(format!(
            "{} cannot retrieve artifact reference {}",
            self.kind(),
            reference
        )))
    }

    fn unavailable(&self) -> OptimizeError {
        OptimizeError::StrategyUnavailable {
            strategy: self.kind(),
            remediation: self.remediation(),
        }
    }
}

/// Pick the first ready strategy, in preference order. Probes run concurrently.
pub async fn discover(
    candidates: Vec<Arc<dyn CompressionStrategy>>,
) -> OptimizeResult<Arc<dyn CompressionStrategy>> {
    let probes = candidates.iter().map(|c| c.is_ready());
    let readiness = futures::future::join_all(probes).await;

    for (candidate, ready) in candidates.iter().zip(readiness) {
        debug!("Readiness probe: {} -> {}", candidate.kind(), ready);
        if ready {
            info!("🔧 Using {} strategy", candidate.kind());
            return Ok(Arc::clone(candidate));
        }
    }

    Err(match candidates.first() {
        Some(preferred) => preferred.unavailable(),
        None => OptimizeError::StrategyUnavailable {
            strategy: StrategyKind::LocalApproximate,
            remediation: "no compression strategy configured".to_string(),
        },
    })
}

//! # Local Approximate Strategy
//!
//! Strategia locale che NON comprende la struttura del documento.
//!
//! Deriva in modo deterministico la dimensione di output come
//! `floor(original * retained_percent / 100)` e sintetizza una sequenza di byte
//! di quella lunghezza, riusando le finestre di header e footer del sorgente come
//! segnaposto. Non è una trasformazione reale: lo stato di verifica è sempre
//! `Unknown`, mai `Verified`.
//!
//! I ritardi tra i passi servono solo a dare un ritmo percepito al lavoro.

use super::{Checkpoint, CompressionOutcome, CompressionStrategy, OnCheckpoint, OutcomeArtifact, StrategyKind};
use crate::artifact::SourceArtifact;
use crate::error::OptimizeResult;
use crate::quality::{self, QualityTier};
use crate::stats::VerificationStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Size of the header and footer windows copied from the source
const WINDOW: usize = 1024;

/// Pacing steps: message and delay as a fraction (per mille) of the base delay
const STEPS: [(&str, u32); 3] = [
    ("📖 Analyzing document structure...", 1000),
    ("⚙️ Applying compression...", 1500),
    ("✨ Finalizing optimization...", 800),
];

/// Deterministic size approximation, labeled `Unknown`
pub struct LocalApproximate {
    base_delay: Duration,
}

impl LocalApproximate {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    /// No artificial pacing
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Output length for a tier
    pub fn target_len(original: usize, tier: QualityTier) -> usize {
        let retained = quality::describe(tier).retained_percent() as u128;
        (original as u128 * retained / 100) as usize
    }

    /// Synthesize `target` bytes: header window, cyclic fill, footer window
    pub fn synthesize(original: &[u8], target: usize) -> Vec<u8> {
        let len = original.len();
        let mut out = vec![0u8; target];
        if len == 0 || target == 0 {
            return out;
        }

        let head = WINDOW.min(len).min(target);
        out[..head].copy_from_slice(&original[..head]);

        for (i, byte) in out.iter_mut().enumerate().skip(head) {
            *byte = original[i % len];
        }

        let tail = WINDOW.min(len).min(target - head);
        out[target - tail..].copy_from_slice(&original[len - tail..]);

        out
    }
}

#[async_trait]
impl CompressionStrategy for LocalApproximate {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LocalApproximate
    }

    async fn attempt(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<CompressionOutcome> {
        for (message, per_mille) in STEPS {
            on_checkpoint(Checkpoint::new(message));
            let delay = self.base_delay * per_mille / 1000;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let target = Self::target_len(source.bytes().len(), tier);
        debug!(
            "Local approximation for {}: {} -> {} bytes ({})",
            source.name(),
            source.len(),
            target,
            tier
        );

        Ok(CompressionOutcome {
            artifact: OutcomeArtifact::Payload(Self::synthesize(source.bytes(), target)),
            reported: None,
            verification: VerificationStatus::Unknown,
            strategy: StrategyKind::LocalApproximate,
        })
    }
}

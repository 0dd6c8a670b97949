//! # Result Normalizer Module
//!
//! Converte l'esito grezzo di qualsiasi strategia nella forma canonica
//! `CompressionStats`, l'unica da cui il presentation layer può dipendere.
//!
//! ## Regole di normalizzazione:
//! - `reduction_percent = round((original - output) / original * 100)`, mai negativo
//! - Output della stessa dimensione del sorgente → `OriginalFallback`
//! - Payload identico byte per byte al sorgente → `OriginalFallback`
//! - Altrimenti si usa l'indicazione della strategia (`Verified` / `Unknown`)
//! - Reference non risolto senza dimensione riportata → `output_size_bytes`
//!   assente, riduzione 0, `Unknown`
//!
//! Deterministico, nessun I/O.

use crate::artifact::SourceArtifact;
use crate::quality::{self, QualityTier};
use crate::strategy::{CompressionOutcome, OutcomeArtifact, StrategyKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether the output was confirmed as a genuine readable transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    OriginalFallback,
    Unknown,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("VERIFIED READABLE"),
            Self::OriginalFallback => f.write_str("ORIGINAL FILE PROVIDED"),
            Self::Unknown => f.write_str("NOT VERIFIED"),
        }
    }
}

/// Canonical, strategy-independent statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    pub original_size_bytes: u64,
    /// None when the output was never measured
    pub output_size_bytes: Option<u64>,
    pub reduction_percent: u8,
    pub quality_label: String,
    pub verification_status: VerificationStatus,
    pub elapsed_millis: Option<u64>,
    pub strategy: StrategyKind,
}

impl CompressionStats {
    pub fn bytes_saved(&self) -> u64 {
        self.output_size_bytes
            .map_or(0, |output| self.original_size_bytes.saturating_sub(output))
    }

    pub fn format_summary(&self) -> String {
        format!(
            "{} → {} | Saved: {}% | {} | {}",
            crate::file_manager::FileManager::format_size(self.original_size_bytes),
            self.output_size_bytes
                .map_or_else(|| "unknown size".to_string(), crate::file_manager::FileManager::format_size),
            self.reduction_percent,
            self.quality_label,
            self.verification_status
        )
    }
}

/// Rounded, clamped percentage reduction
pub fn reduction_percent(original: u64, output: u64) -> u8 {
    if original == 0 || output >= original {
        return 0;
    }
    let saved = (original - output) as f64;
    (saved / original as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Normalize a strategy outcome into `CompressionStats`
pub fn normalize(
    outcome: &CompressionOutcome,
    source: &SourceArtifact,
    tier: QualityTier,
    elapsed: Option<Duration>,
) -> CompressionStats {
    let original = source.len();

    let (output, identical) = match &outcome.artifact {
        OutcomeArtifact::Payload(bytes) => (bytes.len() as u64, bytes.as_slice() == source.bytes()),
        OutcomeArtifact::Reference(_) => {
            match outcome.reported.as_ref().and_then(|r| r.optimized_bytes()) {
                Some(size) => (size, false),
                // Unknown output size: report no reduction and no verification
                None => {
                    return CompressionStats {
                        original_size_bytes: original,
                        output_size_bytes: None,
                        reduction_percent: 0,
                        quality_label: quality::describe(tier).label.to_string(),
                        verification_status: VerificationStatus::Unknown,
                        elapsed_millis: elapsed.map(|d| d.as_millis() as u64),
                        strategy: outcome.strategy,
                    };
                }
            }
        }
    };

    let verification_status = if identical || output == original {
        VerificationStatus::OriginalFallback
    } else {
        outcome.verification
    };

    CompressionStats {
        original_size_bytes: original,
        output_size_bytes: Some(output),
        reduction_percent: reduction_percent(original, output),
        quality_label: quality::describe(tier).label.to_string(),
        verification_status,
        elapsed_millis: elapsed.map(|d| d.as_millis() as u64),
        strategy: outcome.strategy,
    }
}

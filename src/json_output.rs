//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (una riga per evento) per
//! l'integrazione con altri processi.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio ottimizzazione (documento, tier, strategia, dimensione attesa)
//! - `progress`: Stato corrente del progress simulator
//! - `complete`: Statistiche finali e path dell'output
//! - `error`: Errore tipizzato (`kind` stabile in snake_case)
//!
//! I log vanno su stderr, quindi stdout contiene solo questi messaggi.

use crate::error::OptimizeError;
use crate::progress::ProgressState;
use crate::quality::{self, QualityTier, SizeEstimate};
use crate::stats::CompressionStats;
use crate::strategy::StrategyKind;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio dell'ottimizzazione
    #[serde(rename = "start")]
    Start {
        input: PathBuf,
        size_bytes: u64,
        quality: QualityTier,
        quality_label: String,
        strategy: StrategyKind,
        expected_min_bytes: u64,
        expected_max_bytes: u64,
    },

    /// Progresso corrente
    #[serde(rename = "progress")]
    Progress {
        percent: u8,
        message: String,
        visible: bool,
    },

    /// Ottimizzazione completata
    #[serde(rename = "complete")]
    Complete {
        output: PathBuf,
        #[serde(flatten)]
        stats: CompressionStats,
    },

    /// Errore
    #[serde(rename = "error")]
    Error {
        kind: String,
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input: PathBuf, estimate: SizeEstimate, strategy: StrategyKind) -> Self {
        Self::Start {
            input,
            size_bytes: estimate.original_bytes,
            quality: estimate.tier,
            quality_label: quality::describe(estimate.tier).label.to_string(),
            strategy,
            expected_min_bytes: estimate.low_bytes,
            expected_max_bytes: estimate.high_bytes,
        }
    }

    pub fn progress(state: &ProgressState) -> Self {
        Self::Progress {
            percent: state.percent,
            message: state.message.clone(),
            visible: state.visible,
        }
    }

    pub fn complete(output: PathBuf, stats: CompressionStats) -> Self {
        Self::Complete { output, stats }
    }

    /// Errore tipizzato dell'ottimizzazione
    pub fn from_error(err: &OptimizeError) -> Self {
        let details = match err {
            OptimizeError::StrategyUnavailable { remediation, .. } => Some(remediation.clone()),
            OptimizeError::Timeout { strategy, .. } => Some(format!("strategy: {}", strategy)),
            _ => None,
        };
        Self::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
            details,
        }
    }

    /// Errore applicativo (config, I/O della CLI)
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error {
            kind: "application".to_string(),
            message,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::VerificationStatus;
    use serde_json::Value;

    fn to_value(message: &JsonMessage) -> Value {
        serde_json::to_value(message).unwrap()
    }

    #[test]
    fn test_start_message() {
        let value = to_value(&JsonMessage::start(
            PathBuf::from("in.pdf"),
            quality::describe(QualityTier::Aggressive).estimate(1000),
            StrategyKind::LibraryBased,
        ));
        assert_eq!(value["size_bytes"], 1000);
        assert_eq!(value["expected_min_bytes"], 150);
        assert_eq!(value["expected_max_bytes"], 300);
        assert_eq!(value["type"], "start");
        assert_eq!(value["quality"], "aggressive");
        assert_eq!(value["strategy"], "library_based");
        assert_eq!(value["quality_label"], "Aggressive Compression (85% reduction)");
    }

    #[test]
    fn test_complete_flattens_stats() {
        let stats = CompressionStats {
            original_size_bytes: 100,
            output_size_bytes: Some(30),
            reduction_percent: 70,
            quality_label: "Balanced Quality (70% reduction)".to_string(),
            verification_status: VerificationStatus::Unknown,
            elapsed_millis: Some(12),
            strategy: StrategyKind::LocalApproximate,
        };
        let value = to_value(&JsonMessage::complete(PathBuf::from("out.pdf"), stats));
        assert_eq!(value["type"], "complete");
        assert_eq!(value["reduction_percent"], 70);
        assert_eq!(value["verification_status"], "unknown");
        assert_eq!(value["output"], "out.pdf");
    }

    #[test]
    fn test_error_carries_kind() {
        let value = to_value(&JsonMessage::from_error(&OptimizeError::RemoteFailure(
            "corrupt file".to_string(),
        )));
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "remote_failure");
        assert_eq!(value["message"], "corrupt file");
        assert!(value["details"].is_null());
    }
}

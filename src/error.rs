//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori del core di ottimizzazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti i fallimenti possibili
//! - Fornisce messaggi descrittivi con abbastanza contesto (tipo + messaggio)
//!   per permettere al presentation layer di mostrarli
//! - Espone un tag stabile (`kind()`) per l'output JSON
//!
//! ## Categorie di errori:
//! - `NoSourceProvided`: Nessun documento valido selezionato
//! - `SourceTooLarge`: Documento oltre il limite configurato
//! - `AlreadyInProgress`: Ottimizzazione già in corso (niente coda implicita)
//! - `StrategyUnavailable`: Strategia non pronta (con testo di rimedio)
//! - `Timeout`: Nessuna risposta terminale entro la finestra fissata
//! - `SourceUnprocessable`: Documento malformato o non supportato
//! - `RemoteFailure`: Messaggio del server riportato verbatim
//! - `NothingToDownload`: Nessun risultato da scaricare
//! - `UnknownTier`: Livello qualità sconosciuto (recuperato con `balanced`)
//! - `Cancelled`: Operazione interrotta da `clear()`
//! - `Io`: Errore di I/O locale (buffer temporanei, file)
//!
//! ## Esempio:
//! ```ignore
//! if bytes.is_empty() {
//!     return Err(OptimizeError::NoSourceProvided("empty document".to_string()));
//! }
//! ```

use crate::strategy::StrategyKind;
use std::time::Duration;

/// Result alias used throughout the optimization core
pub type OptimizeResult<T> = std::result::Result<T, OptimizeError>;

/// Custom error types for document optimization
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("No source document provided: {0}")]
    NoSourceProvided(String),

    #[error("Source document too large: {size} bytes (limit: {limit} bytes)")]
    SourceTooLarge { size: u64, limit: u64 },

    #[error("An optimization is already in progress")]
    AlreadyInProgress,

    #[error("{strategy} is unavailable: {remediation}")]
    StrategyUnavailable {
        strategy: StrategyKind,
        remediation: String,
    },

    #[error("{strategy} timed out after {after:?}")]
    Timeout { strategy: StrategyKind, after: Duration },

    #[error("Document could not be processed: {0}")]
    SourceUnprocessable(String),

    #[error("{0}")]
    RemoteFailure(String),

    #[error("No optimized document available to download")]
    NothingToDownload,

    #[error("Unknown quality tier: {0}")]
    UnknownTier(String),

    #[error("Optimization cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),
}

impl OptimizeError {
    /// Stable snake_case tag, used by the JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoSourceProvided(_) => "no_source_provided",
            Self::SourceTooLarge { .. } => "source_too_large",
            Self::AlreadyInProgress => "already_in_progress",
            Self::StrategyUnavailable { .. } => "strategy_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::SourceUnprocessable(_) => "source_unprocessable",
            Self::RemoteFailure(_) => "remote_failure",
            Self::NothingToDownload => "nothing_to_download",
            Self::UnknownTier(_) => "unknown_tier",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for OptimizeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_failure_is_verbatim() {
        let err = OptimizeError::RemoteFailure("corrupt file".to_string());
        assert_eq!(err.to_string(), "corrupt file");
        assert_eq!(err.kind(), "remote_failure");
    }

    #[test]
    fn test_io_conversion_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: OptimizeError = io.into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("missing.pdf"));
    }
}

//! # PDF Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tassonomia degli errori di ottimizzazione
//! - `quality`: Tabella dei profili di qualità
//! - `artifact`: Documento sorgente e output prodotto
//! - `strategy`: Meccanismi di compressione intercambiabili
//! - `stats`: Normalizzazione dei risultati
//! - `progress`: Progress simulato e limitato
//! - `optimizer`: Orchestratore (macchina a stati) e reporter
//! - `file_manager`: Operazioni sui file per la CLI
//! - `json_output`: Eventi JSON per uso programmatico
//!
//! ## Utilizzo:
//! ```ignore
//! use pdf_optimizer::{Config, QualityTier, optimizer};
//!
//! let orchestrator = optimizer::build_orchestrator(&Config::default()).await?;
//! orchestrator.select_artifact(bytes, "report.pdf", "application/pdf")?;
//! let stats = orchestrator.optimize(QualityTier::Balanced).await?;
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod quality;
pub mod stats;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifact::{OptimizedArtifact, SourceArtifact};
pub use config::{Config, StrategyChoice};
pub use error::{OptimizeError, OptimizeResult};
pub use optimizer::{Orchestrator, OrchestratorState};
pub use progress::{ProgressSimulator, ProgressState};
pub use quality::{QualityProfile, QualityTier, SizeEstimate};
pub use stats::{CompressionStats, VerificationStatus};
pub use strategy::{CompressionStrategy, StrategyKind};

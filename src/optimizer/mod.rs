//! # Optimizer Module
//!
//! Modulo che separa le responsabilità in sottomoduli:
//! - `orchestrator`: Macchina a stati principale
//! - `reporter`: Presentazione del progress (barra o JSON)
//!
//! Qui vive anche la costruzione della strategia a partire dalla `Config`.

pub mod orchestrator;
pub mod reporter;

pub use orchestrator::{Orchestrator, OrchestratorSettings, OrchestratorState, DEFAULT_MAX_SOURCE_BYTES};
pub use reporter::{ProgressReporter, ReportMode};

use crate::config::{Config, StrategyChoice};
use crate::error::{OptimizeError, OptimizeResult};
use crate::progress::ProgressSimulator;
use crate::strategy::{
    self, CompressionStrategy, LibraryBased, LocalApproximate, RemoteBackend, StrategyKind, WorkerChannel,
};
use std::sync::Arc;
use tracing::warn;

/// Instantiate the configured strategy; `auto` picks the first ready one
pub async fn build_strategy(config: &Config) -> OptimizeResult<Arc<dyn CompressionStrategy>> {
    let remote = || RemoteBackend::new(&config.remote_url, config.request_timeout());
    let worker = || -> OptimizeResult<WorkerChannel> {
        let program = config
            .worker_program
            .as_deref()
            .ok_or_else(|| OptimizeError::StrategyUnavailable {
                strategy: StrategyKind::WorkerChannel,
                remediation: "No worker program configured. Pass --worker <program>.".to_string(),
            })?;
        WorkerChannel::spawn(program, &config.worker_args, config.worker_timeout())
    };

    match config.strategy {
        StrategyChoice::Remote => Ok(Arc::new(remote()?)),
        StrategyChoice::Worker => Ok(Arc::new(worker()?)),
        StrategyChoice::Local => Ok(Arc::new(LocalApproximate::new(config.local_step_delay()))),
        StrategyChoice::Library => Ok(Arc::new(LibraryBased::lopdf())),
        StrategyChoice::Auto => {
            let mut candidates: Vec<Arc<dyn CompressionStrategy>> = vec![Arc::new(remote()?)];
            if config.worker_program.is_some() {
                match worker() {
                    Ok(worker) => candidates.push(Arc::new(worker)),
                    Err(e) => warn!("⚠️ Skipping worker: {}", e),
                }
            }
            candidates.push(Arc::new(LibraryBased::lopdf()));
            candidates.push(Arc::new(LocalApproximate::new(config.local_step_delay())));
            strategy::discover(candidates).await
        }
    }
}

/// Orchestrator wired from configuration
pub async fn build_orchestrator(config: &Config) -> OptimizeResult<Orchestrator> {
    let strategy = build_strategy(config).await?;
    Ok(Orchestrator::new(
        strategy,
        ProgressSimulator::new(config.progress_settings()),
        config.orchestrator_settings(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_strategies() {
        for (choice, kind) in [
            (StrategyChoice::Local, StrategyKind::LocalApproximate),
            (StrategyChoice::Library, StrategyKind::LibraryBased),
            (StrategyChoice::Remote, StrategyKind::RemoteBackend),
        ] {
            let config = Config {
                strategy: choice,
                ..Default::default()
            };
            assert_eq!(build_strategy(&config).await.unwrap().kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_worker_without_program() {
        let config = Config {
            strategy: StrategyChoice::Worker,
            ..Default::default()
        };
        let err = build_strategy(&config).await.err().unwrap();
        assert_eq!(err.kind(), "strategy_unavailable");
    }

    #[tokio::test]
    async fn test_auto_skips_offline_backend() {
        let config = Config {
            strategy: StrategyChoice::Auto,
            remote_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            worker_program: Some("definitely-not-a-real-worker-binary".to_string()),
            ..Default::default()
        };
        let orchestrator = build_orchestrator(&config).await.unwrap();
        assert_eq!(orchestrator.strategy_kind(), StrategyKind::LibraryBased);
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }
}

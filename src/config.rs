//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri dell'optimizer
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Converte la configurazione nei settings di orchestratore e progress
//!
//! ## Parametri di configurazione:
//! - `strategy`: auto | remote | worker | local | library (default: auto)
//! - `default_quality`: Tier di default (default: "balanced")
//! - `max_source_bytes`: Dimensione massima del documento (default: 50 MB)
//! - `accepted_media_types`: Media type accettati (default: application/pdf)
//! - `remote_url`: Base URL del backend HTTP (default: http://localhost:5000)
//! - `request_timeout_secs`: Timeout richieste HTTP (default: 120)
//! - `worker_program` / `worker_args`: Comando del worker esterno
//! - `worker_timeout_secs`: Timeout rigido del worker (default: 300)
//! - `local_step_delay_ms`: Ritmo dell'approssimazione locale (default: 1000)
//! - `tick_min_ms` / `tick_max_ms`: Cadenza del progress (default: 300-500)
//! - `hide_delay_ms`: Ritardo prima di nascondere la barra (default: 1000)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     strategy: StrategyChoice::Library,
//!     default_quality: "aggressive".to_string(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::optimizer::{OrchestratorSettings, DEFAULT_MAX_SOURCE_BYTES};
use crate::progress::{self, ProgressSettings};
use crate::quality::{self, QualityTier};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which compression mechanism to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// First ready of remote, worker (when configured), library, local
    Auto,
    Remote,
    Worker,
    Local,
    Library,
}

/// Configuration for the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strategy: StrategyChoice,
    /// Tier used when none is given on the command line
    pub default_quality: String,
    pub max_source_bytes: u64,
    pub accepted_media_types: Vec<String>,
    /// Base URL of the HTTP compression backend
    pub remote_url: String,
    pub request_timeout_secs: u64,
    /// Worker executable (None = worker strategy unavailable)
    pub worker_program: Option<String>,
    pub worker_args: Vec<String>,
    pub worker_timeout_secs: u64,
    /// Base pacing delay of the local approximation
    pub local_step_delay_ms: u64,
    pub tick_min_ms: u64,
    pub tick_max_ms: u64,
    pub hide_delay_ms: u64,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::Auto,
            default_quality: "balanced".to_string(),
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            accepted_media_types: vec!["application/pdf".to_string()],
            remote_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 120,
            worker_program: None,
            worker_args: Vec::new(),
            worker_timeout_secs: 300,
            local_step_delay_ms: 1000,
            tick_min_ms: 300,
            tick_max_ms: 500,
            hide_delay_ms: 1000,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_source_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum source size must be greater than 0"));
        }

        if self.tick_min_ms == 0 || self.tick_min_ms > self.tick_max_ms {
            return Err(anyhow::anyhow!(
                "Progress tick range is invalid: {}-{} ms",
                self.tick_min_ms,
                self.tick_max_ms
            ));
        }

        if self.request_timeout_secs == 0 || self.worker_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than 0"));
        }

        if !self.remote_url.starts_with("http://") && !self.remote_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Remote URL must start with http:// or https://: {}", self.remote_url));
        }

        if self.strategy == StrategyChoice::Worker && self.worker_program.is_none() {
            return Err(anyhow::anyhow!("Worker strategy requires a worker program"));
        }

        Ok(())
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pdf-optimizer").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Configured default tier; unknown names fall back to balanced
    pub fn default_tier(&self) -> QualityTier {
        quality::lookup_or_balanced(&self.default_quality).tier
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn local_step_delay(&self) -> Duration {
        Duration::from_millis(self.local_step_delay_ms)
    }

    pub fn progress_settings(&self) -> ProgressSettings {
        ProgressSettings {
            tick_min: Duration::from_millis(self.tick_min_ms),
            tick_max: Duration::from_millis(self.tick_max_ms),
            hide_delay: Duration::from_millis(self.hide_delay_ms),
            ..ProgressSettings::default()
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_source_bytes: self.max_source_bytes,
            accepted_media_types: self.accepted_media_types.clone(),
            progress_messages: progress::default_messages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.tick_min_ms = 600;
        assert!(config.validate().is_err());

        config.tick_min_ms = 300;
        config.remote_url = "localhost:5000".to_string();
        assert!(config.validate().is_err());

        config.remote_url = "https://compress.example.com".to_string();
        config.strategy = StrategyChoice::Worker;
        assert!(config.validate().is_err());

        config.worker_program = Some("gs-worker".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.strategy, StrategyChoice::Auto);
        assert_eq!(config.default_tier(), QualityTier::Balanced);
        assert_eq!(config.max_source_bytes, 50 * 1024 * 1024);
        assert_eq!(config.worker_timeout(), Duration::from_secs(300));
        assert_eq!(config.progress_settings().ceiling, 95);
        assert!(!config.json_output);
    }

    #[test]
    fn test_unknown_default_quality_falls_back() {
        let config = Config {
            default_quality: "ultra".to_string(),
            ..Default::default()
        };
        assert_eq!(config.default_tier(), QualityTier::Balanced);

        let config = Config {
            default_quality: "screen".to_string(),
            ..Default::default()
        };
        assert_eq!(config.default_tier(), QualityTier::Aggressive);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"strategy": "library", "hide_delay_ms": 0}"#).unwrap();
        assert_eq!(config.strategy, StrategyChoice::Library);
        assert_eq!(config.hide_delay_ms, 0);
        assert_eq!(config.remote_url, "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            strategy: StrategyChoice::Worker,
            default_quality: "maximum".to_string(),
            worker_program: Some("gs-worker".to_string()),
            worker_args: vec!["--threads".to_string(), "2".to_string()],
            json_output: true,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded, Config::default());
    }
}

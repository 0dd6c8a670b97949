//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file della CLI.
//!
//! ## Responsabilità:
//! - Lettura del documento sorgente con controllo dimensione preventivo
//! - Determinazione del media type dall'estensione
//! - Calcolo del path di output (esplicito o accanto all'input)
//! - Scrittura sicura dell'output (file temporaneo + rename)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Esempio:
//! ```ignore
//! let source = FileManager::read_source(&path, config.max_source_bytes).await?;
//! let output = FileManager::output_path(&path, None, &artifact.file_name);
//! FileManager::write_output(&output, &artifact.bytes).await?;
//! ```

use crate::error::OptimizeError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Document read from disk, ready for `select_artifact`
#[derive(Debug)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub name: String,
    pub media_type: &'static str,
}

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Media type from the file extension
    pub fn guess_media_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => "application/pdf",
            "ps" | "eps" => "application/postscript",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "application/octet-stream",
        }
    }

    /// Read the source document, refusing files above `max_bytes` before loading them
    pub async fn read_source(path: &Path, max_bytes: u64) -> Result<SourceFile> {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Input file does not exist: {}", path.display()))?;

        if !metadata.is_file() {
            anyhow::bail!("Input path is not a file: {}", path.display());
        }
        if metadata.len() > max_bytes {
            return Err(OptimizeError::SourceTooLarge {
                size: metadata.len(),
                limit: max_bytes,
            }
            .into());
        }

        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        debug!("Read {} ({})", path.display(), Self::format_size(bytes.len() as u64));

        Ok(SourceFile {
            bytes,
            name,
            media_type: Self::guess_media_type(path),
        })
    }

    /// Explicit output path, or the suggested name next to the input
    pub fn output_path(input: &Path, explicit: Option<&Path>, suggested_name: &str) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(suggested_name),
        }
    }

    /// Write through a temporary sibling and rename into place
    pub async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to move output to {}", path.display()));
        }
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

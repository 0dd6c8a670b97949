//! # Artifact Module
//!
//! Handle immutabili per il documento sorgente e per il documento prodotto.
//!
//! ## Responsabilità:
//! - `SourceArtifact`: byte del documento, media type dichiarato, nome visualizzato
//! - `OptimizedArtifact`: byte prodotti e nome file suggerito per il download
//!
//! I byte sono condivisi tramite `Arc<[u8]>`: il sorgente viene sostituito in
//! blocco a ogni nuova selezione, mai modificato.

use crate::quality::QualityTier;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Immutable handle to the input document
#[derive(Clone, PartialEq)]
pub struct SourceArtifact {
    bytes: Arc<[u8]>,
    name: String,
    media_type: String,
}

impl SourceArtifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>, name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            name: name.into(),
            media_type: media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the shared buffer
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// File name offered for the optimized download: `{stem}-optimized-{tier}.{ext}`
    pub fn suggested_output_name(&self, tier: QualityTier) -> String {
        let path = Path::new(&self.name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string());
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "pdf".to_string());
        format!("{}-optimized-{}.{}", stem, tier, ext)
    }
}

impl fmt::Debug for SourceArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceArtifact")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The last produced document, held until downloaded or released
#[derive(Clone, PartialEq)]
pub struct OptimizedArtifact {
    pub bytes: Arc<[u8]>,
    pub file_name: String,
}

impl fmt::Debug for OptimizedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizedArtifact")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

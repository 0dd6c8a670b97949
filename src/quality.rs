//! # Quality Profile Table
//!
//! Tabella statica che mappa ogni livello di qualità alle sue caratteristiche.
//!
//! ## Responsabilità:
//! - Definisce `QualityTier` (scala ordinale a tre punti: maximum → aggressive)
//! - Associa a ogni livello etichetta, riduzione nominale e parametri per strategia
//! - Accetta i nomi alternativi usati dalle varie strategie (`high`/`medium`/`low`)
//!
//! ## Livelli:
//! - **maximum**: favorisce la fedeltà (riduzione nominale 50%)
//! - **balanced**: compromesso (riduzione nominale 70%)
//! - **aggressive**: favorisce la dimensione (riduzione nominale 85%)
//!
//! La riduzione nominale serve solo per stima e visualizzazione,
//! non è mai una garanzia di correttezza. `QualityProfile::estimate` ne ricava
//! l'intervallo di dimensione attesa mostrato prima di comprimere.

use crate::error::{OptimizeError, OptimizeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Ordinal compression-aggressiveness selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Maximum,
    Balanced,
    Aggressive,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [Self::Maximum, Self::Balanced, Self::Aggressive];

    /// Wire name, as sent in the `quality` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maximum => "maximum",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = OptimizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maximum" | "max" | "high" | "prepress" => Ok(Self::Maximum),
            "balanced" | "medium" | "ebook" => Ok(Self::Balanced),
            "aggressive" | "low" | "screen" => Ok(Self::Aggressive),
            other => Err(OptimizeError::UnknownTier(other.to_string())),
        }
    }
}

/// Document object categories a structure library may drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCategory {
    Annotations,
    Forms,
    Metadata,
}

/// Rendering preset handed to an out-of-process worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerPreset {
    pub pdf_setting: &'static str,
    pub compatibility_level: &'static str,
    /// Image downsampling resolution (None = keep original resolution)
    pub downsample_dpi: Option<u32>,
}

/// Static description of a quality tier
#[derive(Debug, Clone, PartialEq)]
pub struct QualityProfile {
    pub tier: QualityTier,
    pub label: &'static str,
    pub nominal_reduction_percent: u8,
    /// Reduction range typically observed; the upper bound is the nominal one
    pub expected_reduction_percent: (u8, u8),
    pub dropped_categories: &'static [ObjectCategory],
    pub worker_preset: WorkerPreset,
}

impl QualityProfile {
    /// Percentage of the original size the tier nominally keeps
    pub fn retained_percent(&self) -> u8 {
        100 - self.nominal_reduction_percent
    }

    /// Expected output size range for a document of `original_bytes`
    pub fn estimate(&self, original_bytes: u64) -> SizeEstimate {
        let (min_reduction, max_reduction) = self.expected_reduction_percent;
        let keep = |reduction: u8| original_bytes * u64::from(100 - reduction) / 100;
        SizeEstimate {
            tier: self.tier,
            original_bytes,
            low_bytes: keep(max_reduction),
            high_bytes: keep(min_reduction),
            min_reduction_percent: min_reduction,
            max_reduction_percent: max_reduction,
        }
    }
}

/// Expected output size before compressing, derived from the profile table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub tier: QualityTier,
    pub original_bytes: u64,
    pub low_bytes: u64,
    pub high_bytes: u64,
    pub min_reduction_percent: u8,
    pub max_reduction_percent: u8,
}

static PROFILES: [QualityProfile; 3] = [
    QualityProfile {
        tier: QualityTier::Maximum,
        label: "Maximum Quality (50% reduction)",
        nominal_reduction_percent: 50,
        expected_reduction_percent: (35, 50),
        dropped_categories: &[ObjectCategory::Annotations],
        worker_preset: WorkerPreset {
            pdf_setting: "/prepress",
            compatibility_level: "1.7",
            downsample_dpi: None,
        },
    },
    QualityProfile {
        tier: QualityTier::Balanced,
        label: "Balanced Quality (70% reduction)",
        nominal_reduction_percent: 70,
        expected_reduction_percent: (50, 70),
        dropped_categories: &[ObjectCategory::Annotations, ObjectCategory::Forms],
        worker_preset: WorkerPreset {
            pdf_setting: "/ebook",
            compatibility_level: "1.4",
            downsample_dpi: Some(150),
        },
    },
    QualityProfile {
        tier: QualityTier::Aggressive,
        label: "Aggressive Compression (85% reduction)",
        nominal_reduction_percent: 85,
        expected_reduction_percent: (70, 85),
        dropped_categories: &[
            ObjectCategory::Annotations,
            ObjectCategory::Forms,
            ObjectCategory::Metadata,
        ],
        worker_preset: WorkerPreset {
            pdf_setting: "/screen",
            compatibility_level: "1.4",
            downsample_dpi: Some(72),
        },
    },
];

/// Describe a tier. Pure lookup, no side effects.
pub fn describe(tier: QualityTier) -> &'static QualityProfile {
    match tier {
        QualityTier::Maximum => &PROFILES[0],
        QualityTier::Balanced => &PROFILES[1],
        QualityTier::Aggressive => &PROFILES[2],
    }
}

/// Look up a profile by tier name (aliases accepted)
pub fn lookup(name: &str) -> OptimizeResult<&'static QualityProfile> {
    name.parse::<QualityTier>().map(describe)
}

/// Look up a profile by name, substituting `balanced` for unknown names
pub fn lookup_or_balanced(name: &str) -> &'static QualityProfile {
    match lookup(name) {
        Ok(profile) => profile,
        Err(e) => {
            warn!("{}, falling back to balanced profile", e);
            describe(QualityTier::Balanced)
        }
    }
}

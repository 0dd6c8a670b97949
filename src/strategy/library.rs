//! # Library-Based Strategy
//!
//! Delega la trasformazione a una libreria che comprende la struttura del
//! documento. La libreria rimuove categorie di oggetti secondo il tier
//! (annotazioni, form, metadati) e l'output viene ricaricato per verifica.
//!
//! Il lavoro è CPU-bound: gira su `spawn_blocking` per non bloccare il runtime.

use super::{Checkpoint, CompressionOutcome, CompressionStrategy, OnCheckpoint, OutcomeArtifact, StrategyKind};
use crate::artifact::SourceArtifact;
use crate::error::{OptimizeError, OptimizeResult};
use crate::quality::{self, ObjectCategory, QualityTier};
use crate::stats::VerificationStatus;
use async_trait::async_trait;
use lopdf::{Document, ObjectId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unsupported document: {0}")]
    Unsupported(String),
}

impl From<LibraryError> for OptimizeError {
    fn from(err: LibraryError) -> Self {
        OptimizeError::SourceUnprocessable(err.to_string())
    }
}

/// Structure-aware document rewriting
pub trait DocumentLibrary: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Rewrite `source` without the given object categories
    fn rewrite(&self, source: &[u8], categories: &[ObjectCategory]) -> Result<Vec<u8>, LibraryError>;

    /// Whether `bytes` parse as a readable document
    fn verify(&self, bytes: &[u8]) -> bool;
}

/// `DocumentLibrary` backed by lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfLibrary;

impl LopdfLibrary {
    fn catalog_id(doc: &Document) -> Result<ObjectId, LibraryError> {
        doc.trailer
            .get(b"Root")
            .and_then(|root| root.as_reference())
            .map_err(|e| LibraryError::Malformed(format!("missing catalog: {}", e)))
    }

    fn strip_annotations(doc: &mut Document) -> usize {
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let mut removed = 0;
        for page_id in pages {
            if let Ok(page) = doc.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
                if page.remove(b"Annots").is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    fn strip_catalog_entry(doc: &mut Document, key: &[u8]) -> Result<bool, LibraryError> {
        let catalog_id = Self::catalog_id(doc)?;
        let catalog = doc
            .get_object_mut(catalog_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| LibraryError::Malformed(format!("catalog is not a dictionary: {}", e)))?;
        Ok(catalog.remove(key).is_some())
    }
}

impl DocumentLibrary for LopdfLibrary {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn rewrite(&self, source: &[u8], categories: &[ObjectCategory]) -> Result<Vec<u8>, LibraryError> {
        let mut doc = Document::load_mem(source).map_err(|e| LibraryError::Malformed(e.to_string()))?;

        if doc.trailer.has(b"Encrypt") {
            return Err(LibraryError::Unsupported("encrypted documents are not supported".to_string()));
        }
        if doc.get_pages().is_empty() {
            return Err(LibraryError::Malformed("document has no pages".to_string()));
        }

        for category in categories {
            match category {
                ObjectCategory::Annotations => {
                    let pages = Self::strip_annotations(&mut doc);
                    debug!("Removed annotations from {} pages", pages);
                }
                ObjectCategory::Forms => {
                    if Self::strip_catalog_entry(&mut doc, b"AcroForm")? {
                        debug!("Removed interactive form");
                    }
                }
                ObjectCategory::Metadata => {
                    Self::strip_catalog_entry(&mut doc, b"Metadata")?;
                    doc.trailer.remove(b"Info");
                    debug!("Removed document metadata");
                }
            }
        }

        let pruned = doc.prune_objects();
        debug!("Pruned {} unreachable objects", pruned.len());
        doc.compress();

        let mut out = Vec::with_capacity(source.len());
        doc.save_to(&mut out)
            .map_err(|e| LibraryError::Malformed(format!("failed to write document: {}", e)))?;
        Ok(out)
    }

    fn verify(&self, bytes: &[u8]) -> bool {
        Document::load_mem(bytes)
            .map(|doc| !doc.get_pages().is_empty())
            .unwrap_or(false)
    }
}

/// Strategy wrapping a `DocumentLibrary`
pub struct LibraryBased {
    library: Arc<dyn DocumentLibrary>,
}

impl LibraryBased {
    pub fn new(library: Arc<dyn DocumentLibrary>) -> Self {
        Self { library }
    }

    pub fn lopdf() -> Self {
        Self::new(Arc::new(LopdfLibrary))
    }
}

fn crashed(e: tokio::task::JoinError) -> OptimizeError {
    OptimizeError::SourceUnprocessable(format!("Document library crashed: {}", e))
}

#[async_trait]
impl CompressionStrategy for LibraryBased {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LibraryBased
    }

    async fn attempt(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<CompressionOutcome> {
        let categories = quality::describe(tier).dropped_categories;
        on_checkpoint(Checkpoint::new(format!("📚 Rewriting document with {}...", self.library.name())));

        let library = Arc::clone(&self.library);
        let bytes = source.shared_bytes();
        let rewritten = tokio::task::spawn_blocking(move || library.rewrite(&bytes, categories))
            .await
            .map_err(crashed)??;

        on_checkpoint(Checkpoint::new("🔍 Verifying output..."));

        let library = Arc::clone(&self.library);
        let (rewritten, readable) = tokio::task::spawn_blocking(move || {
            let readable = library.verify(&rewritten);
            (rewritten, readable)
        })
        .await
        .map_err(crashed)?;

        if !readable {
            warn!("Rewritten {} did not re-parse", source.name());
        }

        Ok(CompressionOutcome {
            artifact: OutcomeArtifact::Payload(rewritten),
            reported: None,
            verification: if readable {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Unknown
            },
            strategy: StrategyKind::LibraryBased,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// One-page document with an annotation, a form and an info dictionary
    pub(crate) fn sample_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal("Quarterly report")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let annot_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => vec![10.into(), 10.into(), 50.into(), 50.into()],
            "Contents" => Object::string_literal("Reviewer note"),
        });
        let field_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("signature"),
        });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Annots" => vec![annot_id.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => dictionary! { "Fields" => vec![field_id.into()] },
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly report"),
            "Producer" => Object::string_literal("test suite"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn reload(bytes: &[u8]) -> Document {
        Document::load_mem(bytes).unwrap()
    }

    fn page_has_annots(doc: &Document) -> bool {
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_object(page_id).unwrap().as_dict().unwrap().has(b"Annots")
    }

    fn catalog_has(doc: &Document, key: &[u8]) -> bool {
        let id = LopdfLibrary::catalog_id(doc).unwrap();
        doc.get_object(id).unwrap().as_dict().unwrap().has(key)
    }

    #[test]
    fn test_maximum_drops_only_annotations() {
        let drop = quality::describe(QualityTier::Maximum).dropped_categories;
        let out = LopdfLibrary.rewrite(&sample_pdf(), drop).unwrap();
        let doc = reload(&out);

        assert!(!page_has_annots(&doc));
        assert!(catalog_has(&doc, b"AcroForm"));
        assert!(doc.trailer.has(b"Info"));
    }

    #[test]
    fn test_aggressive_drops_everything() {
        let drop = quality::describe(QualityTier::Aggressive).dropped_categories;
        let out = LopdfLibrary.rewrite(&sample_pdf(), drop).unwrap();
        let doc = reload(&out);

        assert!(!page_has_annots(&doc));
        assert!(!catalog_has(&doc, b"AcroForm"));
        assert!(!doc.trailer.has(b"Info"));
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_malformed_input() {
        let err = LopdfLibrary
            .rewrite(b"definitely not a document", &[ObjectCategory::Annotations])
            .unwrap_err();
        assert!(matches!(err, LibraryError::Malformed(_)));
        assert!(!LopdfLibrary.verify(b"definitely not a document"));
    }

    #[tokio::test]
    async fn test_attempt_verifies_output() {
        let strategy = LibraryBased::lopdf();
        let source = SourceArtifact::new(sample_pdf(), "report.pdf", "application/pdf");

        let outcome = strategy
            .attempt(&source, QualityTier::Balanced, &|_: Checkpoint| {})
            .await
            .unwrap();

        assert_eq!(outcome.verification, VerificationStatus::Verified);
        assert_eq!(outcome.strategy, StrategyKind::LibraryBased);
        match outcome.artifact {
            OutcomeArtifact::Payload(bytes) => assert!(LopdfLibrary.verify(&bytes)),
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attempt_on_garbage_is_unprocessable() {
        let strategy = LibraryBased::lopdf();
        let source = SourceArtifact::new(b"%PDF-1.4 truncated".to_vec(), "bad.pdf", "application/pdf");

        let err = strategy
            .attempt(&source, QualityTier::Balanced, &|_: Checkpoint| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "source_unprocessable");
    }
}

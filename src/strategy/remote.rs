//! # Remote Backend Strategy
//!
//! Invia il documento a un backend HTTP con un solo round trip.
//!
//! ## Contratto wire:
//! - `POST {base}/optimize`, multipart con campi `file` (binario) e `quality`
//! - Successo: `{"success": true, "stats": {...}, "download_id": "..."}`
//! - Fallimento: status non-2xx oppure `success: false`, con stringa `error`
//! - `GET {base}/download/{id}` (o `/download`) restituisce il documento
//! - `GET {base}/health` come readiness probe
//!
//! Il messaggio `error` del server viene riportato verbatim in `RemoteFailure`.

use super::{
    Checkpoint, CompressionOutcome, CompressionStrategy, OnCheckpoint, OutcomeArtifact, ReportedStats,
    StrategyKind,
};
use crate::artifact::SourceArtifact;
use crate::error::{OptimizeError, OptimizeResult};
use crate::quality::QualityTier;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON body of the optimize endpoint
#[derive(Debug, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub stats: Option<ReportedStats>,
    #[serde(default)]
    pub download_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One-shot HTTP compression backend
pub struct RemoteBackend {
    client: Client,
    base_url: String,
}

impl RemoteBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> OptimizeResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| OptimizeError::StrategyUnavailable {
                strategy: StrategyKind::RemoteBackend,
                remediation: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(response: reqwest::Response) -> OptimizeResult<String> {
        response
            .text()
            .await
            .map_err(|e| OptimizeError::RemoteFailure(format!("Failed to read response: {}", e)))
    }

    /// Interpret status + body of the optimize endpoint
    pub fn interpret_response(status: StatusCode, body: &str) -> OptimizeResult<RemoteResponse> {
        if !status.is_success() {
            let message = serde_json::from_str::<RemoteResponse>(body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("Server returned error {}", status));
            return Err(OptimizeError::RemoteFailure(message));
        }

        let response: RemoteResponse = serde_json::from_str(body)
            .map_err(|e| OptimizeError::RemoteFailure(format!("Failed to parse response: {}", e)))?;

        if !response.success {
            return Err(OptimizeError::RemoteFailure(
                response
                    .error
                    .unwrap_or_else(|| "Unknown compression error".to_string()),
            ));
        }

        Ok(response)
    }

    /// Retrieval path for a completed job
    pub fn download_reference(download_id: Option<&str>) -> String {
        match download_id {
            Some(id) => format!("/download/{}", id),
            None => "/download".to_string(),
        }
    }
}

#[async_trait]
impl CompressionStrategy for RemoteBackend {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RemoteBackend
    }

    async fn is_ready(&self) -> bool {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed for {}: {}", self.base_url, e);
                false
            }
        }
    }

    fn remediation(&self) -> String {
        format!(
            "Backend offline at {}. Start the compression server and retry.",
            self.base_url
        )
    }

    async fn attempt(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<CompressionOutcome> {
        let part = Part::bytes(source.bytes().to_vec())
            .file_name(source.name().to_string())
            .mime_str(source.media_type())
            .map_err(|e| OptimizeError::NoSourceProvided(format!("Invalid media type: {}", e)))?;

        let form = Form::new().part("file", part).text("quality", tier.as_str());

        on_checkpoint(Checkpoint::new("📤 Uploading document..."));

        let response = self
            .client
            .post(self.url("/optimize"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| OptimizeError::RemoteFailure(format!("Failed to reach backend: {}", e)))?;

        let status = response.status();
        let body = Self::read_body(response).await?;
        let parsed = Self::interpret_response(status, &body)?;

        let verification = parsed
            .stats
            .as_ref()
            .map(ReportedStats::verification)
            .unwrap_or(crate::stats::VerificationStatus::Unknown);

        Ok(CompressionOutcome {
            artifact: OutcomeArtifact::Reference(Self::download_reference(parsed.download_id.as_deref())),
            reported: parsed.stats,
            verification,
            strategy: StrategyKind::RemoteBackend,
        })
    }

    async fn retrieve(&self, reference: &str) -> OptimizeResult<Vec<u8>> {
        let response = self
            .client
            .get(self.url(reference))
            .send()
            .await
            .map_err(|e| OptimizeError::RemoteFailure(format!("Failed to download document: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::read_body(response).await?;
            warn!("Download of {} failed with status {}", reference, status);
            return Err(Self::interpret_response(status, &body)
                .err()
                .unwrap_or_else(|| OptimizeError::RemoteFailure("Download failed".to_string())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OptimizeError::RemoteFailure(format!("Failed to read document: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_is_verbatim() {
        let err = RemoteBackend::interpret_response(StatusCode::BAD_REQUEST, r#"{"error":"corrupt file"}"#)
            .unwrap_err();
        assert_eq!(err, OptimizeError::RemoteFailure("corrupt file".to_string()));
    }

    #[test]
    fn test_non_json_error_body() {
        let err = RemoteBackend::interpret_response(StatusCode::BAD_GATEWAY, "<html>oops</html>").unwrap_err();
        assert_eq!(
            err,
            OptimizeError::RemoteFailure("Server returned error 502 Bad Gateway".to_string())
        );
    }

    #[test]
    fn test_success_false() {
        let err = RemoteBackend::interpret_response(
            StatusCode::OK,
            r#"{"success": false, "error": "Compression failed"}"#,
        )
        .unwrap_err();
        assert_eq!(err, OptimizeError::RemoteFailure("Compression failed".to_string()));
    }

    #[test]
    fn test_success_with_stats() {
        let body = r#"{
            "success": true,
            "message": "PDF optimized successfully",
            "stats": {
                "original_size_mb": 10.0,
                "optimized_size_mb": 3.0,
                "reduction_percentage": 70.0,
                "processing_time": 4.2,
                "pages_processed": 12,
                "quality_level": "balanced",
                "verification_status": "✅ VERIFIED READABLE"
            },
            "download_ready": true
        }"#;
        let response = RemoteBackend::interpret_response(StatusCode::OK, body).unwrap();
        let stats = response.stats.unwrap();
        assert_eq!(stats.pages_processed, Some(12));
        assert_eq!(stats.optimized_bytes(), Some(3 * 1024 * 1024));
        assert!(response.download_id.is_none());
    }

    #[test]
    fn test_download_reference() {
        assert_eq!(RemoteBackend::download_reference(Some("abc123")), "/download/abc123");
        assert_eq!(RemoteBackend::download_reference(None), "/download");
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = RemoteBackend::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:5000");
        assert_eq!(backend.url("/health"), "http://localhost:5000/health");
    }

    fn healthy_backend(request: &str) -> (u16, &'static str, Vec<u8>) {
        match request {
            "GET /health" => (200, "application/json", br#"{"status":"healthy"}"#.to_vec()),
            "POST /optimize" => (
                200,
                "application/json",
                br#"{"success":true,"stats":{"optimized_size_bytes":9},"download_id":"job-7"}"#.to_vec(),
            ),
            "GET /download/job-7" => (200, "application/pdf", b"%PDF-tiny".to_vec()),
            _ => (404, "application/json", br#"{"error":"not found"}"#.to_vec()),
        }
    }

    #[tokio::test]
    async fn test_upload_and_retrieve_round_trip() {
        let base = crate::test_support::serve(healthy_backend).await;
        let backend = RemoteBackend::new(&base, Duration::from_secs(5)).unwrap();
        assert!(backend.is_ready().await);

        let source = SourceArtifact::new(vec![b'%'; 4096], "scan.pdf", "application/pdf");
        let outcome = backend
            .attempt(&source, QualityTier::Aggressive, &|_: Checkpoint| {})
            .await
            .unwrap();
        assert_eq!(outcome.artifact, OutcomeArtifact::Reference("/download/job-7".to_string()));

        let bytes = backend.retrieve("/download/job-7").await.unwrap();
        assert_eq!(bytes, b"%PDF-tiny".to_vec());

        let err = backend.retrieve("/download/missing").await.unwrap_err();
        assert_eq!(err, OptimizeError::RemoteFailure("not found".to_string()));
    }

    #[tokio::test]
    async fn test_truncated_body_is_a_read_failure() {
        let base = crate::test_support::serve_truncated(healthy_backend).await;
        let backend = RemoteBackend::new(&base, Duration::from_secs(5)).unwrap();

        let source = SourceArtifact::new(vec![b'%'; 512], "scan.pdf", "application/pdf");
        let err = backend
            .attempt(&source, QualityTier::Balanced, &|_: Checkpoint| {})
            .await
            .unwrap_err();

        match err {
            OptimizeError::RemoteFailure(message) => {
                assert!(message.starts_with("Failed to read response"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_not_ready() {
        let backend = RemoteBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(!backend.is_ready().await);
        assert!(backend.remediation().contains("127.0.0.1:9"));
    }
}

//! Client for the external certificate document renderer.
//!
//! Rendering is the slowest and least reliable step of issuance, so the HTTP
//! client runs under a bounded timeout and degrades to a deterministic,
//! locally built document rather than leaving the student with nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;
use util::config;

/// Everything the renderer needs to produce a certificate document.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub student_name: String,
    pub course_title: String,
    pub instructor_name: String,
    pub completed_at: DateTime<Utc>,
    pub template: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("renderer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("renderer returned HTTP {0}")]
    Status(u16),

    #[error("no renderer configured")]
    NotConfigured,
}

/// Seam for the document renderer. The production implementation talks HTTP;
/// tests substitute their own.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RendererError>;
}

/// Deterministic plain-text stand-in used when the renderer is unreachable.
/// Same request, same bytes.
pub fn fallback_document(request: &RenderRequest) -> Vec<u8> {
    format!(
        "Certificate of Completion\n\n\
         This certifies that {} has successfully completed\n\
         \"{}\" on {}.\n\n\
         Instructor: {}\n",
        request.student_name,
        request.course_title,
        request.completed_at.format("%Y-%m-%d"),
        request.instructor_name,
    )
    .into_bytes()
}

/// Renderer client backed by the configured HTTP rendering service.
pub struct HttpDocumentRenderer {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpDocumentRenderer {
    pub fn from_config() -> Self {
        Self {
            client: Client::new(),
            url: config::renderer_url(),
            timeout: Duration::from_secs(config::renderer_timeout_seconds()),
        }
    }

    async fn request(&self, request: &RenderRequest) -> Result<Vec<u8>, RendererError> {
        if self.url.is_empty() {
            return Err(RendererError::NotConfigured);
        }

        let payload = serde_json::json!({
            "student_name": request.student_name,
            "course_title": request.course_title,
            "instructor_name": request.instructor_name,
            "completion_date": request.completed_at.format("%Y-%m-%d").to_string(),
            "template": request.template,
        });

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RendererError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DocumentRenderer for HttpDocumentRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RendererError> {
        match self.request(request).await {
            Ok(document) => Ok(document),
            Err(err) => {
                warn!(error = %err, "certificate renderer unavailable; using fallback document");
                Ok(fallback_document(request))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        RenderRequest {
            student_name: "Thandi Mokoena".into(),
            course_title: "Intro to Rust".into(),
            instructor_name: "Pieter Venter".into(),
            completed_at: DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            template: "classic".into(),
        }
    }

    #[test]
    fn test_fallback_document_is_deterministic() {
        let a = fallback_document(&request());
        let b = fallback_document(&request());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_document_contains_certificate_fields() {
        let text = String::from_utf8(fallback_document(&request())).unwrap();
        assert!(text.contains("Thandi Mokoena"));
        assert!(text.contains("Intro to Rust"));
        assert!(text.contains("Pieter Venter"));
        assert!(text.contains("2026-03-02"));
    }
}

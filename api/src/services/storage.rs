//! Client for the durable object store holding rendered certificates.
//!
//! Uploads go over HTTP; downloads resolve to time-limited, HMAC-signed URLs
//! so private artifacts never get a permanent public link.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use util::config;

use super::EngineError;

type HmacSha256 = Hmac<Sha256>;

/// Opaque locator of a stored artifact, persisted on the certificate record.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRef {
    pub public_id: String,
    pub resource_kind: String,
}

#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub public_id: String,
    pub folder: String,
    pub format: String,
}

/// Seam for the durable object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bytes: &[u8], meta: &UploadMetadata) -> Result<ArtifactRef, EngineError>;

    /// Resolves an artifact to a retrievable URL with time-limited access.
    fn resolve(&self, artifact: &ArtifactRef) -> String;
}

/// Builds a signed download URL valid until `expires_at` (unix seconds).
/// Deterministic given the same key, artifact, and expiry.
pub fn signed_download_url(
    base: &str,
    signing_key: &str,
    artifact: &ArtifactRef,
    expires_at: i64,
) -> String {
    let payload = format!(
        "{}:{}:{}",
        artifact.resource_kind, artifact.public_id, expires_at
    );
    let mut mac =
        HmacSha256::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!(
        "{}/{}/{}?expires={}&signature={}",
        base.trim_end_matches('/'),
        artifact.resource_kind,
        artifact.public_id,
        expires_at,
        signature
    )
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: Option<String>,
}

/// Object store client backed by the configured HTTP storage service.
pub struct HttpObjectStore {
    client: Client,
    upload_url: String,
}

impl HttpObjectStore {
    pub fn from_config() -> Self {
        Self {
            client: Client::new(),
            upload_url: config::storage_upload_url(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, bytes: &[u8], meta: &UploadMetadata) -> Result<ArtifactRef, EngineError> {
        let response = self
            .client
            .post(&self.upload_url)
            .query(&[
                ("public_id", meta.public_id.as_str()),
                ("folder", meta.folder.as_str()),
                ("format", meta.format.as_str()),
            ])
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| EngineError::External(format!("artifact upload failed: {err}")))?;

        if !response.status().is_success() {
            return Err(EngineError::External(format!(
                "artifact upload returned HTTP {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| EngineError::External(format!("artifact upload response: {err}")))?;

        Ok(ArtifactRef {
            public_id: body
                .public_id
                .unwrap_or_else(|| format!("{}/{}", meta.folder, meta.public_id)),
            resource_kind: "raw".into(),
        })
    }

    fn resolve(&self, artifact: &ArtifactRef) -> String {
        let expires_at =
            Utc::now().timestamp() + 60 * config::artifact_url_expiry_minutes() as i64;
        signed_download_url(
            &config::storage_public_base(),
            &config::storage_signing_key(),
            artifact,
            expires_at,
        )
    }
}

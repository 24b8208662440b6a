//! Pinning an image and its metadata document to IPFS.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::PinataConfig;
use crate::error::DeskError;

/// A content-addressed pinning endpoint. Both calls return the public URI
/// of the pinned content.
#[async_trait]
pub trait PinningService: Send + Sync {
    async fn pin_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DeskError>;

    async fn pin_json(&self, name: &str, document: Value) -> Result<String, DeskError>;
}

/// An image selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// User-entered descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataInput {
    pub name: String,
    pub symbol: String,
    pub description: String,
}

/// The off-chain metadata document referenced by an on-chain `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub image_uri: String,
    pub metadata_uri: String,
}

/// Pins the image first, then a metadata document pointing at it.
///
/// The two pins are not atomic: if the second fails the image stays pinned
/// and nothing is returned.
#[derive(Clone)]
pub struct UploadCoordinator {
    pinning: Arc<dyn PinningService>,
}

impl UploadCoordinator {
    pub fn new(pinning: Arc<dyn PinningService>) -> Self {
        Self { pinning }
    }

    pub async fn upload(
        &self,
        image: ImageFile,
        metadata: MetadataInput,
    ) -> Result<UploadResult, DeskError> {
        let image_uri = self
            .pinning
            .pin_file(&image.file_name, image.bytes, &image.content_type)
            .await
            .map_err(upload_failed)?;
        debug!(%image_uri, "image pinned");

        let document = MetadataDocument {
            name: metadata.name,
            symbol: metadata.symbol,
            description: metadata.description,
            image: image_uri.clone(),
        };
        let json = serde_json::to_value(&document)
            .map_err(|e| DeskError::UploadFailed(format!("metadata encoding: {e}")))?;
        let metadata_uri = self
            .pinning
            .pin_json(&format!("{}.json", document.name), json)
            .await
            .map_err(upload_failed)?;

        info!(%image_uri, %metadata_uri, "metadata uploaded");
        Ok(UploadResult {
            image_uri,
            metadata_uri,
        })
    }
}

fn upload_failed(err: DeskError) -> DeskError {
    match err {
        DeskError::UploadFailed(_) => err,
        other => DeskError::UploadFailed(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Pinata
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
}

/// [`PinningService`] over the Pinata REST API.
pub struct PinataClient {
    http: Client,
    config: PinataConfig,
}

impl PinataClient {
    pub fn new(config: PinataConfig) -> Result<Self, DeskError> {
        if config.api_key.is_empty() || config.secret_api_key.is_empty() {
            return Err(DeskError::Config("pinata credentials are not set".into()));
        }
        Ok(Self {
            http: Client::new(),
            config,
        })
    }

    fn gateway_uri(&self, hash: &str) -> String {
        format!("{}/ipfs/{hash}", self.config.gateway_base.trim_end_matches('/'))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/pinning/{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String, DeskError> {
        let response = request
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.secret_api_key)
            .send()
            .await
            .map_err(|e| DeskError::UploadFailed(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::UploadFailed(format!("{what}: HTTP {status}: {body}")));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| DeskError::UploadFailed(format!("{what}: malformed response: {e}")))?;
        Ok(self.gateway_uri(&pinned.ipfs_hash))
    }
}

#[async_trait]
impl PinningService for PinataClient {
    async fn pin_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DeskError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| DeskError::UploadFailed(format!("content type {content_type}: {e}")))?;
        let form = Form::new().part("file", part);

        let request = self.http.post(self.endpoint("pinFileToIPFS")).multipart(form);
        self.send(request, "pinFileToIPFS").await
    }

    async fn pin_json(&self, name: &str, document: Value) -> Result<String, DeskError> {
        debug!(name, "pinning json");
        let request = self.http.post(self.endpoint("pinJSONToIPFS")).json(&document);
        self.send(request, "pinJSONToIPFS").await
    }
}

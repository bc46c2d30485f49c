use crate::listings::traits::{BlobRef, BlobStore};
use crate::models::ImageFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob store speaking plain HTTP: `PUT {endpoint}/{key}` to upload,
/// `{public_base}/{key}` to download.
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    public_base: String,
}

impl HttpBlobStore {
    /// Create a blob store whose public URLs share the upload endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        Self::with_public_base(endpoint.clone(), endpoint)
    }

    /// Create a blob store that serves uploads from a separate public base URL
    ///
    /// No client-side deadline is set; a stalled upload is bounded only by the
    /// transport and the caller.
    pub fn with_public_base(
        endpoint: impl Into<String>,
        public_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("campus-exchange/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: trim_slash(endpoint.into()),
            public_base: trim_slash(public_base.into()),
        })
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, key: &str, image: &ImageFile) -> Result<BlobRef> {
        let url = format!("{}/{}", self.endpoint, key);
        debug!("PUT {} ({} bytes)", url, image.bytes.len());

        let content_type = image
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image.bytes.clone())
            .send()
            .await
            .context("Failed to reach blob store")?;

        if !response.status().is_success() {
            warn!("Blob store returned status: {}", response.status());
            anyhow::bail!("Failed to upload {}: {}", key, response.status());
        }

        Ok(BlobRef {
            key: key.to_string(),
        })
    }

    async fn public_url(&self, blob: &BlobRef) -> Result<String> {
        Ok(format!("{}/{}", self.public_base, blob.key))
    }
}

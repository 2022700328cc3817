//! Turning model output into references a caller can display or save.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;

use crate::error::{GenerationError, Result, UpstreamError};

const BLOB_SCHEME: &str = "blob:meshcraft/";
const VIDEO_MIME_TYPE: &str = "video/mp4";

/// A displayable reference to a generated image or video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    /// `data:image/png;base64,...`
    DataUri(String),
    /// Handle into a [`BlobStore`]; release it with [`BlobStore::revoke`].
    Blob(BlobRef),
}

impl Artifact {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataUri(uri) => uri,
            Self::Blob(blob) => blob.as_str(),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps inline base64 image data without decoding it.
pub fn materialize_image(inline_base64: &str) -> Artifact {
    Artifact::DataUri(format!("data:image/png;base64,{inline_base64}"))
}

/// Splits a base64 `data:` URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let (meta, data) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(data).ok()?;
    Some((mime_type.to_string(), bytes))
}

/// Appends the credential as the `key` query parameter.
pub fn authorize_download_uri(uri: &str, credential: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}key={credential}")
}

// --- Blobs ---

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Process-lifetime registry of downloaded payloads.
///
/// Entries stay alive until revoked. Clones share the same registry.
#[derive(Clone, Debug, Default)]
pub struct BlobStore {
    blobs: Arc<DashMap<BlobRef, Arc<Blob>>>,
    next_id: Arc<AtomicU64>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bytes: Vec<u8>, mime_type: impl Into<String>) -> BlobRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let blob_ref = BlobRef(format!("{BLOB_SCHEME}{id}"));
        let blob = Blob {
            bytes,
            mime_type: mime_type.into(),
        };
        self.blobs.insert(blob_ref.clone(), Arc::new(blob));
        blob_ref
    }

    pub fn get(&self, blob_ref: &BlobRef) -> Option<Arc<Blob>> {
        self.blobs.get(blob_ref).map(|entry| entry.value().clone())
    }

    /// Releases a handle. Returns `false` if it was unknown or already released.
    pub fn revoke(&self, blob_ref: &BlobRef) -> bool {
        self.blobs.remove(blob_ref).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

// --- Video download ---

#[derive(Clone, Debug)]
pub struct Materializer {
    http: reqwest::Client,
    blobs: BlobStore,
}

impl Materializer {
    pub fn new(http: reqwest::Client, blobs: BlobStore) -> Self {
        Self { http, blobs }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Downloads a generated video and registers it as a blob.
    pub async fn materialize_video(&self, download_uri: &str, credential: &str) -> Result<Artifact> {
        let url = authorize_download_uri(download_uri, credential);
        log::info!("Downloading generated video");

        let response = self.http.get(&url).send().await.map_err(|e| {
            let error = UpstreamError::transport(e);
            log::error!("Video download failed to send: {}", error);
            error
        })?;
        let status = response.status();
        if !status.is_success() {
            log::error!("Video download failed with HTTP {}", status);
            return Err(GenerationError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("video/"))
            .unwrap_or(VIDEO_MIME_TYPE)
            .to_string();
        let bytes = response.bytes().await.map_err(|e| {
            let error = UpstreamError::transport(e);
            log::error!("Video download was interrupted: {}", error);
            error
        })?;
        log::info!("Downloaded {} bytes of {}", bytes.len(), mime_type);

        Ok(Artifact::Blob(self.blobs.insert(bytes.to_vec(), mime_type)))
    }
}

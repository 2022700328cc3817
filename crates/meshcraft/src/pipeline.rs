use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::artifact::{BlobStore, Materializer};
use crate::auth::{AuthorizationGate, CredentialSource, EnvCredential};
use crate::client::MediaClient;
use crate::config::{ClientOptions, VideoModel};
use crate::error::{GenerationError, Result};
use crate::poll::{await_operation, PollOptions};
use crate::request::{ArtifactKind, GenerationRequest, ImageAsset, Intent};
use crate::GenerationResult;

/// Runs one user intent through gate, client, poller and materializer.
///
/// Requests are independent: concurrent calls share nothing but the credential
/// source and the blob store, and may complete in any order.
#[derive(Clone)]
pub struct Studio {
    gate: AuthorizationGate,
    client: MediaClient,
    materializer: Materializer,
    poll: PollOptions,
}

impl Studio {
    pub fn new(
        options: &ClientOptions,
        gate: AuthorizationGate,
        credential: Arc<dyn CredentialSource>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            gate,
            client: MediaClient::new(http.clone(), options.base_url.clone(), credential),
            materializer: Materializer::new(http, BlobStore::new()),
            poll: PollOptions::from(options),
        }
    }

    /// A studio reading its credential from the configured environment variable.
    pub fn from_options(options: &ClientOptions, gate: AuthorizationGate) -> Self {
        let credential = Arc::new(EnvCredential::new(options.api_key_var.clone()));
        Self::new(options, gate, credential)
    }

    pub fn client(&self) -> &MediaClient {
        &self.client
    }

    pub fn blobs(&self) -> &BlobStore {
        self.materializer.blobs()
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        let outcome = match &request.intent {
            Intent::Create { prompt, reference } => {
                self.gate.ensure_authorized(&request.config.model).await;
                self.client
                    .create_image(prompt, &request.config, reference.as_ref())
                    .await
                    .map(|artifact| GenerationResult {
                        artifact,
                        kind: ArtifactKind::Image,
                    })
            }
            Intent::Edit {
                canvas,
                instruction,
            } => {
                self.gate.ensure_authorized(&request.config.model).await;
                self.client
                    .edit_image(canvas, instruction, &request.config)
                    .await
                    .map(|artifact| GenerationResult {
                        artifact,
                        kind: ArtifactKind::Image,
                    })
            }
            Intent::Animate { still } => self.animate(still, request, cancel).await,
        };

        if let Err(e) = &outcome {
            if e.is_credential_error() {
                self.gate.reselect().await;
            }
        }
        outcome
    }

    async fn animate(
        &self,
        still: &ImageAsset,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        self.gate.ensure_authorized(&VideoModel::default()).await;

        let operation = self
            .client
            .create_video_job(still, request.config.aspect_ratio)
            .await?;
        let uri = await_operation(&self.client, operation, &self.poll, cancel).await?;
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let artifact = self
            .materializer
            .materialize_video(&uri, &self.client.credential())
            .await?;
        Ok(GenerationResult {
            artifact,
            kind: ArtifactKind::Video,
        })
    }
}

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::artifact::{materialize_image, Artifact};
use crate::auth::CredentialSource;
use crate::config::{AspectRatio, GenerationConfig, ModelTier, VideoModel};
use crate::error::{GenerationError, Result, UpstreamError};
use crate::poll::OperationSource;
use crate::prompt::compose_prompt;
use crate::request::{ImageAsset, OperationKind};
use crate::wire::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationOptions, ImageOptions,
    InlineBlob, Operation, RequestPart, SeedImage, VideoInstance, VideoParameters, VideoRequest,
};

/// Calls the generation endpoints and unwraps their responses. Never retries.
#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    base_url: String,
    credential: Arc<dyn CredentialSource>,
}

impl MediaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credential: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn credential(&self) -> String {
        self.credential.api_key()
    }

    /// Generates a wireframe from text, optionally guided by a reference image.
    pub async fn create_image(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        reference: Option<&ImageAsset>,
    ) -> Result<Artifact> {
        let text = compose_prompt(OperationKind::Create, prompt, reference.is_some());
        let mut parts = Vec::with_capacity(2);
        if let Some(reference) = reference {
            parts.push(inline_part(reference));
        }
        parts.push(RequestPart::Text { text: &text });

        self.generate_image("create", parts, config).await
    }

    /// Applies a text instruction to an existing wireframe.
    pub async fn edit_image(
        &self,
        base: &ImageAsset,
        instruction: &str,
        config: &GenerationConfig,
    ) -> Result<Artifact> {
        let text = compose_prompt(OperationKind::Edit, instruction, false);
        let parts = vec![inline_part(base), RequestPart::Text { text: &text }];

        self.generate_image("edit", parts, config).await
    }

    /// Submits an orbit video job for a still image. The returned operation is usually pending.
    pub async fn create_video_job(
        &self,
        still: &ImageAsset,
        aspect_ratio: AspectRatio,
    ) -> Result<Operation> {
        let model = VideoModel::default();
        let prompt = compose_prompt(OperationKind::Animate, "", false);
        let body = video_request(&prompt, still, model, aspect_ratio);
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, model.model_id());

        log::info!(
            "Submitting video job to {} ({})",
            model.model_id(),
            aspect_ratio.for_video()
        );
        let operation: Operation = self.post_json("animate", &url, &body).await?;
        log::info!("Video job submitted. Operation name: {}", operation.name);
        Ok(operation)
    }

    async fn generate_image(
        &self,
        context: &'static str,
        parts: Vec<RequestPart<'_>>,
        config: &GenerationConfig,
    ) -> Result<Artifact> {
        let body = image_request(parts, config);
        let url = format!("{}/models/{}:generateContent", self.base_url, config.model.model_id());

        log::info!(
            "Requesting {} image from {} ({})",
            context,
            config.model.model_id(),
            config.aspect_ratio
        );
        let response: GenerateContentResponse = self.post_json(context, &url, &body).await?;
        let image = response.first_inline_image()?;
        log::info!("Received {} image ({})", context, image.mime_type);

        Ok(materialize_image(&image.data))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        context: &str,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let request = self
            .http
            .post(url)
            .query(&[("key", self.credential.api_key())])
            .json(body);
        self.execute(context, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            let error = UpstreamError::transport(e);
            log::error!("{} request failed to send: {}", context, error);
            error
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let error = UpstreamError::transport(e);
            log::error!("{} response could not be read: {}", context, error);
            error
        })?;
        if !status.is_success() {
            let error = UpstreamError::from_body(status.as_u16(), &body);
            log::error!("{} request failed: {}", context, error);
            return Err(error.into());
        }

        serde_json::from_str(&body).map_err(|e| {
            let error = UpstreamError::decode(status.as_u16(), e);
            log::error!("{} response could not be decoded: {}", context, error);
            GenerationError::from(error)
        })
    }
}

impl OperationSource for MediaClient {
    fn fetch_operation<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Operation>> {
        Box::pin(async move {
            let url = format!("{}/{}", self.base_url, name.trim_start_matches('/'));
            let request = self
                .http
                .get(&url)
                .query(&[("key", self.credential.api_key())]);
            self.execute("poll", request).await
        })
    }
}

fn inline_part(asset: &ImageAsset) -> RequestPart<'static> {
    RequestPart::InlineData {
        inline_data: InlineBlob {
            mime_type: asset.mime_type.clone(),
            data: asset.to_base64(),
        },
    }
}

/// The `generateContent` body. `imageSize` is only present for models that accept it.
pub fn image_request<'a>(
    parts: Vec<RequestPart<'a>>,
    config: &GenerationConfig,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationOptions {
            image_config: ImageOptions {
                aspect_ratio: config.aspect_ratio.as_str(),
                image_size: config.image_size(),
            },
        },
    }
}

/// The `predictLongRunning` body: one video at the model's fixed resolution.
pub fn video_request<'a>(
    prompt: &'a str,
    still: &ImageAsset,
    model: VideoModel,
    aspect_ratio: AspectRatio,
) -> VideoRequest<'a> {
    VideoRequest {
        instances: vec![VideoInstance {
            prompt,
            image: SeedImage {
                bytes_base64_encoded: still.to_base64(),
                mime_type: still.mime_type.clone(),
            },
        }],
        parameters: VideoParameters {
            sample_count: 1,
            resolution: model.resolution(),
            aspect_ratio: aspect_ratio.for_video().as_str(),
        },
    }
}

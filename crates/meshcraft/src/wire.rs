//! JSON shapes of the Gemini REST endpoints.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, UpstreamError};

// --- generateContent ---

#[derive(Serialize, Debug)]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationOptions<'a>,
}

#[derive(Serialize, Debug)]
pub struct Content<'a> {
    pub parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineBlob,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InlineBlob {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

#[derive(Serialize, Debug)]
pub struct GenerationOptions<'a> {
    #[serde(rename = "imageConfig")]
    pub image_config: ImageOptions<'a>,
}

#[derive(Serialize, Debug)]
pub struct ImageOptions<'a> {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: &'a str,
    #[serde(rename = "imageSize", skip_serializing_if = "Option::is_none")]
    pub image_size: Option<&'a str>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

/// A response part, decoded by shape.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ResponsePart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineBlob,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

impl GenerateContentResponse {
    /// The first inline-data part of the first candidate; later parts and candidates are ignored.
    pub fn first_inline_image(&self) -> Result<&InlineBlob, GenerationError> {
        let candidate = self
            .candidates
            .first()
            .ok_or(GenerationError::NoCandidates)?;
        candidate
            .content
            .iter()
            .flat_map(|content| &content.parts)
            .find_map(|part| match part {
                ResponsePart::InlineData { inline_data } => Some(inline_data),
                _ => None,
            })
            .ok_or(GenerationError::NoImageData)
    }
}

// --- predictLongRunning ---

#[derive(Serialize, Debug)]
pub struct VideoRequest<'a> {
    pub instances: Vec<VideoInstance<'a>>,
    pub parameters: VideoParameters<'a>,
}

#[derive(Serialize, Debug)]
pub struct VideoInstance<'a> {
    pub prompt: &'a str,
    pub image: SeedImage,
}

#[derive(Serialize, Debug)]
pub struct SeedImage {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Serialize, Debug)]
pub struct VideoParameters<'a> {
    #[serde(rename = "sampleCount")]
    pub sample_count: u32,
    pub resolution: &'a str,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: &'a str,
}

/// Snapshot of a long-running job. Each poll yields a fresh value.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<OperationResponse>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OperationResponse {
    #[serde(rename = "generateVideoResponse", default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<Video>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Video {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    /// Download location of the first generated video, if any.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
    }
}

impl From<OperationError> for UpstreamError {
    fn from(error: OperationError) -> Self {
        Self {
            code: error.code,
            status: error.status,
            reason: None,
            message: error.message,
        }
    }
}

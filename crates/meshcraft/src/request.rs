use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::artifact::{decode_data_uri, Artifact};
use crate::config::GenerationConfig;

const FALLBACK_MIME_TYPE: &str = "image/png";

/// Raw image bytes sent to the model alongside a prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAsset {
    /// Wraps bytes, sniffing the MIME type from their header.
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        Self { bytes, mime_type }
    }

    pub fn with_mime_type(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_base64(data: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(data.trim()).map(Self::new)
    }

    /// Rebuilds an asset from a `data:` reference produced earlier.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let (mime_type, bytes) = decode_data_uri(uri)?;
        Some(Self { bytes, mime_type })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// What the user asked for, carrying exactly the assets that operation needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Create {
        prompt: String,
        /// Silhouette and scale hint, never traced.
        reference: Option<ImageAsset>,
    },
    Edit {
        canvas: ImageAsset,
        instruction: String,
    },
    Animate {
        still: ImageAsset,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Edit,
    Animate,
}

impl Intent {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::Edit { .. } => OperationKind::Edit,
            Self::Animate { .. } => OperationKind::Animate,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub intent: Intent,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn create(prompt: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            intent: Intent::Create {
                prompt: prompt.into(),
                reference: None,
            },
            config,
        }
    }

    pub fn edit(
        canvas: ImageAsset,
        instruction: impl Into<String>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            intent: Intent::Edit {
                canvas,
                instruction: instruction.into(),
            },
            config,
        }
    }

    pub fn animate(still: ImageAsset, config: GenerationConfig) -> Self {
        Self {
            intent: Intent::Animate { still },
            config,
        }
    }

    /// Attaches a reference image to a create request; other intents are returned unchanged.
    pub fn with_reference(mut self, asset: ImageAsset) -> Self {
        if let Intent::Create { reference, .. } = &mut self.intent {
            *reference = Some(asset);
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Image,
    Video,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationResult {
    pub artifact: Artifact,
    pub kind: ArtifactKind,
}

//! Wireframe image and orbit video generation over the Gemini API.
//!
//! A [`GenerationRequest`] goes through the [`AuthorizationGate`], gets its prompt
//! composed, is sent by the [`MediaClient`], polled to completion for videos, and
//! comes back as an [`Artifact`] the caller can display or save.

pub mod artifact;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod poll;
pub mod prompt;
pub mod request;
pub mod wire;

pub use artifact::{Artifact, Blob, BlobRef, BlobStore, Materializer};
pub use auth::{AuthorizationGate, CredentialSource, EnvCredential, KeySelector, StaticCredential};
pub use client::MediaClient;
pub use config::{
    AspectRatio, ClientOptions, GenerationConfig, ImageModel, ModelTier, ParseConfigError,
    QualityTier, VideoModel,
};
pub use error::{GenerationError, Result, UpstreamError};
pub use pipeline::Studio;
pub use poll::{await_operation, OperationSource, PollOptions};
pub use prompt::compose_prompt;
pub use request::{
    ArtifactKind, GenerationRequest, GenerationResult, ImageAsset, Intent, OperationKind,
};
pub use tokio_util::sync::CancellationToken;

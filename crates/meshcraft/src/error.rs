use std::time::Duration;

use serde::Deserialize;

pub type Result<T> = std::result::Result<T, GenerationError>;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("The model returned no candidates")]
    NoCandidates,

    #[error("The model returned a candidate without image data")]
    NoImageData,

    #[error("Video operation completed without a download URI")]
    NoUriReturned,

    #[error("Video download failed with HTTP {status}")]
    DownloadFailed { status: u16 },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Key selection is unavailable: {0}")]
    AuthorizationUnavailable(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Operation did not complete within {waited:?}")]
    Timeout { waited: Duration },
}

impl GenerationError {
    /// Whether the failure signals a missing or rejected credential.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::Upstream(error) => error.is_credential_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        Self::Upstream(UpstreamError::transport(error))
    }
}

/// A transport or server-side fault, classified by the structured fields of the error envelope.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Upstream error ({code}): {message}")]
pub struct UpstreamError {
    /// HTTP status of the failed call, the RPC code of a failed operation,
    /// or `0` when no response arrived.
    pub code: i32,
    /// Canonical status such as `NOT_FOUND` or `INVALID_ARGUMENT`.
    pub status: Option<String>,
    /// First `reason` found in the error details, such as `API_KEY_INVALID`.
    pub reason: Option<String>,
    pub message: String,
}

const CREDENTIAL_STATUSES: [&str; 3] = ["NOT_FOUND", "PERMISSION_DENIED", "UNAUTHENTICATED"];
const CREDENTIAL_REASONS: [&str; 2] = ["API_KEY_INVALID", "API_KEY_SERVICE_BLOCKED"];

impl UpstreamError {
    /// Parses the Google error envelope, keeping the raw body as message otherwise.
    pub fn from_body(http_status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Body,
        }

        #[derive(Deserialize)]
        struct Body {
            #[serde(default)]
            message: String,
            status: Option<String>,
            #[serde(default)]
            details: Vec<Detail>,
        }

        #[derive(Deserialize)]
        struct Detail {
            reason: Option<String>,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope { error }) => Self {
                code: http_status.into(),
                status: error.status,
                reason: error.details.into_iter().find_map(|d| d.reason),
                message: error.message,
            },
            Err(_) => Self {
                code: http_status.into(),
                status: None,
                reason: None,
                message: body.trim().to_string(),
            },
        }
    }

    /// A failure before or while reading a response. The request URL carries the
    /// credential, so it is stripped from the message.
    pub fn transport(error: reqwest::Error) -> Self {
        let code = error.status().map_or(0, |status| status.as_u16().into());
        let error = error.without_url();
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message = format!("{message}: {cause}");
            source = cause.source();
        }
        Self {
            code,
            status: None,
            reason: None,
            message,
        }
    }

    /// A success response whose body did not have the expected shape.
    pub fn decode(http_status: u16, error: serde_json::Error) -> Self {
        Self {
            code: http_status.into(),
            status: None,
            reason: None,
            message: format!("Failed to decode response: {error}"),
        }
    }

    pub fn is_credential_error(&self) -> bool {
        let by_status = self
            .status
            .as_deref()
            .is_some_and(|s| CREDENTIAL_STATUSES.contains(&s));
        let by_reason = self
            .reason
            .as_deref()
            .is_some_and(|r| CREDENTIAL_REASONS.contains(&r));
        by_status || by_reason
    }
}

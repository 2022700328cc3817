use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} {value:?} (expected one of: {expected})")]
pub struct ParseConfigError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

// --- Models ---

/// Capabilities of a model the pipeline can call.
pub trait ModelTier: Send + Sync {
    fn model_id(&self) -> &'static str;

    /// Whether calls must be billed to a key the user picked explicitly.
    fn requires_selected_key(&self) -> bool;

    fn supports_image_size(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageModel {
    #[default]
    Flash,
    Pro,
}

impl ModelTier for ImageModel {
    fn model_id(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }

    fn requires_selected_key(&self) -> bool {
        matches!(self, Self::Pro)
    }

    fn supports_image_size(&self) -> bool {
        matches!(self, Self::Pro)
    }
}

impl FromStr for ImageModel {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flash" | "gemini-2.5-flash-image" => Ok(Self::Flash),
            "pro" | "gemini-3-pro-image-preview" => Ok(Self::Pro),
            _ => Err(ParseConfigError {
                kind: "image model",
                value: s.to_string(),
                expected: "flash, pro",
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VideoModel {
    #[default]
    VeoFast,
}

impl VideoModel {
    pub fn resolution(&self) -> &'static str {
        "720p"
    }
}

impl ModelTier for VideoModel {
    fn model_id(&self) -> &'static str {
        "veo-3.1-fast-generate-preview"
    }

    fn requires_selected_key(&self) -> bool {
        true
    }
}

// --- Generation options ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait,
    Landscape,
    Tall,
    Wide,
}

impl AspectRatio {
    pub const ALL: [Self; 5] = [
        Self::Square,
        Self::Portrait,
        Self::Landscape,
        Self::Tall,
        Self::Wide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "3:4",
            Self::Landscape => "4:3",
            Self::Tall => "9:16",
            Self::Wide => "16:9",
        }
    }

    /// The closest ratio the video model accepts: `9:16` stays, everything else is `16:9`.
    pub fn for_video(&self) -> Self {
        match self {
            Self::Tall => Self::Tall,
            _ => Self::Wide,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| ParseConfigError {
                kind: "aspect ratio",
                value: s.to_string(),
                expected: "1:1, 3:4, 4:3, 9:16, 16:9",
            })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QualityTier {
    #[default]
    Standard,
    High,
    Ultra,
}

impl QualityTier {
    /// Value of the `imageSize` generation option.
    pub fn image_size(&self) -> &'static str {
        match self {
            Self::Standard => "1K",
            Self::High => "2K",
            Self::Ultra => "4K",
        }
    }
}

impl FromStr for QualityTier {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" | "STANDARD" => Ok(Self::Standard),
            "2K" | "HIGH" => Ok(Self::High),
            "4K" | "ULTRA" => Ok(Self::Ultra),
            _ => Err(ParseConfigError {
                kind: "quality tier",
                value: s.to_string(),
                expected: "1k, 2k, 4k",
            }),
        }
    }
}

/// Caller-owned settings shared by every request of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationConfig {
    pub aspect_ratio: AspectRatio,
    pub model: ImageModel,
    pub quality: QualityTier,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_model(mut self, model: ImageModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    /// The `imageSize` hint, present only when the model understands it.
    pub fn image_size(&self) -> Option<&'static str> {
        self.model
            .supports_image_size()
            .then(|| self.quality.image_size())
    }
}

// --- Client options ---

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    /// Name of the environment variable holding the credential.
    pub api_key_var: String,
    pub poll_interval: Duration,
    /// `None` waits for a video job indefinitely.
    pub max_wait: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("MESHCRAFT_BASE_URL").unwrap_or(defaults.base_url);
        let api_key_var = env::var("MESHCRAFT_API_KEY_VAR").unwrap_or(defaults.api_key_var);
        let poll_interval = env::var("MESHCRAFT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);
        let max_wait = env::var("MESHCRAFT_MAX_WAIT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        Self {
            base_url,
            api_key_var,
            poll_interval,
            max_wait,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key_var(mut self, api_key_var: impl Into<String>) -> Self {
        self.api_key_var = api_key_var.into();
        self
    }

    /// A zero interval is ignored and the current one kept.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        if poll_interval.is_zero() {
            log::warn!("Ignoring zero poll interval, keeping {:?}", self.poll_interval);
        } else {
            self.poll_interval = poll_interval;
        }
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

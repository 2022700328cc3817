//! To run the program, please execute the following commands in your terminal:
//!
//! 1.  **Set the environment variable for your API key:**
//!     ```bash
//!     export GEMINI_API_KEY="YOUR_GEMINI_API_KEY"
//!     ```
//! 2.  **Generate a wireframe, then refine and animate it:**
//!     ```bash
//!     cargo r -p text-to-wireframe -- create "a vintage 35mm camera"
//!     cargo r -p text-to-wireframe -- edit outputs/wireframe-1.png "open the film door"
//!     cargo r -p text-to-wireframe -- animate outputs/wireframe-2.png --aspect 16:9
//!     ```
//!     Set `RUST_LOG=debug` to follow every poll of a video job.

mod host;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use meshcraft::artifact::decode_data_uri;
use meshcraft::{
    Artifact, AspectRatio, AuthorizationGate, CancellationToken, ClientOptions, GenerationConfig,
    GenerationRequest, GenerationResult, ImageAsset, ImageModel, QualityTier, Studio,
};

#[derive(Parser, Debug)]
#[command(about = "Generate, edit and animate CAD-style wireframe renders")]
struct Cli {
    /// Directory the generated files are written to.
    #[arg(long, default_value = "outputs")]
    out_dir: PathBuf,

    /// Overrides `MESHCRAFT_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds between video status checks.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: Option<u64>,

    /// Give up on a video job after this many seconds.
    #[arg(long)]
    max_wait: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a new wireframe from a description.
    Create {
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Image used as a silhouette and scale hint.
        #[arg(long)]
        reference: Option<PathBuf>,

        #[command(flatten)]
        style: StyleArgs,
    },
    /// Modify an existing wireframe.
    Edit {
        image: PathBuf,

        #[arg(required = true)]
        instruction: Vec<String>,

        #[command(flatten)]
        style: StyleArgs,
    },
    /// Turn a wireframe into a short orbit video.
    Animate {
        image: PathBuf,

        /// Only 16:9 and 9:16 are produced; other ratios become 16:9.
        #[arg(long, default_value = "16:9")]
        aspect: AspectRatio,
    },
}

#[derive(Args, Debug)]
struct StyleArgs {
    #[arg(long, default_value = "1:1")]
    aspect: AspectRatio,

    /// `flash` or `pro` (pro asks for a paid key).
    #[arg(long, default_value = "flash")]
    model: ImageModel,

    /// `1k`, `2k` or `4k`; ignored by models without a resolution option.
    #[arg(long, default_value = "1k")]
    quality: QualityTier,
}

impl StyleArgs {
    fn config(&self) -> GenerationConfig {
        GenerationConfig::new()
            .with_aspect_ratio(self.aspect)
            .with_model(self.model)
            .with_quality(self.quality)
    }
}

async fn read_image(path: &Path) -> Result<ImageAsset> {
    let bytes = tokio::fs::read(path)
        .await
        .wrap_err_with(|| format!("Failed to read image {}", path.display()))?;
    Ok(ImageAsset::new(bytes))
}

async fn build_request(command: &Command) -> Result<GenerationRequest> {
    let request = match command {
        Command::Create {
            prompt,
            reference,
            style,
        } => {
            let request = GenerationRequest::create(prompt.join(" "), style.config());
            match reference {
                Some(path) => request.with_reference(read_image(path).await?),
                None => request,
            }
        }
        Command::Edit {
            image,
            instruction,
            style,
        } => {
            let canvas = read_image(image).await?;
            GenerationRequest::edit(canvas, instruction.join(" "), style.config())
        }
        Command::Animate { image, aspect } => GenerationRequest::animate(
            read_image(image).await?,
            GenerationConfig::new().with_aspect_ratio(*aspect),
        ),
    };
    Ok(request)
}

/// Writes the artifact to disk and releases its blob handle, if any.
async fn save(studio: &Studio, result: GenerationResult, out_dir: &Path) -> Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let (path, bytes) = match &result.artifact {
        Artifact::DataUri(uri) => {
            let (_, bytes) =
                decode_data_uri(uri).ok_or_else(|| eyre!("Model returned a malformed image"))?;
            (out_dir.join(format!("wireframe-{stamp}.png")), bytes)
        }
        Artifact::Blob(blob_ref) => {
            let blob = studio
                .blobs()
                .get(blob_ref)
                .ok_or_else(|| eyre!("Video blob {} was already released", blob_ref.as_str()))?;
            (out_dir.join(format!("orbit-{stamp}.mp4")), blob.bytes.clone())
        }
    };

    tokio::fs::create_dir_all(out_dir)
        .await
        .wrap_err_with(|| format!("Failed to create {}", out_dir.display()))?;
    tokio::fs::write(&path, bytes)
        .await
        .wrap_err_with(|| format!("Failed to save {}", path.display()))?;

    if let Artifact::Blob(blob_ref) = &result.artifact {
        studio.blobs().revoke(blob_ref);
    }
    Ok(path)
}

/// Main entry point for the application.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // --- 1. Setup ---
    let cli = Cli::parse();
    let mut options = ClientOptions::from_env();
    if let Some(base_url) = &cli.base_url {
        options = options.with_base_url(base_url);
    }
    if let Some(secs) = cli.poll_interval {
        options = options.with_poll_interval(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.max_wait {
        options = options.with_max_wait(Some(Duration::from_secs(secs)));
    }

    let (selector, credential) = host::terminal_host(&options.api_key_var);
    let studio = Studio::new(&options, AuthorizationGate::new(selector), credential);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling the current job");
            on_interrupt.cancel();
        }
    });

    // --- 2. Generate ---
    let request = build_request(&cli.command).await?;
    let result = studio
        .generate(&request, &cancel)
        .await
        .wrap_err("Generation failed")?;

    // --- 3. Save ---
    let path = save(&studio, result, &cli.out_dir).await?;
    eprintln!("Saved {}", path.display());

    Ok(())
}

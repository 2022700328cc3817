use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ClientOptions, DEFAULT_POLL_INTERVAL};
use crate::error::{GenerationError, Result, UpstreamError};
use crate::wire::Operation;

/// Anything that can refresh a long-running operation by name.
pub trait OperationSource: Send + Sync {
    fn fetch_operation<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Operation>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the job finishes or the token is cancelled.
    pub max_wait: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl From<&ClientOptions> for PollOptions {
    fn from(options: &ClientOptions) -> Self {
        Self {
            interval: options.poll_interval,
            max_wait: options.max_wait,
        }
    }
}

/// Waits for `initial` to finish and returns the generated video's download URI.
pub async fn await_operation(
    source: &dyn OperationSource,
    initial: Operation,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<String> {
    let started = Instant::now();
    let mut operation = initial;
    let mut polls = 0_u32;

    while !operation.done {
        if let Some(max_wait) = options.max_wait {
            if started.elapsed() + options.interval > max_wait {
                log::warn!("Giving up on {} after {} polls", operation.name, polls);
                return Err(GenerationError::Timeout {
                    waited: started.elapsed(),
                });
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Stopped polling {}", operation.name);
                return Err(GenerationError::Cancelled);
            }
            _ = sleep(options.interval) => {}
        }

        polls += 1;
        log::debug!("Polling {} (attempt {})", operation.name, polls);
        operation = source.fetch_operation(&operation.name).await?;
    }

    log::info!(
        "Operation {} finished after {} polls in {:?}",
        operation.name,
        polls,
        started.elapsed()
    );

    if let Some(error) = operation.error.take() {
        return Err(UpstreamError::from(error).into());
    }
    operation
        .video_uri()
        .map(str::to_string)
        .ok_or(GenerationError::NoUriReturned)
}

use std::env;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::ModelTier;
use crate::error::GenerationError;

/// Host-provided key selection, such as a browser extension or a desktop keychain prompt.
pub trait KeySelector: Send + Sync {
    fn has_selected_api_key(&self) -> BoxFuture<'_, Result<bool, GenerationError>>;

    /// Opens the interactive selection flow. Completion does not imply that a key was picked.
    fn open_select_key(&self) -> BoxFuture<'_, Result<(), GenerationError>>;
}

/// Makes sure a paid model is called with a key the user picked.
///
/// The gate never fails a request. A missing host capability, or one that errors,
/// is logged and the request proceeds with whatever credential is ambient.
#[derive(Clone, Default)]
pub struct AuthorizationGate {
    selector: Option<Arc<dyn KeySelector>>,
}

impl AuthorizationGate {
    pub fn new(selector: Arc<dyn KeySelector>) -> Self {
        Self {
            selector: Some(selector),
        }
    }

    /// A gate for hosts without key selection.
    pub fn bypass() -> Self {
        Self::default()
    }

    pub async fn ensure_authorized(&self, model: &dyn ModelTier) {
        if !model.requires_selected_key() {
            return;
        }
        let Some(selector) = &self.selector else {
            log::warn!(
                "No key selector available, using ambient credential for {}",
                model.model_id()
            );
            return;
        };

        match selector.has_selected_api_key().await {
            Ok(true) => {}
            Ok(false) => {
                log::info!(
                    "{} requires a selected API key, opening key selection",
                    model.model_id()
                );
                // Selection is assumed to succeed once the flow returns.
                if let Err(e) = selector.open_select_key().await {
                    log::warn!("Key selection failed, proceeding: {}", e);
                }
            }
            Err(e) => log::warn!("Could not query key selection, proceeding: {}", e),
        }
    }

    /// Re-opens key selection after the service rejected the credential.
    pub async fn reselect(&self) {
        let Some(selector) = &self.selector else {
            return;
        };
        log::warn!("Credential was rejected, asking for a new API key");
        if let Err(e) = selector.open_select_key().await {
            log::warn!("Key selection failed: {}", e);
        }
    }
}

/// Where the credential comes from. Read on every call, never cached by the pipeline.
pub trait CredentialSource: Send + Sync {
    /// The current key, or an empty string when none is configured.
    fn api_key(&self) -> String;
}

#[derive(Clone, Debug)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn api_key(&self) -> String {
        env::var(&self.var).unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct StaticCredential(pub String);

impl CredentialSource for StaticCredential {
    fn api_key(&self) -> String {
        self.0.clone()
    }
}

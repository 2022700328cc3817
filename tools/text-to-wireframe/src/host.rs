use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use meshcraft::{CredentialSource, EnvCredential, GenerationError, KeySelector};

/// A key typed in at the terminal, shared by the selector and the credential source.
type KeySlot = Arc<Mutex<Option<String>>>;

/// Key selection for a terminal session: a key counts as selected once the
/// credential variable is set or one was typed in.
pub struct TerminalKeySelector {
    var: String,
    slot: KeySlot,
}

impl KeySelector for TerminalKeySelector {
    fn has_selected_api_key(&self) -> BoxFuture<'_, Result<bool, GenerationError>> {
        Box::pin(async move {
            let typed = read_slot(&self.slot).is_some();
            let ambient = env::var(&self.var).is_ok_and(|key| !key.is_empty());
            Ok(typed || ambient)
        })
    }

    fn open_select_key(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        Box::pin(async move {
            if !io::stdin().is_terminal() {
                return Err(GenerationError::AuthorizationUnavailable(
                    "stdin is not a terminal".into(),
                ));
            }
            let prompt = format!("Paste an API key for a paid project (or set {}): ", self.var);
            let key = tokio::task::spawn_blocking(move || read_key(&prompt))
                .await
                .map_err(|e| GenerationError::AuthorizationUnavailable(e.to_string()))?
                .map_err(|e| GenerationError::AuthorizationUnavailable(e.to_string()))?;

            if !key.is_empty() {
                if let Ok(mut slot) = self.slot.lock() {
                    *slot = Some(key);
                }
            }
            Ok(())
        })
    }
}

/// Prefers a typed-in key over the environment.
pub struct HostCredential {
    slot: KeySlot,
    ambient: EnvCredential,
}

impl CredentialSource for HostCredential {
    fn api_key(&self) -> String {
        read_slot(&self.slot).unwrap_or_else(|| self.ambient.api_key())
    }
}

pub fn terminal_host(var: &str) -> (Arc<TerminalKeySelector>, Arc<HostCredential>) {
    let slot = KeySlot::default();
    let selector = TerminalKeySelector {
        var: var.to_string(),
        slot: slot.clone(),
    };
    let credential = HostCredential {
        slot,
        ambient: EnvCredential::new(var),
    };
    (Arc::new(selector), Arc::new(credential))
}

fn read_slot(slot: &KeySlot) -> Option<String> {
    slot.lock().ok().and_then(|key| key.clone())
}

fn read_key(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

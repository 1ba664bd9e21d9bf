//! Passphrase input for the CLI.

use std::io::IsTerminal;

use async_trait::async_trait;
use dialoguer::Password;

use passfile_core::{PassphrasePrompt, PromptPurpose, PromptRequest};

const PASSPHRASE_ENV: &str = "PASSFILE_PASSPHRASE";

fn env_passphrase() -> Option<String> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_password(request: &PromptRequest) -> anyhow::Result<String> {
    let mut input = Password::new().with_prompt(request.message.as_str());
    if request.confirm {
        input = input.with_confirmation("Confirm passphrase", "Passphrases do not match");
    }
    input
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

/// Prompt for a passphrase, or read it from PASSFILE_PASSPHRASE.
///
/// The environment value only answers the first unlock attempt, so a wrong
/// value fails fast instead of being retried.
pub struct TerminalPrompt {
    interactive: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }

    fn answer(&self, request: PromptRequest) -> Option<String> {
        let from_env = match request.purpose {
            PromptPurpose::Unlock => request.attempt == 1,
            PromptPurpose::NewPassphrase => true,
            PromptPurpose::DeleteConfirmation => false,
        };
        if from_env {
            if let Some(value) = env_passphrase() {
                return Some(value);
            }
        }
        if !self.interactive {
            tracing::warn!(
                "No passphrase available and no TTY; set {} to run non-interactively",
                PASSPHRASE_ENV
            );
            return None;
        }
        match read_password(&request) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("{}", err);
                None
            }
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassphrasePrompt for TerminalPrompt {
    async fn ask(&self, request: PromptRequest) -> Option<String> {
        let prompt = Self {
            interactive: self.interactive,
        };
        tokio::task::spawn_blocking(move || prompt.answer(request))
            .await
            .ok()
            .flatten()
    }
}

/// Ask for a new passphrase (with confirmation), or read PASSFILE_PASSPHRASE.
pub async fn prompt_new_passphrase(passfile_name: &str) -> anyhow::Result<String> {
    TerminalPrompt::new()
        .ask(PromptRequest::new_passphrase(passfile_name))
        .await
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No passphrase provided and no TTY available. Set {}.",
                PASSPHRASE_ENV
            )
        })
}

/// Mask a secret for display.
pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

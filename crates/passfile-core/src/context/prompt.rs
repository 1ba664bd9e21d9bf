//! Passphrase prompt boundary.

use async_trait::async_trait;

/// What the context needs from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    /// Passphrase that unlocks passfile content.
    Unlock,
    /// A new passphrase; should be asked twice.
    NewPassphrase,
    /// Account secret the server checks before deleting a passfile.
    DeleteConfirmation,
}

/// One request for a secret string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub purpose: PromptPurpose,
    pub message: String,
    /// Ask for the value twice and require both entries to match.
    pub confirm: bool,
    /// 1-based attempt number, above 1 after a wrong passphrase.
    pub attempt: u32,
}

impl PromptRequest {
    pub fn unlock(passfile_name: &str, attempt: u32) -> Self {
        let message = if attempt > 1 {
            format!("Incorrect passphrase. Passphrase for '{}'", passfile_name)
        } else {
            format!("Passphrase for '{}'", passfile_name)
        };
        Self {
            purpose: PromptPurpose::Unlock,
            message,
            confirm: false,
            attempt,
        }
    }

    pub fn new_passphrase(passfile_name: &str) -> Self {
        Self {
            purpose: PromptPurpose::NewPassphrase,
            message: format!("New passphrase for '{}'", passfile_name),
            confirm: true,
            attempt: 1,
        }
    }

    pub fn delete_confirmation(passfile_name: &str) -> Self {
        Self {
            purpose: PromptPurpose::DeleteConfirmation,
            message: format!("Account password to delete '{}' from the server", passfile_name),
            confirm: false,
            attempt: 1,
        }
    }
}

/// Asks the user for secrets.
///
/// Returning `None` means the user dismissed the prompt; the operation
/// waiting on it fails with `PassfileError::Cancelled`.
#[async_trait]
pub trait PassphrasePrompt: Send + Sync {
    async fn ask(&self, request: PromptRequest) -> Option<String>;
}

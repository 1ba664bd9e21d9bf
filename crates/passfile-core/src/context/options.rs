//! Per-context settings: server identity, owner and passphrase policy.

use serde::{Deserialize, Serialize};

use crate::crypto::DEFAULT_MIN_PASSPHRASE_LENGTH;

/// Default number of passphrase prompts before giving up.
pub const DEFAULT_PASSPHRASE_ATTEMPTS: u32 = 3;

/// Settings of one passfile context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Identity of the server this context syncs with.
    pub server_id: String,
    /// Owner of passfiles created in this context.
    pub user_id: i64,
    /// Prompts per unlock before `AuthenticationFailed` surfaces.
    pub passphrase_attempts: u32,
    pub min_passphrase_length: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            server_id: "local".to_string(),
            user_id: 0,
            passphrase_attempts: DEFAULT_PASSPHRASE_ATTEMPTS,
            min_passphrase_length: DEFAULT_MIN_PASSPHRASE_LENGTH,
        }
    }
}

//! Crypto gate for passfile content.
//!
//! - **Age** passphrase encryption (scrypt KDF, authenticated payload)
//! - passphrase validation
//!
//! No derived keys are cached between calls; the passfile context keeps at
//! most the passphrase itself, for one session.

pub mod encryption;
pub mod passphrase;

pub use encryption::{decrypt, decrypt_async, encrypt, encrypt_async};
pub use passphrase::{validate_passphrase, DEFAULT_MIN_PASSPHRASE_LENGTH};

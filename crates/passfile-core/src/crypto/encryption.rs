//! Age encryption/decryption of passfile content.
//!
//! Content bytes are encrypted with Age passphrase-based encryption: scrypt
//! for key derivation and ChaCha20-Poly1305 for the payload, so a wrong
//! passphrase or a tampered payload is always detected.
//!
//! Key derivation is deliberately slow. The async variants move the work to
//! the blocking pool and stop waiting as soon as the cancellation token fires.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::error::{PassfileError, Result};
use crate::model::Passphrase;

/// Encrypt data using Age passphrase-based encryption.
///
/// # Examples
///
/// ```
/// use passfile_core::crypto::encrypt;
/// use passfile_core::model::Passphrase;
///
/// let plaintext = b"secret data";
/// let encrypted = encrypt(plaintext, &Passphrase::new("my-secure-passphrase")).unwrap();
/// assert_ne!(encrypted.as_slice(), plaintext);
/// ```
pub fn encrypt(data: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_user_passphrase(SecretString::from(
        passphrase.expose().to_string(),
    ));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| PassfileError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    writer
        .write_all(data)
        .map_err(|e| PassfileError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| PassfileError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

/// Decrypt data using Age passphrase-based encryption.
///
/// # Errors
///
/// - `PassfileError::AuthenticationFailed` if the passphrase is incorrect
/// - `PassfileError::ContentCorrupt` if the data is not a valid Age file or
///   the payload fails authentication
pub fn decrypt(encrypted_data: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(encrypted_data)
        .map_err(|e| PassfileError::ContentCorrupt(format!("Invalid encrypted header: {}", e)))?;

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.expose().to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => PassfileError::AuthenticationFailed,
            _ => PassfileError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| PassfileError::ContentCorrupt(format!("Encrypted payload damaged: {}", e)))?;

    Ok(decrypted)
}

/// [`encrypt`] on the blocking pool, abandoned when `cancel` fires.
pub async fn encrypt_async(
    data: Vec<u8>,
    passphrase: Passphrase,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    run_blocking(cancel, move || encrypt(&data, &passphrase)).await
}

/// [`decrypt`] on the blocking pool, abandoned when `cancel` fires.
pub async fn decrypt_async(
    data: Vec<u8>,
    passphrase: Passphrase,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    run_blocking(cancel, move || decrypt(&data, &passphrase)).await
}

async fn run_blocking<F>(cancel: &CancellationToken, work: F) -> Result<Vec<u8>>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(PassfileError::Cancelled);
    }
    let task = tokio::task::spawn_blocking(work);
    tokio::select! {
        _ = cancel.cancelled() => Err(PassfileError::Cancelled),
        joined = task => joined
            .map_err(|e| PassfileError::Crypto(format!("Crypto task failed: {}", e)))?,
    }
}

//! Decryption gating.
//!
//! Content is decrypted at most once per session: decrypted sections are
//! cached on the entry and the passphrase that opened them is remembered
//! until [`PassFileContext::lock_all`] or a reload.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{Entry, PassFileContext, PromptRequest};
use crate::codec;
use crate::crypto::decrypt_async;
use crate::error::{PassfileError, Result};
use crate::model::{Content, PassFile, PassFileContent, PassFileId, Passphrase, Section};
use crate::storage::ContentSlot;

impl PassFileContext {
    /// Typed, decrypted content of `passfile`.
    ///
    /// Reads the content file if the bytes are not in memory yet, then tries
    /// the session passphrase and finally the prompt.
    pub(super) async fn unlock<S: Section>(
        &self,
        passfile: &PassFile,
        content: PassFileContent,
        cancel: &CancellationToken,
    ) -> Result<Content<S>> {
        let mut typed = typed::<S>(passfile, &content)?;
        if typed.is_decrypted() {
            return Ok(typed);
        }

        let encrypted = match typed.encrypted() {
            Some(bytes) => bytes.to_vec(),
            None => self
                .store
                .read_content(passfile, ContentSlot::Current, cancel)
                .await?
                .ok_or_else(|| {
                    PassfileError::ContentCorrupt(format!(
                        "Content file of passfile {} is missing",
                        passfile.id
                    ))
                })?,
        };
        typed.set_encrypted(encrypted.clone());

        let cached = self.cached_passphrase(passfile.id);
        let (sections, passphrase) = match self
            .decrypt_sections::<S>(&passfile.name, encrypted, cached, cancel)
            .await
        {
            Ok(unlocked) => unlocked,
            Err(PassfileError::AuthenticationFailed) => {
                self.session().remove(&passfile.id);
                return Err(PassfileError::AuthenticationFailed);
            }
            Err(err) => return Err(err),
        };
        self.remember_passphrase(passfile.id, &passphrase);
        typed.set_decrypted(sections, passphrase);
        Ok(typed)
    }

    /// Decrypt and decode `encrypted`, trying `candidate` first and then
    /// prompting up to the configured number of attempts.
    pub(super) async fn decrypt_sections<S: Section>(
        &self,
        label: &str,
        encrypted: Vec<u8>,
        candidate: Option<Passphrase>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<S>, Passphrase)> {
        if let Some(passphrase) = candidate {
            match decrypt_async(encrypted.clone(), passphrase.clone(), cancel).await {
                Ok(plain) => {
                    let plain = Zeroizing::new(plain);
                    return Ok((codec::deserialize(&plain)?, passphrase));
                }
                Err(PassfileError::AuthenticationFailed) => {
                    debug!("Remembered passphrase does not open '{}'", label);
                }
                Err(err) => return Err(err),
            }
        }

        let attempts = self.options.passphrase_attempts.max(1);
        for attempt in 1..=attempts {
            let answer = self
                .prompt
                .ask(PromptRequest::unlock(label, attempt))
                .await
                .ok_or(PassfileError::Cancelled)?;
            let passphrase = Passphrase::new(answer);
            match decrypt_async(encrypted.clone(), passphrase.clone(), cancel).await {
                Ok(plain) => {
                    let plain = Zeroizing::new(plain);
                    return Ok((codec::deserialize(&plain)?, passphrase));
                }
                Err(PassfileError::AuthenticationFailed) => {
                    warn!(
                        "Incorrect passphrase for '{}' (attempt {} of {})",
                        label, attempt, attempts
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(PassfileError::AuthenticationFailed)
    }

    /// Keep freshly decrypted content unless the entry moved on meanwhile.
    pub(super) fn cache_unlocked(&self, passfile: &PassFile, content: PassFileContent) {
        let mut entries = self.entries();
        if let Some(Entry {
            passfile: current,
            content: cached,
        }) = entries.get_mut(&passfile.id)
        {
            if current.version == passfile.version && !cached.is_decrypted() {
                *cached = content;
            }
        }
    }

    pub(super) fn cached_passphrase(&self, id: PassFileId) -> Option<Passphrase> {
        self.session().get(&id).cloned()
    }

    pub(super) fn remember_passphrase(&self, id: PassFileId, passphrase: &Passphrase) {
        self.session().insert(id, passphrase.clone());
    }
}

/// The content of `passfile` as shape `S`.
pub(super) fn typed<S: Section>(passfile: &PassFile, content: &PassFileContent) -> Result<Content<S>> {
    S::content_of(content)
        .cloned()
        .ok_or(PassfileError::TypeMismatch {
            expected: S::PASSFILE_TYPE,
            actual: passfile.passfile_type,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PassFileType, PwdSection, TxtSection};

    #[test]
    fn test_typed_checks_shape() {
        let passfile = PassFile::new(PassFileType::Txt, 1, "Notes", None);
        let content = PassFileContent::empty(PassFileType::Txt);

        assert!(typed::<TxtSection>(&passfile, &content).is_ok());
        assert!(matches!(
            typed::<PwdSection>(&passfile, &content),
            Err(PassfileError::TypeMismatch { .. })
        ));
    }
}

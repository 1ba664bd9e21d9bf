//! Passfile content state: encrypted bytes, decrypted sections and the
//! passphrase that unlocked them.

use std::fmt;

use zeroize::Zeroizing;

use super::section::{PassFileType, PwdSection, Section, TxtSection};

/// A passfile passphrase held in memory only.
///
/// The backing string is zeroized on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the raw passphrase for an immediate crypto call.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Content of one passfile.
///
/// `decrypted` and `passphrase` are set and cleared together, so decrypted
/// data can always be re-encrypted.
#[derive(Debug, Clone)]
pub struct Content<S> {
    decrypted: Option<Vec<S>>,
    encrypted: Option<Vec<u8>>,
    passphrase: Option<Passphrase>,
}

impl<S: Section> Content<S> {
    /// Nothing loaded, nothing decrypted.
    pub fn empty() -> Self {
        Self {
            decrypted: None,
            encrypted: None,
            passphrase: None,
        }
    }

    pub fn from_encrypted(bytes: Vec<u8>) -> Self {
        Self {
            decrypted: None,
            encrypted: Some(bytes),
            passphrase: None,
        }
    }

    pub fn from_decrypted(sections: Vec<S>, passphrase: Passphrase) -> Self {
        Self {
            decrypted: Some(sections),
            encrypted: None,
            passphrase: Some(passphrase),
        }
    }

    pub fn decrypted(&self) -> Option<&[S]> {
        self.decrypted.as_deref()
    }

    /// Deep copy of the decrypted sections.
    pub fn clone_decrypted(&self) -> Option<Vec<S>> {
        self.decrypted.clone()
    }

    pub fn encrypted(&self) -> Option<&[u8]> {
        self.encrypted.as_deref()
    }

    pub fn passphrase(&self) -> Option<&Passphrase> {
        self.passphrase.as_ref()
    }

    pub fn is_decrypted(&self) -> bool {
        self.decrypted.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.encrypted.is_some()
    }

    pub fn set_decrypted(&mut self, sections: Vec<S>, passphrase: Passphrase) {
        self.decrypted = Some(sections);
        self.passphrase = Some(passphrase);
    }

    pub fn set_encrypted(&mut self, bytes: Vec<u8>) {
        self.encrypted = Some(bytes);
    }

    /// Drop decrypted data and its passphrase, keeping the encrypted bytes.
    pub fn lock(&mut self) {
        self.decrypted = None;
        self.passphrase = None;
    }
}

impl<S: Section> Default for Content<S> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Content of a passfile of either shape.
#[derive(Debug, Clone)]
pub enum PassFileContent {
    Pwd(Content<PwdSection>),
    Txt(Content<TxtSection>),
}

impl PassFileContent {
    pub fn empty(passfile_type: PassFileType) -> Self {
        match passfile_type {
            PassFileType::Pwd => PassFileContent::Pwd(Content::empty()),
            PassFileType::Txt => PassFileContent::Txt(Content::empty()),
        }
    }

    pub fn from_encrypted(passfile_type: PassFileType, bytes: Vec<u8>) -> Self {
        match passfile_type {
            PassFileType::Pwd => PassFileContent::Pwd(Content::from_encrypted(bytes)),
            PassFileType::Txt => PassFileContent::Txt(Content::from_encrypted(bytes)),
        }
    }

    pub fn passfile_type(&self) -> PassFileType {
        match self {
            PassFileContent::Pwd(_) => PassFileType::Pwd,
            PassFileContent::Txt(_) => PassFileType::Txt,
        }
    }

    pub fn encrypted(&self) -> Option<&[u8]> {
        match self {
            PassFileContent::Pwd(inner) => inner.encrypted(),
            PassFileContent::Txt(inner) => inner.encrypted(),
        }
    }

    pub fn is_decrypted(&self) -> bool {
        match self {
            PassFileContent::Pwd(inner) => inner.is_decrypted(),
            PassFileContent::Txt(inner) => inner.is_decrypted(),
        }
    }

    pub fn set_encrypted(&mut self, bytes: Vec<u8>) {
        match self {
            PassFileContent::Pwd(inner) => inner.set_encrypted(bytes),
            PassFileContent::Txt(inner) => inner.set_encrypted(bytes),
        }
    }

    pub fn lock(&mut self) {
        match self {
            PassFileContent::Pwd(inner) => inner.lock(),
            PassFileContent::Txt(inner) => inner.lock(),
        }
    }
}

//! # Passfile Core
//!
//! Core library for Passfile - encrypted password and note containers kept
//! in a local store and synchronized with a remote server.
//!
//! This crate provides the content lifecycle independent of any front end:
//! storage, encryption, synchronization and conflict resolution.
//!
//! ## Architecture
//!
//! - **model**: passfiles, sections, content state and marks
//! - **codec**: section lists to and from bytes
//! - **crypto**: passphrase encryption gate
//! - **storage**: per-server file store with an index file
//! - **remote**: remote API boundary and an in-memory implementation
//! - **merge**: three-way section merge
//! - **context**: the passfile set, its sync and merge flows

pub mod codec;
pub mod context;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod merge;
pub mod model;
pub mod remote;
pub mod storage;

pub use context::{
    ContextEvent, ContextOptions, PassFileContext, PassphrasePrompt, PendingMerge, PromptPurpose,
    PromptRequest, SyncOutcome,
};
pub use error::{PassfileError, Result};
pub use merge::{Conflict, PassFileMerge, Resolution};
pub use model::{
    ErrorKind, PassFile, PassFileId, PassFileInfo, PassFileState, PassFileType, Passphrase,
    PwdItem, PwdSection, Section, SectionId, TxtSection,
};
pub use remote::{MemoryRemote, RemoteApi};
pub use storage::{FileRepository, LocalFileRepository, PassFileStore, Purpose};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

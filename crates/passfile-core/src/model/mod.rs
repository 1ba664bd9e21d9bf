//! Passfile entity model.
//!
//! - **passfile**: metadata, versions, remote origin and marks
//! - **section**: typed content shapes and their runtime type mapping
//! - **content**: encrypted/decrypted content state

pub mod content;
pub mod passfile;
pub mod section;

pub use content::{Content, PassFileContent, Passphrase};
pub use passfile::{
    ErrorKind, PassFile, PassFileId, PassFileInfo, PassFileMark, PassFileState, RemoteOrigin,
};
pub use section::{PassFileType, PwdItem, PwdSection, Section, SectionId, TxtSection};

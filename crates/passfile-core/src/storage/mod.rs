//! Local storage for passfiles.
//!
//! - **traits**: the `FileRepository` persistence boundary
//! - **local**: directory-backed repository, one directory per server and purpose
//! - **store**: index and content file layout on top of a repository

pub mod local;
pub mod store;
pub mod traits;

pub use local::{sanitize_server_id, LocalFileRepository, Purpose};
pub use store::{content_file_name, ContentSlot, PassFileStore, StagedContent, INDEX_FILE};
pub use traits::FileRepository;
